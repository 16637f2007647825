// ╔════════════════════════════╗
// ║        Get Profile         ║
// ╚════════════════════════════╝

#[derive(Debug)]
pub struct GetProfileInput {
    pub subject_id: String,
}

// ╔════════════════════════════╗
// ║      Update Profile        ║
// ╚════════════════════════════╝

/// A single uploaded file as received from the client.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub struct UpdateProfileInput {
    pub subject_id: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub photo: Option<PhotoUpload>,
}

// ╔════════════════════════════╗
// ║     Register Profile       ║
// ╚════════════════════════════╝

#[derive(Debug)]
pub struct RegisterProfileInput {
    pub subject_id: String,
    pub email: Option<String>,
    pub profile_complete: bool,
}
