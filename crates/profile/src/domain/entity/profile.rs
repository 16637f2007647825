use std::fmt;

use chrono::{DateTime, Utc};

/// Lifecycle of a profile. Registration leaves it incomplete; the first
/// update completes it, and nothing moves it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileStatus {
    Incomplete,
    Complete,
}

impl fmt::Display for ProfileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProfileStatus::Incomplete => "Incomplete",
            ProfileStatus::Complete => "Complete",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub subject_id: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
    pub photo_ref: Option<String>,
    pub profile_complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn status(&self) -> ProfileStatus {
        if self.profile_complete { ProfileStatus::Complete } else { ProfileStatus::Incomplete }
    }
}

#[cfg(test)]
impl Profile {
    pub fn new(subject_id: String) -> Self {
        Self {
            subject_id,
            name: None,
            phone: None,
            gender: None,
            address: None,
            email: None,
            photo_ref: None,
            profile_complete: false,
            created_at: DateTime::default(), // UNIX_EPOCH (1970-01-01 UTC)
            updated_at: DateTime::default(), // UNIX_EPOCH (1970-01-01 UTC)
        }
    }
}

/// Fields written by the update operation. `None` leaves the stored value
/// untouched; `profile_complete` is always forced to true.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpsert {
    pub subject_id: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub photo_ref: Option<String>,
}

/// A bare profile created by registration.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProfile {
    pub subject_id: String,
    pub email: Option<String>,
    pub profile_complete: bool,
}

/// Outcome of a registration: the stored profile and whether this call
/// created it.
#[derive(Debug, Clone)]
pub struct Registration {
    pub profile: Profile,
    pub created: bool,
}
