use app_core::error::AppError;
use app_core::extractors::{AppJson, AppMultipart, is_multipart};
use axum::body::Body;
use axum::extract::{FromRequest, Multipart};
use axum::http::{Request, header};
use serde::{Deserialize, Serialize};

use crate::domain::entity::profile::Profile;
use crate::domain::inout::profile::PhotoUpload;

pub const PHOTO_FIELD: &str = "profilePhoto";

// ╔════════════════════════════╗
// ║    Profile                 ║
// ╚════════════════════════════╝

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub subject_id: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
    pub photo_ref: Option<String>,
    pub profile_complete: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Profile> for ProfileResponse {
    fn from(profile: Profile) -> Self {
        Self {
            subject_id: profile.subject_id,
            name: profile.name,
            phone: profile.phone,
            gender: profile.gender,
            address: profile.address,
            email: profile.email,
            photo_ref: profile.photo_ref,
            profile_complete: profile.profile_complete,
            created_at: profile.created_at.to_rfc3339(),
            updated_at: profile.updated_at.to_rfc3339(),
        }
    }
}

// ╔════════════════════════════╗
// ║    Update Profile          ║
// ╚════════════════════════════╝

/// Text fields accepted by the update route, as JSON or as form fields.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileFields {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Default)]
pub struct UpdateProfileRequest {
    pub fields: UpdateProfileFields,
    pub photo: Option<PhotoUpload>,
}

impl UpdateProfileRequest {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut fields = UpdateProfileFields::default();
        let mut photo = None;

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "name" => fields.name = Some(field.text().await?),
                "phone" => fields.phone = Some(field.text().await?),
                "gender" => fields.gender = Some(field.text().await?),
                "address" => fields.address = Some(field.text().await?),
                PHOTO_FIELD => {
                    let file_name = field.file_name().filter(|n| !n.is_empty()).map(str::to_string);
                    let content_type = field.content_type().map(str::to_string);
                    let data = field.bytes().await?.to_vec();

                    // browsers send an empty part when no file was chosen
                    if data.is_empty() && file_name.is_none() {
                        continue;
                    }
                    if photo.is_some() {
                        return Err(AppError::RequestFormat(format!("Only one {} file is allowed", PHOTO_FIELD)));
                    }
                    photo = Some(PhotoUpload { file_name, content_type, data });
                },
                _ => (),
            }
        }

        Ok(Self { fields, photo })
    }
}

impl<S> FromRequest<S> for UpdateProfileRequest
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request<Body>, state: &S) -> Result<Self, Self::Rejection> {
        if is_multipart(&req) {
            let AppMultipart(multipart) = AppMultipart::from_request(req, state).await?;
            return Self::from_multipart(multipart).await;
        }

        if req.headers().contains_key(header::CONTENT_TYPE) {
            let AppJson(fields) = AppJson::<UpdateProfileFields>::from_request(req, state).await?;
            return Ok(Self { fields, photo: None });
        }

        Ok(Self::default())
    }
}

// ╔════════════════════════════╗
// ║    Register Profile        ║
// ╚════════════════════════════╝

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterProfileRequest {
    pub subject_id: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub profile_complete: bool,
}
