use app_core::extractors::AppJson;
use app_core::response::Response;
use app_core::verifier::Identity;
use axum::debug_handler;
use axum::extract::State;
use axum::response::IntoResponse;

use crate::domain::inout::prelude::*;
use crate::inbound::model::prelude::*;
use crate::inbound::state::ProfileState;

const PROFILE_UPDATED_MSG: &str = "Profile updated successfully";
const PROFILE_SAVED_MSG: &str = "Profile saved successfully";

#[debug_handler]
pub async fn get_profile(State(state): State<ProfileState>, identity: Identity) -> impl IntoResponse {
    state
        .profile
        .get_profile(GetProfileInput { subject_id: identity.subject_id })
        .await
        .map(ProfileResponse::from)
        .map(Response::from)
}

#[debug_handler]
pub async fn update_profile(
    State(state): State<ProfileState>,
    identity: Identity,
    req: UpdateProfileRequest,
) -> impl IntoResponse {
    state
        .profile
        .update_profile(UpdateProfileInput {
            subject_id: identity.subject_id,
            name: req.fields.name,
            phone: req.fields.phone,
            gender: req.fields.gender,
            address: req.fields.address,
            photo: req.photo,
        })
        .await
        .map(|profile| Response::with_message(ProfileResponse::from(profile), PROFILE_UPDATED_MSG))
}

#[debug_handler]
pub async fn register_profile(
    State(state): State<ProfileState>,
    identity: Identity,
    AppJson(req): AppJson<RegisterProfileRequest>,
) -> impl IntoResponse {
    let subject_id = match req.subject_id {
        Some(subject_id) if !subject_id.is_empty() => {
            if subject_id != identity.subject_id {
                tracing::warn!("Registering subject {} on behalf of {}", subject_id, identity.subject_id);
            }
            subject_id
        },
        _ => identity.subject_id,
    };

    state
        .profile
        .register_profile(RegisterProfileInput {
            subject_id,
            email: req.email.or(identity.email),
            profile_complete: req.profile_complete,
        })
        .await
        .map(|profile| Response::with_message(ProfileResponse::from(profile), PROFILE_SAVED_MSG))
}
