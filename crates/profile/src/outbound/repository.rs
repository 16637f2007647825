use app_core::error::AppError;
use async_trait::async_trait;

use crate::domain::entity::profile::{NewProfile, Profile, ProfileUpsert, Registration};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Finds the profile owned by a subject.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(Profile))` if the subject has a profile.
    /// * `Ok(None)` if it has none.
    /// * `Err(AppError)` if the datastore fails.
    async fn find_by_subject(&self, subject_id: &str) -> Result<Option<Profile>, AppError>;

    /// Creates the subject's profile, or overwrites the provided fields of the
    /// existing one, in a single statement. `profile_complete` is forced to
    /// true either way.
    ///
    /// # Returns
    ///
    /// * `Ok(Profile)` - the profile as stored after the write.
    /// * `Err(AppError)` - if the datastore fails.
    async fn upsert(&self, payload: ProfileUpsert) -> Result<Profile, AppError>;

    /// Inserts a bare profile unless one already exists for the subject. An
    /// existing profile is returned unchanged.
    async fn register(&self, new_profile: NewProfile) -> Result<Registration, AppError>;
}
