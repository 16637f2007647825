use std::path::Path;
use std::sync::Arc;

use app_core::error::AppError;
use app_core::storage::StorageService;
use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::entity::profile::{NewProfile, Profile, ProfileUpsert};
use crate::domain::inout::prelude::*;
use crate::outbound::repository::ProfileRepository;

const PROFILE_NOT_FOUND_MSG: &str = "User not found";

// File upload constants
const PHOTO_DIR: &str = "photos";
const FALLBACK_EXTENSION: &str = "bin";
const MAX_EXTENSION_LEN: usize = 10;
const OCTET_STREAM: &str = "application/octet-stream";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileUseCase: Send + Sync {
    async fn get_profile(&self, input: GetProfileInput) -> Result<Profile, AppError>;
    async fn update_profile(&self, input: UpdateProfileInput) -> Result<Profile, AppError>;
    async fn register_profile(&self, input: RegisterProfileInput) -> Result<Profile, AppError>;
}

#[derive(Clone)]
pub struct ProfileService {
    storage: Arc<dyn StorageService>,
    repo: Arc<dyn ProfileRepository>,
}

impl ProfileService {
    pub fn new(storage: Arc<dyn StorageService>, repo: Arc<dyn ProfileRepository>) -> Self {
        Self { storage, repo }
    }

    /// Picks a fresh storage name and content type for an uploaded photo.
    /// No type or size checks are made here.
    fn photo_file_name(&self, photo: &PhotoUpload) -> (String, String) {
        let content_type = photo
            .content_type
            .clone()
            .filter(|ct| !ct.is_empty())
            .or_else(|| {
                photo
                    .file_name
                    .as_deref()
                    .map(|name| mime_guess::from_path(name).first_or_octet_stream().to_string())
            })
            .unwrap_or_else(|| OCTET_STREAM.to_string());

        let extension = photo
            .file_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .or_else(|| {
                if content_type == OCTET_STREAM {
                    return None;
                }
                mime_guess::get_mime_extensions_str(&content_type)
                    .and_then(|exts| exts.first())
                    .map(|ext| ext.to_string())
            })
            .filter(|ext| !ext.is_empty() && ext.len() <= MAX_EXTENSION_LEN && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or_else(|| FALLBACK_EXTENSION.to_string());

        (format!("{}/{}.{}", PHOTO_DIR, Uuid::new_v4(), extension), content_type)
    }

    async fn upload_photo(&self, photo: PhotoUpload) -> Result<String, AppError> {
        let (file_name, content_type) = self.photo_file_name(&photo);

        Ok(self.storage.upload_file(&file_name, photo.data, &content_type).await?)
    }
}

#[async_trait]
impl ProfileUseCase for ProfileService {
    async fn get_profile(&self, input: GetProfileInput) -> Result<Profile, AppError> {
        self.repo
            .find_by_subject(&input.subject_id)
            .await?
            .ok_or_else(|| AppError::NotFound(PROFILE_NOT_FOUND_MSG.to_string()))
    }

    async fn update_profile(&self, input: UpdateProfileInput) -> Result<Profile, AppError> {
        // Superseded photos stay on disk; only the stored reference moves.
        let photo_ref = match input.photo {
            Some(photo) => Some(self.upload_photo(photo).await?),
            None => None,
        };

        let profile = self
            .repo
            .upsert(ProfileUpsert {
                subject_id: input.subject_id,
                name: input.name,
                phone: input.phone,
                gender: input.gender,
                address: input.address,
                photo_ref,
            })
            .await?;

        tracing::info!("Profile updated for subject: {} ({})", profile.subject_id, profile.status());

        Ok(profile)
    }

    async fn register_profile(&self, input: RegisterProfileInput) -> Result<Profile, AppError> {
        let registration = self
            .repo
            .register(NewProfile {
                subject_id: input.subject_id,
                email: input.email,
                profile_complete: input.profile_complete,
            })
            .await?;

        if registration.created {
            tracing::info!("Profile registered for subject: {}", registration.profile.subject_id);
        } else {
            tracing::info!("Profile already registered for subject: {}", registration.profile.subject_id);
        }

        Ok(registration.profile)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use app_core::storage::{MockStorageService, StorageError};
    use chrono::Utc;
    use tokio::sync::Mutex;

    use super::*;
    use crate::domain::entity::profile::Registration;
    use crate::outbound::repository::MockProfileRepository;

    fn profile(subject_id: &str) -> Profile {
        Profile::new(subject_id.to_string())
    }

    fn update_input(subject_id: &str, name: Option<&str>, photo: Option<PhotoUpload>) -> UpdateProfileInput {
        UpdateProfileInput {
            subject_id: subject_id.to_string(),
            name: name.map(str::to_string),
            phone: None,
            gender: None,
            address: None,
            photo,
        }
    }

    fn png(file_name: Option<&str>) -> PhotoUpload {
        PhotoUpload {
            file_name: file_name.map(str::to_string),
            content_type: Some("image/png".to_string()),
            data: b"\x89PNG".to_vec(),
        }
    }

    fn service(storage: MockStorageService, repo: impl ProfileRepository + 'static) -> ProfileService {
        ProfileService::new(Arc::new(storage), Arc::new(repo))
    }

    #[tokio::test]
    async fn test_get_profile_found() {
        let mut repo = MockProfileRepository::new();
        repo.expect_find_by_subject()
            .withf(|subject_id| subject_id == "uid-1")
            .returning(|id| Ok(Some(profile(id))));

        let result = service(MockStorageService::new(), repo)
            .get_profile(GetProfileInput { subject_id: "uid-1".into() })
            .await
            .unwrap();

        assert_eq!(result.subject_id, "uid-1");
    }

    #[tokio::test]
    async fn test_get_profile_not_found() {
        let mut repo = MockProfileRepository::new();
        repo.expect_find_by_subject().returning(|_| Ok(None));

        let result = service(MockStorageService::new(), repo)
            .get_profile(GetProfileInput { subject_id: "uid-1".into() })
            .await;

        match result.unwrap_err() {
            AppError::NotFound(msg) => assert_eq!(msg, PROFILE_NOT_FOUND_MSG),
            e => panic!("Unexpected error: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_update_profile_without_photo_skips_storage() {
        let mut storage = MockStorageService::new();
        storage.expect_upload_file().never();

        let mut repo = MockProfileRepository::new();
        repo.expect_upsert()
            .withf(|p| p.subject_id == "uid-1" && p.name.as_deref() == Some("Ada") && p.photo_ref.is_none())
            .returning(|p| {
                let mut stored = profile(&p.subject_id);
                stored.name = p.name;
                stored.profile_complete = true;
                Ok(stored)
            });

        let result = service(storage, repo).update_profile(update_input("uid-1", Some("Ada"), None)).await.unwrap();

        assert!(result.profile_complete);
        assert_eq!(result.name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn test_update_profile_with_photo_stores_reference() {
        let mut storage = MockStorageService::new();
        storage
            .expect_upload_file()
            .withf(|name, data, content_type| {
                name.starts_with("photos/") && name.ends_with(".png") && data == b"\x89PNG" && content_type == "image/png"
            })
            .returning(|name, _, _| Ok(format!("/uploads/{name}")));

        let mut repo = MockProfileRepository::new();
        repo.expect_upsert()
            .withf(|p| p.photo_ref.as_deref().is_some_and(|r| r.starts_with("/uploads/photos/")))
            .returning(|p| {
                let mut stored = profile(&p.subject_id);
                stored.photo_ref = p.photo_ref;
                stored.profile_complete = true;
                Ok(stored)
            });

        let result = service(storage, repo)
            .update_profile(update_input("uid-1", None, Some(png(Some("me.PNG")))))
            .await
            .unwrap();

        assert!(result.photo_ref.unwrap().starts_with("/uploads/photos/"));
    }

    #[tokio::test]
    async fn test_update_profile_storage_failure_skips_store() {
        let mut storage = MockStorageService::new();
        storage.expect_upload_file().returning(|_, _, _| Err(StorageError::Unknown));

        let mut repo = MockProfileRepository::new();
        repo.expect_upsert().never();

        let result = service(storage, repo).update_profile(update_input("uid-1", None, Some(png(None)))).await;

        assert!(matches!(result, Err(AppError::Storage(StorageError::Unknown))));
    }

    #[tokio::test]
    async fn test_register_profile_returns_stored_profile() {
        let mut repo = MockProfileRepository::new();
        repo.expect_register()
            .withf(|n| n.subject_id == "uid-1" && n.email.as_deref() == Some("ada@example.com") && !n.profile_complete)
            .returning(|n| {
                let mut stored = profile(&n.subject_id);
                stored.email = n.email;
                Ok(Registration { profile: stored, created: true })
            });

        let result = service(MockStorageService::new(), repo)
            .register_profile(RegisterProfileInput {
                subject_id: "uid-1".into(),
                email: Some("ada@example.com".into()),
                profile_complete: false,
            })
            .await
            .unwrap();

        assert_eq!(result.email.as_deref(), Some("ada@example.com"));
        assert!(!result.profile_complete);
    }

    #[test]
    fn test_photo_file_name() {
        let svc = service(MockStorageService::new(), MockProfileRepository::new());

        let (name, content_type) = svc.photo_file_name(&png(Some("selfie.JPG")));
        assert!(name.starts_with("photos/") && name.ends_with(".jpg"), "{name}");
        assert_eq!(content_type, "image/png");

        let (name, _) = svc.photo_file_name(&png(None));
        assert!(name.ends_with(".png"), "{name}");

        let unknown = PhotoUpload { file_name: Some("blob".into()), content_type: None, data: vec![1] };
        let (name, content_type) = svc.photo_file_name(&unknown);
        assert!(name.ends_with(".bin"), "{name}");
        assert_eq!(content_type, "application/octet-stream");

        let hostile = PhotoUpload { file_name: Some("x.p/../ng".into()), content_type: Some("".into()), data: vec![1] };
        let (name, _) = svc.photo_file_name(&hostile);
        assert_eq!(name.matches('/').count(), 1, "{name}");

        let (first, _) = svc.photo_file_name(&png(Some("a.png")));
        let (second, _) = svc.photo_file_name(&png(Some("a.png")));
        assert_ne!(first, second);
    }

    /// In-memory store with the same write semantics as the SQL statements.
    #[derive(Default)]
    struct InMemoryProfiles {
        rows: Mutex<HashMap<String, Profile>>,
    }

    #[async_trait]
    impl ProfileRepository for InMemoryProfiles {
        async fn find_by_subject(&self, subject_id: &str) -> Result<Option<Profile>, AppError> {
            Ok(self.rows.lock().await.get(subject_id).cloned())
        }

        async fn upsert(&self, payload: ProfileUpsert) -> Result<Profile, AppError> {
            let mut rows = self.rows.lock().await;
            let now = Utc::now();
            let row = rows.entry(payload.subject_id.clone()).or_insert_with(|| {
                let mut fresh = Profile::new(payload.subject_id.clone());
                fresh.created_at = now;
                fresh
            });

            if payload.name.is_some() {
                row.name = payload.name;
            }
            if payload.phone.is_some() {
                row.phone = payload.phone;
            }
            if payload.gender.is_some() {
                row.gender = payload.gender;
            }
            if payload.address.is_some() {
                row.address = payload.address;
            }
            if payload.photo_ref.is_some() {
                row.photo_ref = payload.photo_ref;
            }
            row.profile_complete = true;
            row.updated_at = now;

            Ok(row.clone())
        }

        async fn register(&self, new_profile: NewProfile) -> Result<Registration, AppError> {
            let mut rows = self.rows.lock().await;
            let created = !rows.contains_key(&new_profile.subject_id);
            let row = rows.entry(new_profile.subject_id.clone()).or_insert_with(|| {
                let mut fresh = Profile::new(new_profile.subject_id);
                fresh.email = new_profile.email;
                fresh.profile_complete = new_profile.profile_complete;
                fresh
            });

            Ok(Registration { profile: row.clone(), created })
        }
    }

    fn echo_storage() -> MockStorageService {
        let mut storage = MockStorageService::new();
        storage.expect_upload_file().returning(|name, _, _| Ok(format!("/uploads/{name}")));
        storage
    }

    #[tokio::test]
    async fn test_unknown_subject_then_update_then_get() {
        let svc = service(echo_storage(), InMemoryProfiles::default());

        let missing = svc.get_profile(GetProfileInput { subject_id: "uid-1".into() }).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        let mut input = update_input("uid-1", Some("Ada"), None);
        input.phone = Some("555-0100".into());
        svc.update_profile(input).await.unwrap();

        let stored = svc.get_profile(GetProfileInput { subject_id: "uid-1".into() }).await.unwrap();
        assert!(stored.profile_complete);
        assert_eq!(stored.name.as_deref(), Some("Ada"));
        assert_eq!(stored.phone.as_deref(), Some("555-0100"));
    }

    #[tokio::test]
    async fn test_register_then_update_completes_profile() {
        let svc = service(echo_storage(), InMemoryProfiles::default());

        let registered = svc
            .register_profile(RegisterProfileInput {
                subject_id: "uid-1".into(),
                email: Some("ada@example.com".into()),
                profile_complete: false,
            })
            .await
            .unwrap();
        assert!(!registered.profile_complete);

        let updated = svc.update_profile(update_input("uid-1", Some("Ada"), None)).await.unwrap();
        assert!(updated.profile_complete);
        assert_eq!(updated.email.as_deref(), Some("ada@example.com"));
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let svc = service(echo_storage(), InMemoryProfiles::default());

        for (email, complete) in [("first@example.com", false), ("second@example.com", true)] {
            svc.register_profile(RegisterProfileInput {
                subject_id: "uid-1".into(),
                email: Some(email.into()),
                profile_complete: complete,
            })
            .await
            .unwrap();
        }

        let stored = svc.get_profile(GetProfileInput { subject_id: "uid-1".into() }).await.unwrap();
        assert_eq!(stored.email.as_deref(), Some("first@example.com"));
        assert!(!stored.profile_complete);
    }

    #[tokio::test]
    async fn test_photo_ref_survives_update_without_photo() {
        let svc = service(echo_storage(), InMemoryProfiles::default());

        let first = svc.update_profile(update_input("uid-1", Some("Ada"), Some(png(Some("a.png"))))).await.unwrap();
        let photo_ref = first.photo_ref.clone().unwrap();

        let second = svc.update_profile(update_input("uid-1", Some("Ada L."), None)).await.unwrap();
        assert_eq!(second.photo_ref.as_deref(), Some(photo_ref.as_str()));
        assert_eq!(second.name.as_deref(), Some("Ada L."));

        let third = svc.update_profile(update_input("uid-1", None, Some(png(Some("b.png"))))).await.unwrap();
        assert_ne!(third.photo_ref.as_deref(), Some(photo_ref.as_str()));
        assert_eq!(third.name.as_deref(), Some("Ada L."));
    }

    #[tokio::test]
    async fn test_concurrent_first_updates_yield_one_profile() {
        let repo = Arc::new(InMemoryProfiles::default());
        let svc = Arc::new(ProfileService::new(Arc::new(echo_storage()), repo.clone()));

        let tasks = (0..16).map(|i| {
            let svc = svc.clone();
            tokio::spawn(async move {
                let name = format!("writer-{i}");
                svc.update_profile(update_input("uid-race", Some(&name), None)).await
            })
        });

        for task in tasks.collect::<Vec<_>>() {
            assert!(task.await.unwrap().is_ok());
        }

        let rows = repo.rows.lock().await;
        assert_eq!(rows.len(), 1);
        assert!(rows["uid-race"].profile_complete);
    }
}
