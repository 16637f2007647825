use std::sync::Arc;

use app_core::error::AppError;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveValue, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Schema};

use super::entity::{self as profiles, Entity as Profiles};
use super::repository::ProfileRepository;
use crate::domain::entity::profile::{NewProfile, Profile, ProfileUpsert, Registration};

/// Data access for profiles, backed by a SeaORM connection.
///
/// The subject identifier is the table's primary key, so the datastore itself
/// guarantees at most one profile per subject. Writes are expressed as single
/// `INSERT ... ON CONFLICT` statements rather than read-modify-write.
pub struct ProfileORM {
    db: Arc<DatabaseConnection>,
}

impl ProfileORM {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Creates the `profiles` table from the entity definition if it does not
    /// exist yet.
    pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
        let backend = db.get_database_backend();
        let mut statement = Schema::new(backend).create_table_from_entity(Profiles);
        statement.if_not_exists();

        db.execute(backend.build(&statement)).await?;
        tracing::info!("Profiles schema is in place");

        Ok(())
    }

    fn to_profile(&self, model: profiles::Model) -> Profile {
        Profile {
            subject_id: model.subject_id,
            name: model.name,
            phone: model.phone,
            gender: model.gender,
            address: model.address,
            email: model.email,
            photo_ref: model.photo_ref,
            profile_complete: model.profile_complete,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

/// Maps an optional field onto an active value, leaving absent fields unset.
fn set_if_some(value: Option<String>) -> ActiveValue<Option<String>> {
    match value {
        Some(v) => ActiveValue::Set(Some(v)),
        None => ActiveValue::NotSet,
    }
}

#[async_trait]
impl ProfileRepository for ProfileORM {
    async fn find_by_subject(&self, subject_id: &str) -> Result<Option<Profile>, AppError> {
        let model = Profiles::find()
            .filter(profiles::Column::SubjectId.eq(subject_id))
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(|m| self.to_profile(m)))
    }

    async fn upsert(&self, payload: ProfileUpsert) -> Result<Profile, AppError> {
        let now = Utc::now().fixed_offset();

        let mut update_columns = vec![profiles::Column::ProfileComplete, profiles::Column::UpdatedAt];
        for (column, provided) in [
            (profiles::Column::Name, payload.name.is_some()),
            (profiles::Column::Phone, payload.phone.is_some()),
            (profiles::Column::Gender, payload.gender.is_some()),
            (profiles::Column::Address, payload.address.is_some()),
            (profiles::Column::PhotoRef, payload.photo_ref.is_some()),
        ] {
            if provided {
                update_columns.push(column);
            }
        }

        let active_model = profiles::ActiveModel {
            subject_id: ActiveValue::Set(payload.subject_id),
            name: set_if_some(payload.name),
            phone: set_if_some(payload.phone),
            gender: set_if_some(payload.gender),
            address: set_if_some(payload.address),
            email: ActiveValue::NotSet,
            photo_ref: set_if_some(payload.photo_ref),
            profile_complete: ActiveValue::Set(true),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        };

        let model = Profiles::insert(active_model)
            .on_conflict(OnConflict::column(profiles::Column::SubjectId).update_columns(update_columns).to_owned())
            .exec_with_returning(self.db.as_ref())
            .await?;

        Ok(self.to_profile(model))
    }

    async fn register(&self, new_profile: NewProfile) -> Result<Registration, AppError> {
        let now = Utc::now().fixed_offset();
        let subject_id = new_profile.subject_id.clone();

        let active_model = profiles::ActiveModel {
            subject_id: ActiveValue::Set(new_profile.subject_id),
            email: ActiveValue::Set(new_profile.email),
            profile_complete: ActiveValue::Set(new_profile.profile_complete),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
            ..Default::default()
        };

        let inserted = Profiles::insert(active_model)
            .on_conflict(OnConflict::column(profiles::Column::SubjectId).do_nothing().to_owned())
            .exec_without_returning(self.db.as_ref())
            .await?;

        let profile = self.find_by_subject(&subject_id).await?.ok_or_else(|| {
            tracing::error!("Profile {} missing right after registration", subject_id);
            AppError::Internal
        })?;

        Ok(Registration { profile, created: inserted > 0 })
    }
}
