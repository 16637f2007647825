mod domain;
mod inbound;
mod outbound;
mod usecase;

use std::sync::Arc;

use app_core::storage::StorageService;
use app_core::verifier::TokenVerifier;
pub use inbound::router::create_router;
pub use inbound::state::ProfileState;
use sea_orm::{DatabaseConnection, DbErr};

use crate::outbound::orm::ProfileORM;
use crate::usecase::profile::ProfileService;

pub struct Dependency {
    pub db: Arc<DatabaseConnection>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub storage: Arc<dyn StorageService>,
}

pub fn new(dep: Dependency) -> ProfileState {
    let repo = Arc::new(ProfileORM::new(dep.db));
    let profile_svc = Arc::new(ProfileService::new(dep.storage, repo));

    ProfileState::new(dep.verifier, profile_svc)
}

/// Creates the tables this crate owns when they are missing.
pub async fn migrate(db: &DatabaseConnection) -> Result<(), DbErr> {
    ProfileORM::ensure_schema(db).await
}
