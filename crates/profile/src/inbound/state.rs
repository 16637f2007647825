use std::sync::Arc;

use app_core::verifier::TokenVerifier;
use axum::extract::FromRef;

use crate::usecase::profile::ProfileUseCase;

#[derive(Clone)]
pub struct ProfileState {
    pub verifier: Arc<dyn TokenVerifier>,
    pub profile: Arc<dyn ProfileUseCase>,
}

impl ProfileState {
    pub fn new(verifier: Arc<dyn TokenVerifier>, profile: Arc<dyn ProfileUseCase>) -> Self {
        Self { verifier, profile }
    }
}

impl FromRef<ProfileState> for Arc<dyn TokenVerifier> {
    fn from_ref(state: &ProfileState) -> Self {
        state.verifier.clone()
    }
}
