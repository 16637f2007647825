use axum::Router;
use axum::routing::get;

use crate::inbound::http::profile::*;
use crate::inbound::state::ProfileState;

pub fn create_router(state: ProfileState) -> Router {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile).post(register_profile))
        .with_state(state)
}
