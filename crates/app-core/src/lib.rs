//! Shared infrastructure for the profile service: configuration, error
//! mapping, extractors, middleware, response envelopes, file storage and
//! identity-token verification.

pub mod config;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod rejection;
pub mod response;
pub mod storage;
pub mod verifier;
