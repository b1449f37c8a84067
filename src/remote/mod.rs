//! Collaborators outside the profile store.
//!
//! S3 object fetching, Cognito sign-in and runtime messaging. Each one is a
//! trait at the boundary so the store logic can be exercised without a
//! network.

pub mod auth;
pub mod messaging;
pub mod s3;

pub use auth::{CognitoLogin, IdentityProvider, sign_in_profile};
pub use messaging::{
    MessageSink, OutboxSink, RuntimeRequest, RuntimeResponse, handle_runtime_request, push_config,
};
pub use s3::{ObjectFetcher, ObjectRequest, S3ObjectFetcher, pull_config};
