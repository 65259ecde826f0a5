//! Error taxonomy for the authorization endpoint core.

use thiserror::Error;

/// Fatal errors reported to the endpoint handler.
///
/// Encoding failures are deliberately not represented here: a parameter that
/// cannot be encoded is dropped and flagged on the built URL, and the
/// redirect still happens (see [`crate::redirect::BuiltUrl`]).
#[derive(Debug, Error)]
pub enum EndpointError {
    /// The Basic Authorization header could not be decoded into a client
    /// id / client secret pair. The caller should answer 401 with the
    /// configured realm challenge.
    #[error("error decoding authorization header: {0}")]
    CredentialDecode(String),

    /// The session token was absent from the store. The message is generic
    /// on purpose: expired and never-issued tokens must be
    /// indistinguishable to avoid a token-enumeration side channel.
    #[error("no authorization session found for the given key")]
    SessionNotFound,
}
