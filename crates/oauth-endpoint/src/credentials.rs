//! Client credential extraction from HTTP Basic Authorization headers.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::EndpointError;

/// A client id / client secret pair decoded from a Basic Authorization
/// header. Ephemeral: exists only for the duration of one authentication
/// check and is never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Decode a header of the form `"Basic <base64(client_id:client_secret)>"`.
///
/// The payload is split on the first `:` so secrets may themselves contain
/// colons. Any malformed header (missing token, bad base64, non-UTF-8
/// payload, no separator) is a [`EndpointError::CredentialDecode`] error,
/// never a silent default: the caller must treat it as an authentication
/// failure.
pub fn extract_basic_credentials(
    authorization_header: &str,
) -> Result<Credentials, EndpointError> {
    let mut parts = authorization_header.trim().split_whitespace();
    let _scheme = parts.next();
    let encoded = parts.next().ok_or_else(|| {
        EndpointError::CredentialDecode("authorization header carries no credentials".to_string())
    })?;

    let decoded = STANDARD.decode(encoded.trim()).map_err(|_| {
        EndpointError::CredentialDecode(
            "could not retrieve client id and client secret".to_string(),
        )
    })?;

    let payload = String::from_utf8(decoded).map_err(|_| {
        EndpointError::CredentialDecode("credentials are not valid UTF-8".to_string())
    })?;

    let (client_id, client_secret) = payload.split_once(':').ok_or_else(|| {
        EndpointError::CredentialDecode("credentials are missing the ':' separator".to_string())
    })?;

    Ok(Credentials {
        client_id: client_id.to_string(),
        client_secret: client_secret.to_string(),
    })
}
