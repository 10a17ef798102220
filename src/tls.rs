//! Client-side mTLS identity loading for [`crate::admin_client::AdminClient`]
//! (spec §4.B). Adapted from the teacher's server-side `load_server_config`:
//! same PEM parsing via `rustls_pemfile`, but producing a `reqwest::Identity`
//! a client presents to the remote rather than a `rustls::ServerConfig` a
//! server terminates connections with.

use std::fs;
use std::io::BufReader;
use std::path::Path;

use rustls_pemfile::{certs, private_key};

use crate::error::{Error, Result};

/// Read a PEM certificate chain and private key from disk and build a
/// `reqwest::Identity` for client certificate authentication.
///
/// Validates that both files contain at least one well-formed PEM block
/// before handing the concatenated bytes to `reqwest`, which performs its
/// own parsing internally.
pub fn load_identity(cert_path: &Path, key_path: &Path) -> Result<reqwest::Identity> {
    let cert_bytes = fs::read(cert_path).map_err(|e| {
        Error::Validation(format!(
            "failed to read TLS cert file '{}': {e}",
            cert_path.display()
        ))
    })?;
    let key_bytes = fs::read(key_path).map_err(|e| {
        Error::Validation(format!(
            "failed to read TLS key file '{}': {e}",
            key_path.display()
        ))
    })?;

    let mut cert_reader = BufReader::new(cert_bytes.as_slice());
    let cert_chain = certs(&mut cert_reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Validation(format!("failed to parse TLS certificate: {e}")))?;
    if cert_chain.is_empty() {
        return Err(Error::Validation(format!(
            "TLS cert file '{}' contains no certificates",
            cert_path.display()
        )));
    }

    let mut key_reader = BufReader::new(key_bytes.as_slice());
    private_key(&mut key_reader)
        .map_err(|e| Error::Validation(format!("failed to parse TLS private key: {e}")))?
        .ok_or_else(|| {
            Error::Validation(format!(
                "TLS key file '{}' contains no private key",
                key_path.display()
            ))
        })?;

    let mut identity_pem = cert_bytes;
    identity_pem.extend_from_slice(b"\n");
    identity_pem.extend_from_slice(&key_bytes);

    reqwest::Identity::from_pem(&identity_pem)
        .map_err(|e| Error::Validation(format!("failed to build client identity: {e}")))
}

/// Read a PEM-encoded CA certificate from disk for validating the remote's
/// server certificate.
pub fn load_ca_certificate(ca_path: &Path) -> Result<reqwest::Certificate> {
    let ca_bytes = fs::read(ca_path).map_err(|e| {
        Error::Validation(format!(
            "failed to read CA cert file '{}': {e}",
            ca_path.display()
        ))
    })?;

    reqwest::Certificate::from_pem(&ca_bytes)
        .map_err(|e| Error::Validation(format!("failed to parse CA certificate: {e}")))
}
