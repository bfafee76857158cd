//! Blocking HTTP client and single-resource downloads.

use std::fs;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;

use crate::config::AcquisitionOptions;
use crate::error::SlidegrabError;

/// Build the client shared by the manifest fetch and every segment worker.
///
/// # Errors
///
/// Returns [`SlidegrabError::Http`] if the TLS backend cannot be
/// initialised.
pub fn build_client(options: &AcquisitionOptions) -> Result<Client, SlidegrabError> {
    let mut builder = Client::builder()
        .user_agent(options.user_agent.as_str())
        .timeout(Duration::from_secs(options.request_timeout_secs));
    if !options.use_system_proxy {
        builder = builder.no_proxy();
    }
    Ok(builder.build()?)
}

/// GET `url` and return the body.
///
/// # Errors
///
/// Returns [`SlidegrabError::Network`] for a non-success status and
/// [`SlidegrabError::Http`] for transport failures.
pub fn fetch_bytes(client: &Client, url: &str) -> Result<Vec<u8>, SlidegrabError> {
    let response = client.get(url).send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(SlidegrabError::Network {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response.bytes()?.to_vec())
}

/// GET `url` and write the body to `destination`, replacing any previous
/// file. Returns the number of bytes written.
///
/// # Errors
///
/// Same as [`fetch_bytes`], plus [`SlidegrabError::IoError`] if the file
/// cannot be written.
pub fn fetch_to_file(
    client: &Client,
    url: &str,
    destination: &Path,
) -> Result<u64, SlidegrabError> {
    let body = fetch_bytes(client, url)?;
    fs::write(destination, &body)?;
    Ok(body.len() as u64)
}
