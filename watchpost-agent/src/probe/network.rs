//! TCP socket and HTTP endpoint probes

use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

use super::ProbeError;

/// Open and immediately close a TCP connection
pub async fn tcp_reachable(address: &str, timeout: Duration) -> Result<(), ProbeError> {
    let stream = tokio::time::timeout(timeout, TcpStream::connect(address))
        .await
        .map_err(|_| ProbeError::Timeout(timeout))?
        .map_err(|source| ProbeError::Connect {
            address: address.to_string(),
            source,
        })?;

    debug!("Connected to {} from {:?}", address, stream.local_addr().ok());
    drop(stream);
    Ok(())
}

/// GET `url`; only a 200 counts as healthy
pub async fn http_status(client: &Client, url: &str) -> Result<StatusCode, ProbeError> {
    let response = client.get(url).send().await.map_err(ProbeError::Http)?;
    let status = response.status();
    // Body is not needed; dropping the response releases the connection
    drop(response);
    Ok(status)
}
