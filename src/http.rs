//! Shared HTTP client for the hosted speech and assistant APIs

use std::time::Duration;

use crate::{Error, Result};

/// Build a client whose requests fail after `timeout`
///
/// A stalled connection then surfaces as an ordinary request error instead
/// of holding the consumer loop.
///
/// # Errors
///
/// Returns `Error::Config` if the TLS backend cannot be initialized
pub fn client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and hold connections without ever answering
        let _server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = client(Duration::from_millis(200)).unwrap();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            client.get(format!("http://{addr}/")).send(),
        )
        .await
        .expect("request should give up on its own");

        assert!(result.unwrap_err().is_timeout());
    }
}
