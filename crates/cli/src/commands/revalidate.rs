//! Manual revalidation through a running server.
//!
//! # Environment Variables
//!
//! - `REVALIDATE_SECRET` - Shared secret checked by `POST /api/revalidate`

use std::time::Duration;

use serde_json::{Value, json};

#[derive(Debug, thiserror::Error)]
pub enum RevalidateError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// POST `path` to `{url}/api/revalidate`, waiting at most `timeout`.
///
/// # Errors
///
/// Returns an error if the secret is unset, the server is unreachable or
/// too slow, or it answers with a non-success status.
pub async fn run(url: &str, path: &str, timeout: Duration) -> Result<(), RevalidateError> {
    dotenvy::dotenv().ok();
    let secret = std::env::var("REVALIDATE_SECRET")
        .map_err(|_| RevalidateError::MissingEnvVar("REVALIDATE_SECRET"))?;

    let revalidated = request(url, path, &secret, timeout).await?;
    tracing::info!(path, revalidated, "revalidation requested");
    Ok(())
}

async fn request(
    url: &str,
    path: &str,
    secret: &str,
    timeout: Duration,
) -> Result<bool, RevalidateError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()?;

    let endpoint = format!("{}/api/revalidate", url.trim_end_matches('/'));
    let response = client
        .post(&endpoint)
        .json(&json!({ "path": path, "secret": secret }))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RevalidateError::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    let body: Value = response.json().await?;
    Ok(body["revalidated"].as_bool().unwrap_or(false))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn test_unresponsive_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept connections and never answer.
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            loop {
                let (socket, _) = listener.accept().await.unwrap();
                held.push(socket);
            }
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            request(
                &format!("http://{addr}"),
                "/shop",
                "rv_secret",
                Duration::from_millis(200),
            ),
        )
        .await
        .expect("request should give up on its own");

        match result {
            Err(RevalidateError::Http(e)) => assert!(e.is_timeout()),
            other => panic!("expected timeout, got {other:?}"),
        }
        server.abort();
    }
}
