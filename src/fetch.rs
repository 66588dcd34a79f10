use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use tracing::{debug, info};
use url::Url;

use crate::config::{IDLE_TIMEOUT, REQUEST_TIMEOUT, USER_AGENT as AGENT};
use crate::error::FeedError;

// How much of an unexpected body goes to the debug log.
const BODY_SNIPPET_LEN: usize = 512;

/// Builds the client shared by all page requests of a run.
///
/// Pages are fetched strictly one after another, so keeping a single idle
/// connection means the host only ever sees one. Redirects are returned to
/// the caller as-is.
pub fn build_client() -> Result<Client, FeedError> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .pool_idle_timeout(IDLE_TIMEOUT)
        .pool_max_idle_per_host(1)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(FeedError::Client)
}

#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
}

impl PageFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Performs one GET and returns the whitespace-trimmed body.
    ///
    /// The server has been seen answering with an HTML error page and status
    /// 200, so the body must start with `{` to be accepted.
    pub async fn fetch(&self, url: &Url) -> Result<Vec<u8>, FeedError> {
        info!(url = %url, "reading page");

        let resp = self
            .client
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, AGENT)
            .send()
            .await
            .map_err(|source| FeedError::Request {
                url: url.clone(),
                source,
            })?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(FeedError::Status {
                url: url.clone(),
                status,
            });
        }

        let body = resp.bytes().await.map_err(|source| FeedError::Body {
            url: url.clone(),
            source,
        })?;

        let body = body.trim_ascii();
        if body.first() != Some(&b'{') {
            if !body.is_empty() {
                let end = body.len().min(BODY_SNIPPET_LEN);
                debug!(url = %url, body = %String::from_utf8_lossy(&body[..end]), "unexpected response body");
            }
            return Err(FeedError::UnexpectedBody { url: url.clone() });
        }

        Ok(body.to_vec())
    }
}
