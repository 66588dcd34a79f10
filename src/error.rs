use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

use crate::link::LinkError;
use crate::timestamp::TimestampError;

/// Terminal error of a feed run.
///
/// Every variant except [`FeedError::Shutdown`] means the input or the output
/// is broken and the partially written document must be discarded.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("invalid number of items: {0} (expected {min} to {max})", min = crate::config::MIN_ITEMS, max = crate::config::MAX_ITEMS)]
    InvalidItemCount(usize),

    #[error("invalid API path: {0}")]
    ApiPath(#[source] LinkError),

    #[error("building HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Connection failure, timeout or any other transport-level problem.
    #[error("making HTTP request to {url}: {source}")]
    Request {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    /// Any status other than 200, redirects included.
    #[error("HTTP request to {url} returned status code {status}")]
    Status { url: Url, status: StatusCode },

    #[error("reading response from {url}: {source}")]
    Body {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    /// The body is empty or does not look like a JSON object.
    #[error("response from {url} is either empty, or in a wrong format")]
    UnexpectedBody { url: Url },

    #[error("invalid response from {url}: {source}")]
    Decode {
        url: Url,
        #[source]
        source: serde_json::Error,
    },

    #[error("response from {url} indicates an error")]
    Unsuccessful { url: Url },

    #[error("response from {url} contains no news items")]
    EmptyPage { url: Url },

    #[error("invalid next page link in response from {url}: {source}")]
    Pagination {
        url: Url,
        #[source]
        source: LinkError,
    },

    #[error("writing feed output: {0}")]
    Output(#[from] std::io::Error),

    #[error("news reader task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("stopped due to application shutdown")]
    Shutdown,
}

impl FeedError {
    /// True when the run was interrupted rather than broken.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, FeedError::Shutdown)
    }
}

/// Why a single record was dropped. Never fatal to the run.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("bad link: {0}")]
    Link(#[from] LinkError),

    #[error("bad timestamp: {0}")]
    Timestamp(#[from] TimestampError),
}
