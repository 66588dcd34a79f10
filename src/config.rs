use std::time::Duration;

use chrono::FixedOffset;
use once_cell::sync::Lazy;
use url::Url;

use crate::error::FeedError;
use crate::link::Site;
use crate::timestamp;

pub const MIN_ITEMS: usize = 1;
pub const MAX_ITEMS: usize = 500;
pub const DEFAULT_ITEMS: usize = 100;

pub const DEFAULT_SERVER: &str = "https://www.vesti.ru";
static DEFAULT_URL: Lazy<Url> = Lazy::new(|| Url::parse(DEFAULT_SERVER).unwrap());

pub const API_PATH: &str = "/api/news";

/// Batches the reader may get ahead of the writer.
pub const QUEUE_CAPACITY: usize = 10;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(20);

pub const USER_AGENT: &str = concat!(
    env!("CARGO_PKG_NAME"),
    "/",
    env!("CARGO_PKG_VERSION_MAJOR"),
    ".",
    env!("CARGO_PKG_VERSION_MINOR"),
);

/// Static `<channel>` metadata.
#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub title: String,
    pub link: String,
    pub description: String,
}

impl ChannelInfo {
    fn for_site(site: &Site) -> Self {
        Self {
            title: "vesti.ru Новости".to_string(),
            link: site.origin().to_string(),
            description: "Лента новостей".to_string(),
        }
    }
}

/// Everything a run needs, already validated.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub site: Site,
    pub api_path: String,
    pub max_items: usize,
    pub channel: ChannelInfo,
    /// Civil time zone of the dates in the API.
    pub zone: FixedOffset,
}

impl FeedConfig {
    /// Configuration for the public site with `max_items` as the target.
    pub fn new(max_items: usize) -> Result<Self, FeedError> {
        Self::with_server(&DEFAULT_URL, max_items)
    }

    pub fn with_server(server: &Url, max_items: usize) -> Result<Self, FeedError> {
        if !(MIN_ITEMS..=MAX_ITEMS).contains(&max_items) {
            return Err(FeedError::InvalidItemCount(max_items));
        }

        let site = Site::new(server);
        Ok(Self {
            channel: ChannelInfo::for_site(&site),
            site,
            api_path: API_PATH.to_string(),
            max_items,
            zone: timestamp::moscow(),
        })
    }
}
