//! vesti-rss: turn the paginated vesti.ru news API into an RSS 2.0 feed.
//!
//! The binary in `main.rs` only parses flags, sets up logging and signals,
//! and calls [`pipeline::run`].

pub mod config;
pub mod decode;
pub mod error;
pub mod feed;
pub mod fetch;
pub mod link;
pub mod pipeline;
pub mod timestamp;
pub mod transform;
pub mod xml;

pub use config::FeedConfig;
pub use error::FeedError;
pub use pipeline::{run, RunSummary};
