//! Producer/consumer runner.
//!
//! A reader task walks the paginated API and pushes each decoded page into a
//! bounded queue. The calling task pulls pages off the queue, deduplicates and
//! normalizes their records and streams them into the feed. All dedup state
//! and the sink stay on the consumer side.

use std::io::Write;

use reqwest::Client;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use crate::config::{FeedConfig, QUEUE_CAPACITY};
use crate::decode::{decode_batch, Batch};
use crate::error::FeedError;
use crate::feed::FeedWriter;
use crate::fetch::PageFetcher;
use crate::link::Site;
use crate::transform::Deduplicator;

/// Counters reported at the end of a successful run. `pages` counts the
/// pages that reached the writer, not those fetched ahead of need.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub items: usize,
    pub pages: usize,
    pub duplicates: usize,
    pub rejected: usize,
}

/// How the reader finished when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderExit {
    /// The consumer needs nothing more.
    Stopped,
    /// The API pointed back at the page just read.
    Exhausted,
}

/// Walks the API one page at a time, following the pagination cursor.
pub struct BatchReader {
    fetcher: PageFetcher,
    site: Site,
    next_url: Url,
}

impl BatchReader {
    pub fn new(fetcher: PageFetcher, site: Site, start: Url) -> Self {
        Self {
            fetcher,
            site,
            next_url: start,
        }
    }

    /// Fetches and decodes the current page, advancing the cursor on success.
    pub async fn next_batch(&mut self) -> Result<Batch, FeedError> {
        let body = self.fetcher.fetch(&self.next_url).await?;
        let batch = decode_batch(&body, &self.next_url, &self.site)?;
        self.next_url = batch.next.clone();
        Ok(batch)
    }

    /// Feeds batches into `tx` until stopped, exhausted or failed.
    ///
    /// `shutdown` is the run-wide signal, `stop` is raised by the consumer
    /// when it wants no more. Both interrupt an in-flight request as well as a
    /// send blocked on a full queue.
    async fn run(
        mut self,
        tx: mpsc::Sender<Batch>,
        shutdown: CancellationToken,
        stop: CancellationToken,
    ) -> Result<(usize, ReaderExit), FeedError> {
        let mut pages = 0;

        loop {
            let batch = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Err(FeedError::Shutdown),
                _ = stop.cancelled() => return Ok((pages, ReaderExit::Stopped)),
                batch = self.next_batch() => batch?,
            };

            pages += 1;
            let last = batch.is_last();

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Err(FeedError::Shutdown),
                _ = stop.cancelled() => return Ok((pages, ReaderExit::Stopped)),
                sent = tx.send(batch) => {
                    if sent.is_err() {
                        return Ok((pages, ReaderExit::Stopped));
                    }
                }
            }

            if last {
                return Ok((pages, ReaderExit::Exhausted));
            }
        }
    }
}

/// Runs the whole pipeline and writes a complete feed to `sink`.
///
/// The footer is written only when the run succeeds. On any error the
/// document stops where the error hit; items already queued before a
/// reader failure are still written first.
pub async fn run<W: Write>(
    config: &FeedConfig,
    client: Client,
    sink: W,
    shutdown: CancellationToken,
) -> Result<RunSummary, FeedError> {
    let start = config
        .site
        .resolve(&config.api_path)
        .map_err(FeedError::ApiPath)?;

    let reader = BatchReader::new(PageFetcher::new(client), config.site.clone(), start);
    let (tx, mut rx) = mpsc::channel(QUEUE_CAPACITY);
    let stop = shutdown.child_token();

    let producer = tokio::spawn(reader.run(tx, shutdown.clone(), stop.clone()));
    info!("news reader thread started");

    let mut dedup = Deduplicator::new(config.site.clone(), config.zone, config.max_items);
    let mut feed = FeedWriter::new(sink);

    let consumed = consume(&mut rx, &mut dedup, &mut feed, config, &shutdown).await;

    // Whatever happened on this side, the reader has nothing more to do.
    stop.cancel();
    rx.close();
    let produced = producer.await;

    let reached_target = match consumed {
        Ok(reached) => reached,
        Err(e) => return Err(e),
    };

    match produced? {
        Ok((pages, exit)) => {
            let exhausted = exit == ReaderExit::Exhausted;
            info!(
                pages,
                items = dedup.accepted(),
                exhausted,
                "news reader thread has completed"
            );
        }
        Err(e) if reached_target && !e.is_shutdown() => {
            warn!(error = %e, "news reader failed after the target was reached");
        }
        Err(e) => return Err(e),
    }

    let items = feed.items();
    feed.finish()?;

    Ok(RunSummary {
        items,
        pages: dedup.batches(),
        duplicates: dedup.duplicates(),
        rejected: dedup.rejected(),
    })
}

/// Drains the queue into the feed. Returns whether the target was reached.
async fn consume<W: Write>(
    rx: &mut mpsc::Receiver<Batch>,
    dedup: &mut Deduplicator,
    feed: &mut FeedWriter<W>,
    config: &FeedConfig,
    shutdown: &CancellationToken,
) -> Result<bool, FeedError> {
    feed.start(&config.channel)?;

    loop {
        let batch = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Err(FeedError::Shutdown),
            batch = rx.recv() => batch,
        };

        // Reader is done, either finished or failed.
        let Some(batch) = batch else {
            return Ok(false);
        };

        let accepted = dedup.accept(batch);
        feed.write_batch(&accepted.records)?;

        if accepted.complete {
            return Ok(true);
        }
    }
}
