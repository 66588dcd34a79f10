use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, Utc};
use tracing::warn;
use url::Url;

use crate::decode::{Batch, RawRecord};
use crate::error::RecordError;
use crate::link::Site;
use crate::timestamp::make_timestamp;

/// A record that passed every check and is ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRecord {
    pub id: u64,
    /// Bytes as received, possibly not valid UTF-8. Escaping happens when the
    /// item is written.
    pub title: Vec<u8>,
    pub description: Vec<u8>,
    pub link: Url,
    pub published: DateTime<Utc>,
}

/// Records accepted from one batch.
#[derive(Debug, Default)]
pub struct Accepted {
    pub records: Vec<NormalizedRecord>,
    /// The target count has been reached; no further batches are needed.
    pub complete: bool,
}

/// Turns raw records into normalized ones, dropping duplicates and records
/// that fail validation.
///
/// An identifier is remembered only once its record has been accepted, so a
/// record dropped for a bad link or date is looked at again if it reappears.
#[derive(Debug)]
pub struct Deduplicator {
    site: Site,
    zone: FixedOffset,
    target: usize,
    seen: HashSet<u64>,
    batches: usize,
    duplicates: usize,
    rejected: usize,
}

impl Deduplicator {
    pub fn new(site: Site, zone: FixedOffset, target: usize) -> Self {
        Self {
            site,
            zone,
            target,
            seen: HashSet::with_capacity(target),
            batches: 0,
            duplicates: 0,
            rejected: 0,
        }
    }

    /// Processes one batch in order.
    ///
    /// Stops as soon as the target is reached, so the number of accepted
    /// records never exceeds it even when the batch holds more.
    pub fn accept(&mut self, batch: Batch) -> Accepted {
        let mut out = Accepted::default();
        self.batches += 1;

        for raw in batch.records {
            if self.is_complete() {
                break;
            }

            if self.seen.contains(&raw.id) {
                warn!(id = raw.id, "skipping duplicate news item");
                self.duplicates += 1;
                continue;
            }

            match self.normalize(raw) {
                Ok(rec) => {
                    self.seen.insert(rec.id);
                    out.records.push(rec);
                }
                Err((id, e)) => {
                    warn!(id, error = %e, "skipping news item");
                    self.rejected += 1;
                }
            }
        }

        out.complete = self.is_complete();
        out
    }

    fn normalize(&self, raw: RawRecord) -> Result<NormalizedRecord, (u64, RecordError)> {
        let id = raw.id;
        let link = self
            .site
            .resolve(&raw.url)
            .map_err(|e| (id, RecordError::from(e)))?;
        let published = make_timestamp(&raw.date_pub.day, &raw.date_pub.time, &self.zone)
            .map_err(|e| (id, RecordError::from(e)))?;

        Ok(NormalizedRecord {
            id,
            title: raw.title,
            description: raw.anons,
            link,
            published,
        })
    }

    pub fn is_complete(&self) -> bool {
        self.seen.len() >= self.target
    }

    pub fn accepted(&self) -> usize {
        self.seen.len()
    }

    pub fn batches(&self) -> usize {
        self.batches
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }
}
