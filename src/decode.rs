use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use url::Url;

use crate::error::FeedError;
use crate::link::Site;

/// One news entry as the API returns it.
///
/// Field names are matched in the API's camelCase and also in the
/// capitalised form some endpoints use. A missing or `null` field reads as
/// empty. `title` and `anons` keep their bytes as sent, so a broken sequence
/// in one record spoils only that text and never the page.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RawRecord {
    #[serde(rename = "id", alias = "ID", alias = "Id")]
    pub id: u64,
    #[serde(rename = "title", alias = "Title", default, deserialize_with = "raw_text")]
    pub title: Vec<u8>,
    #[serde(rename = "anons", alias = "Anons", default, deserialize_with = "raw_text")]
    pub anons: Vec<u8>,
    #[serde(rename = "url", alias = "URL", alias = "Url", default, deserialize_with = "lossy_text")]
    pub url: String,
    #[serde(rename = "datePub", alias = "DatePub", default, deserialize_with = "or_default")]
    pub date_pub: DatePub,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct DatePub {
    #[serde(rename = "day", alias = "Day", default, deserialize_with = "lossy_text")]
    pub day: String,
    #[serde(rename = "time", alias = "Time", default, deserialize_with = "lossy_text")]
    pub time: String,
}

/// Accepts a JSON string without validating it, or `null`.
struct RawTextVisitor;

impl<'de> Visitor<'de> for RawTextVisitor {
    type Value = Vec<u8>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a string or null")
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(Vec::new())
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(Vec::new())
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
        // serde_json hands byte strings over unvalidated, lone surrogates included
        d.deserialize_byte_buf(self)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(v.as_bytes().to_vec())
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
        Ok(v.to_vec())
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
        Ok(v)
    }
}

fn raw_text<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
    d.deserialize_option(RawTextVisitor)
}

// Broken sequences become U+FFFD; the field is validated later anyway.
fn lossy_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let bytes = raw_text(d)?;
    Ok(match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

fn or_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(alias = "Success", default)]
    success: bool,
    #[serde(alias = "Data", default, deserialize_with = "or_default")]
    data: Vec<RawRecord>,
    #[serde(alias = "Pagination", default, deserialize_with = "or_default")]
    pagination: Pagination,
}

#[derive(Debug, Default, Deserialize)]
struct Pagination {
    #[serde(alias = "Next", default, deserialize_with = "lossy_text")]
    next: String,
}

/// One page worth of records.
#[derive(Debug, Clone)]
pub struct Batch {
    pub records: Vec<RawRecord>,
    /// Page this batch was read from.
    pub page: Url,
    /// Page to read next.
    pub next: Url,
}

impl Batch {
    /// The provider points back at the page just read once it runs out.
    pub fn is_last(&self) -> bool {
        self.next == self.page
    }
}

/// Decodes the body fetched from `page` into a validated batch.
pub fn decode_batch(body: &[u8], page: &Url, site: &Site) -> Result<Batch, FeedError> {
    let envelope: Envelope = serde_json::from_slice(body).map_err(|source| FeedError::Decode {
        url: page.clone(),
        source,
    })?;

    if !envelope.success {
        return Err(FeedError::Unsuccessful { url: page.clone() });
    }
    if envelope.data.is_empty() {
        return Err(FeedError::EmptyPage { url: page.clone() });
    }

    let next = site
        .resolve(&envelope.pagination.next)
        .map_err(|source| FeedError::Pagination {
            url: page.clone(),
            source,
        })?;

    Ok(Batch {
        records: envelope.data,
        page: page.clone(),
        next,
    })
}
