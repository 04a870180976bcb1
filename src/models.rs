//! Data models for bookmarks, analysis responses and the merged article.
//!
//! This module defines the record shapes that flow through the pipeline:
//! - [`RawBookmarkRecord`]: One saved item as reported by the Pocket API
//! - [`RawAnalysisRecord`]: The Diffbot analysis response for one URL
//! - [`AnnotatedBookmark`]: A bookmark stored together with its enrichment
//! - [`ArticleRecord`]: The canonical, merged article
//! - [`LinkEdge`]: One `resolved_id → link` row of the links table
//!
//! Pocket reports several numeric fields as strings (`"status": "1"`,
//! `"word_count": "1532"`), so those are modelled with [`NumericField`],
//! which accepts either representation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Tags keyed by tag name, as Pocket returns them.
///
/// The values are left as raw JSON (`{"item_id": "..", "tag": ".."}` in
/// practice) since nothing downstream interprets them.
pub type Tags = BTreeMap<String, Value>;

/// A field the bookmark service reports either as an integer or as a
/// string holding one.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum NumericField {
    Int(i64),
    Text(String),
}

impl NumericField {
    /// Coerce to an integer. Strings are trimmed and parsed; anything that
    /// does not parse yields `None`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            NumericField::Int(n) => Some(*n),
            NumericField::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl From<i64> for NumericField {
    fn from(n: i64) -> Self {
        NumericField::Int(n)
    }
}

impl From<&str> for NumericField {
    fn from(s: &str) -> Self {
        NumericField::Text(s.to_string())
    }
}

/// One saved item from the bookmark service.
///
/// Every field is optional at this boundary. `resolved_id` is required for
/// normalization and its absence is reported there, not during decoding.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RawBookmarkRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(default)]
    pub resolved_id: Option<String>,
    #[serde(default)]
    pub resolved_title: Option<String>,
    #[serde(default)]
    pub resolved_url: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    /// 0 means active, anything else archived.
    #[serde(default)]
    pub status: Option<NumericField>,
    #[serde(default)]
    pub tags: Option<Tags>,
    /// Word count as reported by the bookmark service.
    #[serde(default)]
    pub word_count: Option<NumericField>,
}

/// The HTML-analysis service response for one URL.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RawAnalysisRecord {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub resolved_url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Content classification, e.g. `"article"`.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    /// Raw HTML body; the source of the extracted link set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

/// A bookmark as kept in the record store: the Pocket fields plus whatever
/// enrichment was gathered for it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AnnotatedBookmark {
    #[serde(flatten)]
    pub bookmark: RawBookmarkRecord,
    /// Analysis-service response, or the scraped page text in the
    /// direct-scraping flow. Older dumps call this `diffbot_response`.
    #[serde(default, alias = "diffbot_response")]
    pub analysis: Option<RawAnalysisRecord>,
    #[serde(default)]
    pub extracted_links: Option<Vec<String>>,
}

/// The canonical merged article.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleRecord {
    pub resolved_id: String,
    pub resolved_title: Option<String>,
    pub resolved_url: Option<String>,
    pub excerpt: Option<String>,
    pub text: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub word_count: Option<NumericField>,
    pub is_archived: bool,
    pub tags: Option<Tags>,
}

/// One row of the links table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkEdge {
    pub resolved_id: String,
    pub link: String,
}
