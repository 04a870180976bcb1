//! Enrichment of bookmarks with page text and outbound links.
//!
//! # Architecture
//!
//! - [`Enrich`]: Core trait turning one URL into an [`Enrichment`]
//! - [`DiffbotEnricher`]: Uses the Diffbot Analyze API; links come from its HTML
//! - [`ScrapeEnricher`]: Fetches the page directly and extracts text and links itself
//! - [`enrich_bookmarks`]: Drives an enricher over a batch of bookmarks
//!
//! Bookmarks are processed one after another. A bookmark whose enrichment
//! fails is kept, just without analysis data or links.

use crate::error::Result;
use crate::links::{extract_links, extract_text_and_links};
use crate::models::{AnnotatedBookmark, RawAnalysisRecord, RawBookmarkRecord};
use crate::normalize::sanitize_tags;
use crate::scrapers::{diffbot, page};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// What an enricher found for one URL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrichment {
    pub analysis: Option<RawAnalysisRecord>,
    pub links: BTreeSet<String>,
}

/// Trait for turning a page URL into analysis data and a link set.
pub trait Enrich {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Enrich one URL. `Ok(None)` means the source had nothing for it.
    async fn enrich(&self, url: &str) -> Result<Option<Enrichment>>;
}

/// Enricher backed by the Diffbot Analyze API.
#[derive(Debug)]
pub struct DiffbotEnricher<'a> {
    pub client: &'a Client,
    pub token: &'a str,
}

impl Enrich for DiffbotEnricher<'_> {
    fn name(&self) -> &'static str {
        "diffbot"
    }

    async fn enrich(&self, url: &str) -> Result<Option<Enrichment>> {
        let Some(mut analysis) = diffbot::analyze(self.client, self.token, url).await? else {
            return Ok(None);
        };
        let links = extract_links(analysis.html.as_deref());
        // Links are all we need from the HTML; keep the store small.
        analysis.html = None;
        Ok(Some(Enrichment {
            analysis: Some(analysis),
            links,
        }))
    }
}

/// Enricher that scrapes the page itself.
#[derive(Debug)]
pub struct ScrapeEnricher<'a> {
    pub client: &'a Client,
}

impl Enrich for ScrapeEnricher<'_> {
    fn name(&self) -> &'static str {
        "scrape"
    }

    async fn enrich(&self, url: &str) -> Result<Option<Enrichment>> {
        let Some(html) = page::fetch_page(self.client, url).await? else {
            return Ok(None);
        };
        let (text, links) = extract_text_and_links(&html);
        Ok(Some(Enrichment {
            analysis: Some(RawAnalysisRecord {
                text: Some(text),
                ..Default::default()
            }),
            links,
        }))
    }
}

/// Attach an enrichment (or its absence) to a bookmark, sanitizing tags on
/// the way into the store.
pub fn annotate(mut bookmark: RawBookmarkRecord, enrichment: Option<Enrichment>) -> AnnotatedBookmark {
    if let Some(tags) = bookmark.tags.as_mut() {
        sanitize_tags(tags);
    }
    match enrichment {
        Some(found) => AnnotatedBookmark {
            bookmark,
            analysis: found.analysis,
            extracted_links: Some(found.links.into_iter().collect()),
        },
        None => AnnotatedBookmark {
            bookmark,
            analysis: None,
            extracted_links: None,
        },
    }
}

/// Run `enricher` over every bookmark, in order.
///
/// Bookmarks without a `resolved_url` are not sent anywhere.
#[instrument(level = "info", skip_all, fields(enricher = enricher.name(), count = bookmarks.len()))]
pub async fn enrich_bookmarks<E: Enrich>(
    enricher: &E,
    bookmarks: Vec<RawBookmarkRecord>,
) -> Vec<AnnotatedBookmark> {
    let t0 = Instant::now();
    let total = bookmarks.len();

    let annotated: Vec<AnnotatedBookmark> = stream::iter(bookmarks.into_iter().enumerate())
        .then(|(i, bookmark)| async move {
            let Some(url) = bookmark.resolved_url.clone() else {
                debug!(index = i, item_id = ?bookmark.item_id, "No resolved_url; skipping enrichment");
                return annotate(bookmark, None);
            };
            let enrichment = match enricher.enrich(&url).await {
                Ok(Some(found)) => {
                    debug!(index = i, %url, links = found.links.len(), "Enriched bookmark");
                    Some(found)
                }
                Ok(None) => {
                    warn!(index = i, %url, "Enrichment produced nothing");
                    None
                }
                Err(e) => {
                    error!(index = i, %url, error = %e, "Enrichment failed");
                    None
                }
            };
            annotate(bookmark, enrichment)
        })
        .collect()
        .await;

    let enriched = annotated.iter().filter(|a| a.analysis.is_some()).count();
    info!(
        total,
        enriched,
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "Enrichment complete"
    );
    annotated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::models::Tags;
    use serde_json::json;

    /// Enricher with canned answers keyed by URL.
    #[derive(Debug)]
    struct FakeEnricher;

    impl Enrich for FakeEnricher {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn enrich(&self, url: &str) -> Result<Option<Enrichment>> {
            match url {
                "https://ok.example/" => Ok(Some(Enrichment {
                    analysis: Some(RawAnalysisRecord {
                        text: Some("some words".to_string()),
                        ..Default::default()
                    }),
                    links: ["https://b.example/".to_string(), "https://a.example/".to_string()]
                        .into_iter()
                        .collect(),
                })),
                "https://empty.example/" => Ok(None),
                _ => Err(PipelineError::MissingCredential("fake")),
            }
        }
    }

    fn bookmark(id: &str, url: Option<&str>) -> RawBookmarkRecord {
        RawBookmarkRecord {
            resolved_id: Some(id.to_string()),
            resolved_url: url.map(str::to_string),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_enrich_bookmarks_keeps_every_bookmark() {
        let bookmarks = vec![
            bookmark("1", Some("https://ok.example/")),
            bookmark("2", Some("https://empty.example/")),
            bookmark("3", Some("https://broken.example/")),
            bookmark("4", None),
        ];

        let annotated = enrich_bookmarks(&FakeEnricher, bookmarks).await;
        assert_eq!(annotated.len(), 4);

        assert_eq!(
            annotated[0].extracted_links.as_deref(),
            Some(&["https://a.example/".to_string(), "https://b.example/".to_string()][..])
        );
        assert!(annotated[0].analysis.is_some());
        for a in &annotated[1..] {
            assert!(a.analysis.is_none());
            assert!(a.extracted_links.is_none());
        }
        assert_eq!(annotated[3].bookmark.resolved_id.as_deref(), Some("4"));
    }

    #[test]
    fn test_annotate_sanitizes_tags() {
        let mut b = bookmark("1", None);
        let mut tags = Tags::new();
        tags.insert("time.com".to_string(), json!({"tag": "time.com"}));
        b.tags = Some(tags);

        let annotated = annotate(b, None);
        let tags = annotated.bookmark.tags.unwrap();
        assert!(tags.contains_key("time_com"));
        assert!(!tags.contains_key("time.com"));
    }
}
