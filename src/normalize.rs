//! Merging a bookmark and its analysis response into one article.
//!
//! The bookmark service is authoritative for identity and metadata; the
//! analysis service fills gaps and is the only source of body text and
//! content type. For every shared field the bookmark value wins when it is
//! present, the analysis value is used otherwise, and the field is left
//! empty when neither source has it. A key that is missing and a key that
//! is explicitly `null` are treated the same.

use crate::error::{PipelineError, Result};
use crate::models::{
    AnnotatedBookmark, ArticleRecord, NumericField, RawAnalysisRecord, RawBookmarkRecord, Tags,
};
use std::collections::HashSet;
use tracing::{debug, instrument, warn};

/// Pocket tag key that is not a valid identifier downstream.
const TIME_COM_TAG: &str = "time.com";
/// Replacement key for [`TIME_COM_TAG`].
const TIME_COM_TAG_SANITIZED: &str = "time_com";

/// Rename the `time.com` tag key to `time_com`, keeping its value.
///
/// Applying this more than once is the same as applying it once.
pub fn sanitize_tags(tags: &mut Tags) {
    if let Some(value) = tags.remove(TIME_COM_TAG) {
        tags.insert(TIME_COM_TAG_SANITIZED.to_string(), value);
    }
}

/// Merge one bookmark with its optional analysis record.
///
/// # Errors
///
/// Returns [`PipelineError::MissingResolvedId`] when the bookmark has no
/// `resolved_id`. No other input can make this fail.
pub fn normalize(
    bookmark: &RawBookmarkRecord,
    analysis: Option<&RawAnalysisRecord>,
) -> Result<ArticleRecord> {
    let resolved_id = bookmark
        .resolved_id
        .clone()
        .ok_or_else(|| PipelineError::MissingResolvedId {
            item_id: bookmark.item_id.clone(),
        })?;

    let from_analysis = |pick: fn(&RawAnalysisRecord) -> &Option<String>| {
        analysis.and_then(|a| pick(a).clone())
    };

    let tags = bookmark.tags.clone().map(|mut tags| {
        sanitize_tags(&mut tags);
        tags
    });

    Ok(ArticleRecord {
        resolved_id,
        resolved_title: bookmark
            .resolved_title
            .clone()
            .or_else(|| from_analysis(|a| &a.title)),
        resolved_url: bookmark
            .resolved_url
            .clone()
            .or_else(|| from_analysis(|a| &a.resolved_url)),
        excerpt: bookmark
            .excerpt
            .clone()
            .or_else(|| from_analysis(|a| &a.excerpt)),
        text: from_analysis(|a| &a.text),
        kind: from_analysis(|a| &a.kind),
        word_count: bookmark.word_count.clone(),
        is_archived: is_archived(bookmark.status.as_ref()),
        tags,
    })
}

/// A bookmark is archived when its status is a nonzero integer. A missing
/// or unparseable status counts as active.
fn is_archived(status: Option<&NumericField>) -> bool {
    status
        .and_then(NumericField::as_i64)
        .is_some_and(|code| code != 0)
}

/// Normalize a whole collection.
///
/// Fails on the first bookmark without a `resolved_id`. When two bookmarks
/// resolve to the same article, the first one is kept and the later ones
/// are logged and skipped so `resolved_id` stays unique.
#[instrument(level = "info", skip_all)]
pub fn normalize_all<'a, I>(records: I) -> Result<Vec<ArticleRecord>>
where
    I: IntoIterator<Item = (&'a RawBookmarkRecord, Option<&'a RawAnalysisRecord>)>,
{
    let mut seen = HashSet::new();
    let mut articles = Vec::new();

    for (bookmark, analysis) in records {
        let article = normalize(bookmark, analysis)?;
        if !seen.insert(article.resolved_id.clone()) {
            warn!(
                resolved_id = %article.resolved_id,
                item_id = ?bookmark.item_id,
                "Duplicate resolved_id; keeping first occurrence"
            );
            continue;
        }
        articles.push(article);
    }

    debug!(count = articles.len(), "Normalized articles");
    Ok(articles)
}

/// Keep the first stored record per `resolved_id`, in input order.
///
/// Records without a `resolved_id` are passed through so [`normalize_all`]
/// can reject them. Both tables are built from the result, so an article
/// stored twice yields one row and one set of edges.
pub fn first_per_resolved_id(records: &[AnnotatedBookmark]) -> Vec<&AnnotatedBookmark> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|record| match record.bookmark.resolved_id.as_deref() {
            Some(id) if !seen.insert(id) => {
                warn!(
                    resolved_id = id,
                    item_id = ?record.bookmark.item_id,
                    "Duplicate stored record; keeping first occurrence"
                );
                false
            }
            _ => true,
        })
        .collect()
}
