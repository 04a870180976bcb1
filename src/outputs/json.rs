//! JSON output of the two tables and the run summary.
//!
//! # Output Structure
//!
//! ```text
//! data_dir/
//! ├── articles.json       # projected, filtered articles
//! ├── articles_raw.json   # every merged article before filtering (onboarding)
//! ├── links.json          # resolved_id → link edges
//! └── run_summary.json    # counts and per-stage filter report
//! ```
//!
//! Each table is a JSON array of row objects.

use crate::error::Result;
use crate::filter::{FilterReport, LinkColumn};
use crate::models::LinkEdge;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

pub const ARTICLES_FILE: &str = "articles.json";
pub const RAW_ARTICLES_FILE: &str = "articles_raw.json";
pub const LINKS_FILE: &str = "links.json";
pub const SUMMARY_FILE: &str = "run_summary.json";

/// What one run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub pipeline: String,
    pub started_at: String,
    pub finished_at: String,
    pub bookmarks: usize,
    /// Stored lines that could not be decoded and never reached either table.
    pub skipped_records: usize,
    /// Later records sharing a `resolved_id` with an earlier one.
    pub duplicates: usize,
    pub enriched: usize,
    pub links: usize,
    pub articles: usize,
    pub filter: FilterReport,
}

/// Serialize `rows` as a JSON array into `dir/file_name`.
#[instrument(level = "info", skip(dir, rows), fields(dir = %dir.display()))]
pub async fn write_table<T: Serialize>(dir: &Path, file_name: &str, rows: &[T]) -> Result<()> {
    let path = dir.join(file_name);
    let json = serde_json::to_vec(rows)?;
    fs::write(&path, json).await?;
    info!(path = %path.display(), rows = rows.len(), "Wrote table");
    Ok(())
}

/// Shape link edges into rows using the configured target column name.
pub fn link_rows(edges: &[LinkEdge], column: LinkColumn) -> Vec<Map<String, Value>> {
    edges
        .iter()
        .map(|edge| {
            let mut row = Map::new();
            row.insert("resolved_id".to_string(), Value::from(edge.resolved_id.clone()));
            row.insert(column.name().to_string(), Value::from(edge.link.clone()));
            row
        })
        .collect()
}

pub async fn write_links(dir: &Path, edges: &[LinkEdge], column: LinkColumn) -> Result<()> {
    write_table(dir, LINKS_FILE, &link_rows(edges, column)).await
}

pub async fn write_summary(dir: &Path, summary: &RunSummary) -> Result<()> {
    let path = dir.join(SUMMARY_FILE);
    fs::write(&path, serde_json::to_vec_pretty(summary)?).await?;
    info!(path = %path.display(), "Wrote run summary");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges() -> Vec<LinkEdge> {
        vec![
            LinkEdge {
                resolved_id: "1".to_string(),
                link: "https://a.example/".to_string(),
            },
            LinkEdge {
                resolved_id: "2".to_string(),
                link: "https://a.example/".to_string(),
            },
        ]
    }

    #[test]
    fn test_link_rows_use_configured_column() {
        let rows = link_rows(&edges(), LinkColumn::FoundLink);
        assert_eq!(rows[0]["found_link"], "https://a.example/");
        assert!(!rows[0].contains_key("link"));

        let rows = link_rows(&edges(), LinkColumn::Link);
        assert_eq!(rows[1]["resolved_id"], "2");
        assert_eq!(rows[1]["link"], "https://a.example/");
    }

    #[tokio::test]
    async fn test_write_links_table() {
        let dir = tempfile::tempdir().unwrap();
        write_links(dir.path(), &edges(), LinkColumn::Link).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join(LINKS_FILE)).unwrap();
        let rows: Vec<Value> = serde_json::from_str(&raw).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["link"], "https://a.example/");
    }
}
