//! Outbound link extraction, page text extraction, and the links table.
//!
//! Link sets are taken straight from each page's HTML and turned into
//! [`LinkEdge`] rows without looking at the merged article, so articles
//! that the quality filter later drops still contribute their edges.

use crate::models::LinkEdge;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Node, Selector};
use std::collections::BTreeSet;

static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static NON_LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z]").unwrap());

/// Elements whose text never counts as page content.
const SKIPPED_ELEMENTS: [&str; 4] = ["script", "meta", "link", "title"];

/// Collect every absolute outbound link (`href` starting with `http`) in a
/// document.
pub fn extract_links(html: Option<&str>) -> BTreeSet<String> {
    match html {
        Some(html) => links_in(&Html::parse_document(html)),
        None => BTreeSet::new(),
    }
}

fn links_in(document: &Html) -> BTreeSet<String> {
    document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| href.starts_with("http"))
        .map(str::to_string)
        .collect()
}

/// Reduce a scraped page to `(text, links)`.
///
/// The text keeps only visible words outside `script`, `meta`, `link` and
/// `title`, lowercased and stripped to `a-z`, joined by single spaces.
pub fn extract_text_and_links(html: &str) -> (String, BTreeSet<String>) {
    let document = Html::parse_document(html);
    (page_text(&document), links_in(&document))
}

fn page_text(document: &Html) -> String {
    document
        .root_element()
        .descendants()
        .filter_map(|node| match node.value() {
            Node::Text(text) => Some((node, text)),
            _ => None,
        })
        .filter(|(node, _)| {
            !node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|el| SKIPPED_ELEMENTS.contains(&el.name()))
            })
        })
        .flat_map(|(_, text)| text.split_whitespace())
        .map(|word| NON_LETTER.replace_all(&word.to_lowercase(), "").into_owned())
        .filter(|word| !word.is_empty())
        .join(" ")
}

/// Build the links table: one edge per link in each record's set.
///
/// Records with no link set contribute nothing. Edges are not
/// deduplicated across articles.
pub fn build_links<'a, I, L>(records: I) -> Vec<LinkEdge>
where
    I: IntoIterator<Item = (&'a str, Option<L>)>,
    L: IntoIterator<Item = &'a String>,
{
    records
        .into_iter()
        .flat_map(|(resolved_id, links)| {
            links.into_iter().flatten().map(move |link| LinkEdge {
                resolved_id: resolved_id.to_string(),
                link: link.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html>
          <head>
            <title>Page Title Words</title>
            <meta name="description" content="ignored">
            <script>var tracking = "Script Words";</script>
          </head>
          <body>
            <h1>Hello, World!</h1>
            <p>It's 2016 and Rust-lang is great.</p>
            <a href="https://example.com/one">one</a>
            <a href="http://example.org/two">two</a>
            <a href="/relative/path">relative</a>
            <a href="mailto:someone@example.com">mail</a>
            <a href="https://example.com/one">duplicate</a>
            <a>no href</a>
          </body>
        </html>
    "#;

    #[test]
    fn test_extract_links_keeps_only_http_links() {
        let links = extract_links(Some(PAGE));
        assert_eq!(
            links.into_iter().collect::<Vec<_>>(),
            vec!["http://example.org/two", "https://example.com/one"]
        );
    }

    #[test]
    fn test_extract_links_without_html() {
        assert!(extract_links(None).is_empty());
    }

    #[test]
    fn test_page_text_skips_head_noise_and_cleans_words() {
        let (text, links) = extract_text_and_links(PAGE);
        assert!(!text.contains("title"));
        assert!(!text.contains("tracking"));
        assert!(text.starts_with("hello world"));
        assert!(text.contains("its and rustlang is great"));
        assert!(!text.contains("  "));
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn test_page_text_of_empty_document() {
        let (text, links) = extract_text_and_links("");
        assert!(text.is_empty());
        assert!(links.is_empty());
    }

    #[test]
    fn test_build_links_one_edge_per_link() {
        let a = vec!["https://x.com/".to_string(), "https://y.com/".to_string()];
        let b = vec!["https://x.com/".to_string()];
        let empty: Vec<String> = Vec::new();

        let edges = build_links(vec![
            ("1", Some(&a)),
            ("2", Some(&b)),
            ("3", Some(&empty)),
            ("4", None),
        ]);

        assert_eq!(edges.len(), 3);
        assert_eq!(
            edges.iter().filter(|e| e.link == "https://x.com/").count(),
            2
        );
        assert!(edges.iter().all(|e| e.resolved_id != "3" && e.resolved_id != "4"));
    }
}
