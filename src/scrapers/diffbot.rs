//! Diffbot v2 Analyze API client.
//!
//! Analyze classifies a page and, for article-like pages, returns the body
//! text, title and the page HTML. A response that carries an `error` key is
//! treated as "no analysis" rather than as a failure.

use crate::error::Result;
use crate::models::RawAnalysisRecord;
use crate::utils::truncate_for_log;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

pub const ANALYZE_ENDPOINT: &str = "https://api.diffbot.com/v2/analyze";

/// Build the request URL for one page.
pub fn analyze_url(token: &str, page_url: &str) -> Result<Url> {
    Ok(Url::parse_with_params(
        ANALYZE_ENDPOINT,
        &[("token", token), ("url", page_url)],
    )?)
}

/// Decode an Analyze response body.
pub fn parse_response(body: Value) -> Result<Option<RawAnalysisRecord>> {
    if let Some(error) = body.get("error") {
        warn!(
            error = %truncate_for_log(&error.to_string(), 200),
            code = ?body.get("errorCode"),
            "Diffbot returned an error"
        );
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(body)?))
}

/// Analyze one page.
#[instrument(level = "info", skip(client, token))]
pub async fn analyze(client: &Client, token: &str, page_url: &str) -> Result<Option<RawAnalysisRecord>> {
    let url = analyze_url(token, page_url)?;
    let body: Value = client.get(url).send().await?.error_for_status()?.json().await?;
    let analysis = parse_response(body)?;
    debug!(found = analysis.is_some(), "Diffbot analysis complete");
    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_analyze_url_encodes_page_url() {
        let url = analyze_url("tok", "https://example.com/a?b=c&d=e").unwrap();
        assert_eq!(url.host_str(), Some("api.diffbot.com"));
        assert_eq!(url.path(), "/v2/analyze");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("token".to_string(), "tok".to_string()));
        assert_eq!(pairs[1], ("url".to_string(), "https://example.com/a?b=c&d=e".to_string()));
    }

    #[test]
    fn test_parse_article_response() {
        let body = json!({
            "type": "article",
            "title": "Headline",
            "text": "Body text",
            "html": "<p>Body text <a href=\"https://x.com\">x</a></p>",
            "resolved_url": "https://example.com/a",
            "author": "ignored"
        });
        let analysis = parse_response(body).unwrap().unwrap();
        assert_eq!(analysis.kind.as_deref(), Some("article"));
        assert_eq!(analysis.text.as_deref(), Some("Body text"));
        assert!(analysis.html.unwrap().contains("x.com"));
    }

    #[test]
    fn test_error_response_is_no_analysis() {
        let body = json!({"error": "Not authorized API token.", "errorCode": 401});
        assert_eq!(parse_response(body).unwrap(), None);
    }
}
