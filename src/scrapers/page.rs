//! Direct page scraping for the onboarding flow.
//!
//! The client already carries a browser User-Agent (see
//! [`crate::config::BROWSER_USER_AGENT`]); a few sites serve an empty shell
//! to anything else.

use crate::error::Result;
use reqwest::Client;
use tracing::{debug, instrument, warn};

/// Fetch a page body. Non-200 responses yield `None`.
#[instrument(level = "info", skip(client))]
pub async fn fetch_page(client: &Client, url: &str) -> Result<Option<String>> {
    let response = client
        .get(url)
        .header(
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        )
        .send()
        .await?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        warn!(status = status.as_u16(), "Page fetch returned non-200; skipping");
        return Ok(None);
    }

    let body = response.text().await?;
    debug!(bytes = body.len(), "Fetched page");
    Ok(Some(body))
}
