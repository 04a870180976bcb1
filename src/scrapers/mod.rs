//! Network collaborators that gather the raw records.
//!
//! | Source | Module | Method | Notes |
//! |--------|--------|--------|-------|
//! | Pocket | [`pocket`] | v3 REST API | OAuth handshake; raw response cached on disk |
//! | Diffbot | [`diffbot`] | v2 Analyze API | Requires a token; yields text, type and HTML |
//! | Article pages | [`page`] | Direct HTTP GET | Browser User-Agent; non-200 responses are skipped |
//!
//! All requests go out one at a time. Nothing here retries: a failed
//! enrichment leaves the bookmark without analysis data and the run moves on.

pub mod diffbot;
pub mod page;
pub mod pocket;

use crate::error::Result;
use reqwest::Client;
use std::time::Duration;

/// Build the shared HTTP client.
pub fn http_client(user_agent: &str, timeout_secs: u64) -> Result<Client> {
    let client = Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(timeout_secs))
        .build()?;
    Ok(client)
}
