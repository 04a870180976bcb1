//! Pocket v3 API: authorization handshake and full list retrieval.
//!
//! The handshake has three steps:
//!
//! 1. `POST /v3/oauth/request` with the consumer key yields a request token
//! 2. The user opens the authorize URL in a browser and approves the app
//! 3. `POST /v3/oauth/authorize` exchanges the request token for an access token
//!
//! With an access token, `POST /v3/get` (`state=all`, `detailType=complete`)
//! returns every saved item. The raw response is written to
//! `pocket_data_raw.json` and reused on later runs unless a refresh is
//! requested.

use crate::error::{PipelineError, Result};
use crate::models::RawBookmarkRecord;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

const OAUTH_REQUEST_URL: &str = "https://getpocket.com/v3/oauth/request";
const OAUTH_AUTHORIZE_URL: &str = "https://getpocket.com/v3/oauth/authorize";
const RETRIEVE_URL: &str = "https://getpocket.com/v3/get";
const USER_AUTHORIZE_URL: &str = "https://getpocket.com/auth/authorize";

/// File name of the cached raw retrieve response.
pub const RAW_CACHE_FILE: &str = "pocket_data_raw.json";

/// Credentials for the Pocket API.
#[derive(Debug, Clone)]
pub struct PocketAuth {
    pub consumer_key: String,
    pub redirect_uri: String,
    /// Skips the handshake when already known.
    pub access_token: Option<String>,
    /// How long to wait for the user to approve the request token.
    pub authorize_wait: Duration,
}

#[derive(Debug, Deserialize)]
struct RequestTokenResponse {
    code: String,
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
    #[serde(default)]
    username: Option<String>,
}

/// The raw retrieve response, kept whole so it can be cached verbatim.
#[derive(Debug, Clone)]
pub struct PocketList {
    raw: Value,
}

impl PocketList {
    pub fn from_value(raw: Value) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Decode the saved items.
    ///
    /// Pocket sends `list` as an object keyed by item id, or as an empty
    /// array when nothing is saved. Items come back in key order.
    pub fn bookmarks(&self) -> Result<Vec<RawBookmarkRecord>> {
        match self.raw.get("list") {
            Some(Value::Object(items)) => items
                .values()
                .map(|item| RawBookmarkRecord::deserialize(item).map_err(PipelineError::from))
                .collect(),
            _ => Ok(Vec::new()),
        }
    }
}

/// The URL the user must open to approve a request token.
pub fn authorize_url(request_token: &str, redirect_uri: &str) -> String {
    format!(
        "{}?request_token={}&redirect_uri={}",
        USER_AUTHORIZE_URL,
        urlencoding::encode(request_token),
        urlencoding::encode(redirect_uri)
    )
}

async fn post_json(client: &Client, url: &str, body: &Value, step: &'static str) -> Result<Value> {
    let response = client
        .post(url)
        .header("X-Accept", "application/json")
        .json(body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        warn!(step, status = status.as_u16(), headers = ?response.headers(), "Pocket request rejected");
        return Err(PipelineError::Auth {
            step,
            status: status.as_u16(),
        });
    }
    Ok(response.json().await?)
}

/// Run the OAuth handshake and return an access token.
#[instrument(level = "info", skip_all)]
pub async fn authorize(client: &Client, auth: &PocketAuth) -> Result<String> {
    let body = json!({"consumer_key": auth.consumer_key, "redirect_uri": auth.redirect_uri});
    let token: RequestTokenResponse =
        serde_json::from_value(post_json(client, OAUTH_REQUEST_URL, &body, "oauth/request").await?)?;
    debug!("Obtained request token");

    let url = authorize_url(&token.code, &auth.redirect_uri);
    info!(%url, wait = ?auth.authorize_wait, "Waiting for the request token to be approved");
    println!("Approve access in your browser:\n  {url}\n");
    sleep(auth.authorize_wait).await;

    let body = json!({"consumer_key": auth.consumer_key, "code": token.code});
    let access: AccessTokenResponse =
        serde_json::from_value(post_json(client, OAUTH_AUTHORIZE_URL, &body, "oauth/authorize").await?)?;
    info!(username = ?access.username, "Obtained access token");

    Ok(access.access_token)
}

/// Retrieve every saved item for an access token.
#[instrument(level = "info", skip_all)]
pub async fn retrieve(client: &Client, consumer_key: &str, access_token: &str) -> Result<PocketList> {
    let body = json!({
        "consumer_key": consumer_key,
        "access_token": access_token,
        "state": "all",
        "detailType": "complete",
    });
    let raw = post_json(client, RETRIEVE_URL, &body, "get").await?;
    Ok(PocketList::from_value(raw))
}

/// Return the cached list when present (and `refresh` is off), otherwise
/// authorize, retrieve, and rewrite the cache.
#[instrument(level = "info", skip(client, auth), fields(cache = %cache_dir.display()))]
pub async fn load_or_fetch(
    client: &Client,
    auth: &PocketAuth,
    cache_dir: &Path,
    refresh: bool,
) -> Result<PocketList> {
    let cache_path = cache_dir.join(RAW_CACHE_FILE);

    if !refresh && fs::try_exists(&cache_path).await? {
        let raw: Value = serde_json::from_str(&fs::read_to_string(&cache_path).await?)?;
        info!(path = %cache_path.display(), "Using cached Pocket list");
        return Ok(PocketList::from_value(raw));
    }

    let access_token = match &auth.access_token {
        Some(token) => token.clone(),
        None => authorize(client, auth).await?,
    };
    let list = retrieve(client, &auth.consumer_key, &access_token).await?;

    fs::write(&cache_path, serde_json::to_vec(list.raw())?).await?;
    info!(path = %cache_path.display(), "Cached Pocket list");
    Ok(list)
}
