//! Command-line interface definitions.
//!
//! Credentials can be passed as flags, through the environment, or in the
//! optional YAML config file; flags and environment win over the file.

use crate::filter::PipelineKind;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Pull the list, enrich with Diffbot, and store annotated records
/// pocket_corpus --data-dir ./data collect --diffbot-token TOKEN
///
/// # Build the tables from the stored records
/// pocket_corpus --data-dir ./data tables
///
/// # One-shot: pull, scrape every page directly, and build the tables
/// pocket_corpus --data-dir ./data onboard
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory for the record store, the Pocket cache and output tables
    #[arg(short, long, global = true, default_value = "data")]
    pub data_dir: PathBuf,

    /// Optional path to config.yaml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch bookmarks, enrich them with Diffbot, and store the annotated records
    Collect {
        #[command(flatten)]
        pocket: PocketArgs,

        /// Diffbot API token
        #[arg(long, env = "DIFFBOT_TOKEN")]
        diffbot_token: Option<String>,
    },

    /// Build the articles and links tables from the stored records
    Tables {
        /// Filter configuration: `store-batch` or `onboarding`
        #[arg(long, default_value = "store-batch")]
        pipeline: PipelineKind,
    },

    /// Fetch bookmarks, scrape each page directly, and build the tables
    Onboard {
        #[command(flatten)]
        pocket: PocketArgs,
    },
}

/// Options shared by the commands that talk to Pocket.
#[derive(Args, Debug)]
pub struct PocketArgs {
    /// Pocket consumer key
    #[arg(long, env = "POCKET_CONSUMER_KEY")]
    pub consumer_key: Option<String>,

    /// Pocket access token; skips the authorization handshake
    #[arg(long, env = "POCKET_ACCESS_TOKEN")]
    pub access_token: Option<String>,

    /// Ignore the cached pocket_data_raw.json and fetch the list again
    #[arg(long)]
    pub refresh: bool,

    /// Seconds to wait for the request token to be approved in the browser
    #[arg(long, default_value_t = 15)]
    pub authorize_wait_secs: u64,

    /// Only process the first N bookmarks
    #[arg(long)]
    pub limit: Option<usize>,
}
