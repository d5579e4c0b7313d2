//! Command-line interface
//!
//! ```text
//! feishu-backup [--config FILE] run [--source drive|my_library] [...]
//! feishu-backup [--config FILE] authorize-url
//! feishu-backup [--config FILE] exchange --callback-url URL
//! ```
//!
//! Settings are layered: built-in defaults, then the JSON config file, then
//! environment variables and flags.

use crate::auth::{OAuthClient, TokenStore, authorize_url, obtain_access_token, parse_callback_code};
use crate::backup::BackupRunner;
use crate::client::ApiClient;
use crate::config::{BackupSource, Config};
use crate::error::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Back up Feishu/Lark cloud documents to local files
#[derive(Parser, Debug)]
#[command(name = "feishu-backup")]
#[command(about = "Export Feishu/Lark drive and wiki documents to local files", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// JSON configuration file
    #[arg(long, global = true, env = "FEISHU_BACKUP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Application id (overrides the config file)
    #[arg(long, global = true, env = "FEISHU_APP_ID", hide_env_values = true)]
    pub app_id: Option<String>,

    /// Application secret (overrides the config file)
    #[arg(long, global = true, env = "FEISHU_APP_SECRET", hide_env_values = true)]
    pub app_secret: Option<String>,

    /// Token store path (overrides the config file)
    #[arg(long, global = true)]
    pub token_store: Option<PathBuf>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a backup
    Run(RunArgs),

    /// Print the consent page URL for the first authorization
    AuthorizeUrl,

    /// Exchange the authorization callback for a refresh token and save it
    Exchange(ExchangeArgs),
}

/// Overrides for a backup run
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// What to back up: drive or my_library
    #[arg(long)]
    pub source: Option<BackupSource>,

    /// Library space id (library mode only)
    #[arg(long)]
    pub space_id: Option<String>,

    /// Root output directory
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Write directly into the output directory instead of a timestamped subdirectory
    #[arg(long, default_value_t = false)]
    pub no_date_subdir: bool,

    /// Total requests per API call, first attempt included
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=20))]
    pub max_attempts: Option<u32>,

    /// Seconds between two export status queries
    #[arg(long)]
    pub poll_interval_secs: Option<u64>,

    /// Seconds to wait for one export task before giving up
    #[arg(long)]
    pub max_export_wait_secs: Option<u64>,
}

impl RunArgs {
    /// Apply the flags that were given on top of `config`
    pub fn apply(&self, config: &mut Config) {
        if let Some(source) = self.source {
            config.source = source;
        }
        if let Some(space_id) = &self.space_id {
            config.space_id = space_id.clone();
        }
        if let Some(output_dir) = &self.output_dir {
            config.output_dir = output_dir.clone();
        }
        if self.no_date_subdir {
            config.run_subdir_by_date = false;
        }
        if let Some(max_attempts) = self.max_attempts {
            config.retry.max_attempts = max_attempts;
        }
        if let Some(secs) = self.poll_interval_secs {
            config.export.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.max_export_wait_secs {
            config.export.max_wait = Duration::from_secs(secs);
        }
    }
}

/// Arguments of `exchange`
#[derive(Args, Debug)]
pub struct ExchangeArgs {
    /// Full URL the browser was redirected to after authorizing
    #[arg(long)]
    pub callback_url: String,
}

impl Cli {
    /// Build the effective configuration: defaults, file, then env/flags
    ///
    /// The result is not validated; each command checks what it needs.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(app_id) = &self.app_id {
            config.credentials.app_id = app_id.clone();
        }
        if let Some(app_secret) = &self.app_secret {
            config.credentials.app_secret = app_secret.clone();
        }
        if let Some(token_store) = &self.token_store {
            config.credentials.token_store = token_store.clone();
        }
        if let Commands::Run(args) = &self.command {
            args.apply(&mut config);
        }
        Ok(config)
    }

    /// Execute the selected command and return the process exit status
    ///
    /// Errors returned from here are setup failures (exit status 1); a backup
    /// that ran but recorded failures returns `Ok(2)`.
    pub async fn execute(&self) -> Result<i32> {
        let config = self.load_config()?;

        match &self.command {
            Commands::Run(_) => {
                config.validate()?;
                let access_token = obtain_access_token(&config).await?;
                let output_dir = config.run_output_dir(&chrono::Local::now());
                let client = ApiClient::new(&config, access_token)?;

                let report = BackupRunner::new(client, config).run(&output_dir).await?;
                println!("\n{report}");
                Ok(report.exit_code())
            }
            Commands::AuthorizeUrl => {
                config.validate_app_credentials()?;
                config.validate_redirect_uri()?;
                println!("1) Open this URL and authorize the application:");
                println!("{}", authorize_url(&config.credentials));
                println!();
                println!("2) Then run: feishu-backup exchange --callback-url '<redirected URL>'");
                Ok(0)
            }
            Commands::Exchange(args) => {
                config.validate_app_credentials()?;
                config.validate_redirect_uri()?;
                let code = parse_callback_code(&args.callback_url)?;
                let refresh_token = OAuthClient::new(&config)?
                    .exchange_code(&code, &config.credentials.redirect_uri)
                    .await?;

                let store_path = &config.credentials.token_store;
                TokenStore::with_refresh_token(refresh_token).save(store_path)?;
                info!(token_store = %store_path.display(), "initial refresh token saved");
                println!("[OK] refresh token saved to {}", store_path.display());
                Ok(0)
            }
        }
    }
}
