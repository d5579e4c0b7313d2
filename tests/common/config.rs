//! Test configuration helpers pointing a backup at a mock server

use chrono::{TimeZone, Utc};
use feishu_backup::{ApiClient, BackupRunner, BackupSource, Config};
use std::path::{Path, PathBuf};
use std::time::Duration;
use wiremock::MockServer;

/// Access token every test client sends
pub const TEST_ACCESS_TOKEN: &str = "u-integration-token";

/// Configuration with millisecond timings, talking to `server`
///
/// Retries back off 5ms per attempt, export polls every 10ms and gives up
/// after 200ms, so failure paths finish quickly.
pub fn test_config(server: &MockServer, source: BackupSource, output_root: &Path) -> Config {
    let mut config = Config::default();
    config.source = source;
    config.base_url = server.uri();
    config.output_dir = output_root.to_path_buf();
    config.retry.backoff_step = Duration::from_millis(5);
    config.export.poll_interval = Duration::from_millis(10);
    config.export.max_wait = Duration::from_millis(200);
    config.credentials.app_id = "cli_integration".to_string();
    config.credentials.app_secret = "integration-secret".to_string();
    config
}

/// Fixed run timestamp so the dated output directory is predictable
pub fn run_dir(config: &Config) -> PathBuf {
    let started = Utc
        .with_ymd_and_hms(2024, 5, 6, 7, 8, 9)
        .single()
        .unwrap_or_else(Utc::now);
    config.run_output_dir(&started)
}

/// Runner authenticated with [`TEST_ACCESS_TOKEN`]
pub fn runner(config: &Config) -> BackupRunner {
    let client = ApiClient::new(config, TEST_ACCESS_TOKEN).unwrap();
    BackupRunner::new(client, config.clone())
}
