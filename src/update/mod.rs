//! Release check against a metadata endpoint. Only ever surfaces a prompt; never installs.

use std::cmp::Ordering;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::config::UpdateCheckConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("pinshot/", env!("CARGO_PKG_VERSION"));
const COPY_ACTION: &str = "copy-upgrade-command";

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("release metadata request failed: {message}")]
    NetworkFailed { message: String },
    #[error("release metadata malformed: {0}")]
    InvalidMetadata(#[from] serde_json::Error),
}

impl From<reqwest::Error> for UpdateError {
    fn from(err: reqwest::Error) -> Self {
        Self::NetworkFailed {
            message: err.to_string(),
        }
    }
}

pub type UpdateResult<T> = std::result::Result<T, UpdateError>;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseInfo {
    pub tag_name: String,
    #[serde(default)]
    pub html_url: Option<String>,
}

pub trait ReleaseSource {
    fn latest_release(&self) -> UpdateResult<ReleaseInfo>;
}

/// Fetches release metadata over HTTPS with a blocking client.
#[derive(Debug, Clone)]
pub struct HttpReleaseSource {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl HttpReleaseSource {
    pub fn new(endpoint: impl Into<String>) -> UpdateResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ReleaseSource for HttpReleaseSource {
    fn latest_release(&self) -> UpdateResult<ReleaseInfo> {
        let body = self
            .client
            .get(&self.endpoint)
            .send()?
            .error_for_status()?
            .text()?;
        parse_release(&body)
    }
}

pub fn parse_release(body: &str) -> UpdateResult<ReleaseInfo> {
    Ok(serde_json::from_str(body)?)
}

/// Numeric comparison of dot-separated versions. A leading `v` is ignored,
/// missing components count as zero and anything after the digits of a
/// component (`-rc1`, `+build`) is dropped.
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    let left = version_components(left);
    let right = version_components(right);
    let len = left.len().max(right.len());
    for index in 0..len {
        let a = left.get(index).copied().unwrap_or(0);
        let b = right.get(index).copied().unwrap_or(0);
        match a.cmp(&b) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

fn version_components(version: &str) -> Vec<u64> {
    let version = version.trim();
    let version = version
        .strip_prefix('v')
        .or_else(|| version.strip_prefix('V'))
        .unwrap_or(version);
    version
        .split('.')
        .map(|component| {
            let digits: String = component
                .chars()
                .take_while(|ch| ch.is_ascii_digit())
                .collect();
            digits.parse::<u64>().unwrap_or(0)
        })
        .collect()
}

/// Newer release than `current`, if the source reports one.
pub fn check_for_update<R: ReleaseSource>(
    source: &R,
    current: &str,
) -> UpdateResult<Option<ReleaseInfo>> {
    let release = source.latest_release()?;
    if compare_versions(&release.tag_name, current) == Ordering::Greater {
        tracing::info!(current, latest = %release.tag_name, "update available");
        Ok(Some(release))
    } else {
        tracing::debug!(current, latest = %release.tag_name, "already up to date");
        Ok(None)
    }
}

/// One check cycle: failures are logged and otherwise invisible.
pub fn run_update_check<R: ReleaseSource>(source: &R, current: &str) -> Option<ReleaseInfo> {
    match check_for_update(source, current) {
        Ok(release) => release,
        Err(err) => {
            tracing::warn!(?err, "update check failed");
            None
        }
    }
}

/// Shows the "update available" notification and blocks until it is dismissed.
/// Returns true when the user chose to copy the upgrade command.
pub fn prompt_upgrade(release: &ReleaseInfo, config: &UpdateCheckConfig) -> bool {
    let body = format!(
        "PinShot {} is available.\nUpgrade with: {}",
        release.tag_name, config.upgrade_command
    );
    let handle = match notify_rust::Notification::new()
        .appname("PinShot")
        .summary("Update available")
        .body(&body)
        .action(COPY_ACTION, "Copy upgrade command")
        .show()
    {
        Ok(handle) => handle,
        Err(err) => {
            tracing::warn!("update notification failed: {err}");
            return false;
        }
    };

    let mut chosen = false;
    handle.wait_for_action(|action| chosen = action == COPY_ACTION);
    chosen
}
