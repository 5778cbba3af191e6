use std::{fs, io, path::Path, time::Duration};

use serde::Deserialize;
use tracing::warn;
use url::Url;

use crate::error::SettingsError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8888";
/// Generation endpoints on the backend routinely take minutes.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(300_000);
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const SETTINGS_FILE: &str = "client.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub base_url: String,
    pub timeout: Duration,
    pub page_size: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            timeout: DEFAULT_TIMEOUT,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    base_url: Option<String>,
    timeout_ms: Option<u64>,
    page_size: Option<u32>,
}

impl ClientSettings {
    /// Checks the base url and timeout, and strips trailing slashes from the url.
    pub fn validated(mut self) -> Result<Self, SettingsError> {
        let trimmed = self.base_url.trim().trim_end_matches('/').to_string();
        let parsed = Url::parse(&trimmed).map_err(|source| SettingsError::BaseUrl {
            value: self.base_url.clone(),
            source,
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SettingsError::UnsupportedScheme(trimmed));
        }
        if self.timeout.is_zero() {
            return Err(SettingsError::ZeroTimeout);
        }
        self.base_url = trimmed;
        self.page_size = self.page_size.max(1);
        Ok(self)
    }
}

/// Defaults, then `client.toml` in the working directory, then environment overrides.
pub fn load_settings() -> Result<ClientSettings, SettingsError> {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ClientSettings, SettingsError> {
    let mut settings = ClientSettings::default();

    if let Some(file_cfg) = read_file_settings(path)? {
        if let Some(v) = file_cfg.base_url {
            settings.base_url = v;
        }
        if let Some(v) = file_cfg.timeout_ms {
            settings.timeout = Duration::from_millis(v);
        }
        if let Some(v) = file_cfg.page_size {
            settings.page_size = v;
        }
    }

    if let Some(v) = env("CASEDESK_BASE_URL") {
        settings.base_url = v;
    }
    if let Some(v) = env("APP__BASE_URL") {
        settings.base_url = v;
    }

    for key in ["CASEDESK_TIMEOUT_MS", "APP__TIMEOUT_MS"] {
        if let Some(v) = env(key) {
            match v.trim().parse::<u64>() {
                Ok(parsed) => settings.timeout = Duration::from_millis(parsed),
                Err(_) => warn!(key, value = %v, "ignoring non-numeric timeout override"),
            }
        }
    }

    if let Some(v) = env("APP__PAGE_SIZE") {
        match v.trim().parse::<u32>() {
            Ok(parsed) => settings.page_size = parsed,
            Err(_) => warn!(value = %v, "ignoring non-numeric page size override"),
        }
    }

    settings.validated()
}

fn read_file_settings(path: &Path) -> Result<Option<FileSettings>, SettingsError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(SettingsError::Read {
                path: display_path(path),
                source,
            })
        }
    };

    toml::from_str::<FileSettings>(&raw)
        .map(Some)
        .map_err(|source| SettingsError::Parse {
            path: display_path(path),
            source,
        })
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
