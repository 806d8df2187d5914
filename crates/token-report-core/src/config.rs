//! Configuration loading for token-report
//!
//! Values are layered, highest priority first:
//! command-line overrides, `TOKEN_REPORT_*` environment variables,
//! the JSON credentials file (`~/.token-report.json`), built-in defaults.

use crate::error::{ReportError, Result};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "https://subus.imds.ai";
pub const DEFAULT_TIMEZONE: &str = "Asia/Shanghai";
pub const CONFIG_FILE_NAME: &str = ".token-report.json";

pub const ENV_BASE_URL: &str = "TOKEN_REPORT_BASE_URL";
pub const ENV_EMAIL: &str = "TOKEN_REPORT_EMAIL";
pub const ENV_PASSWORD: &str = "TOKEN_REPORT_PASSWORD";
pub const ENV_TIMEZONE: &str = "TOKEN_REPORT_TIMEZONE";

/// Default location of the credentials file
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_FILE_NAME))
}

/// Validated configuration handed to the API client
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub base_url: String,
    pub email: String,
    pub password: String,
    /// IANA timezone identifier forwarded to the API (e.g. `Asia/Shanghai`)
    pub timezone: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("email", &self.email)
            .field("password", &"********")
            .field("timezone", &self.timezone)
            .finish()
    }
}

impl Config {
    /// Write the configuration to `path` as pretty JSON (whole-file write)
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ReportError::FileWrite {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json =
            serde_json::to_string_pretty(self).map_err(|source| ReportError::Serialization {
                what: "configuration",
                source,
            })?;

        std::fs::write(path, json).map_err(|source| ReportError::FileWrite {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::info!("Saved configuration to {}", path.display());
        Ok(())
    }
}

/// One configuration layer; unset fields defer to lower layers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl PartialConfig {
    /// Read the `TOKEN_REPORT_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a layer from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            base_url: non_empty(lookup(ENV_BASE_URL)),
            email: non_empty(lookup(ENV_EMAIL)),
            password: non_empty(lookup(ENV_PASSWORD)),
            timezone: non_empty(lookup(ENV_TIMEZONE)),
        }
    }

    /// Read the credentials file.
    ///
    /// A missing file yields an empty layer. An unreadable or malformed file is
    /// logged and ignored so that env-only setups keep working.
    pub fn from_file(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!("No config file at {}", path.display());
            return Self::default();
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable config file {}", path.display());
                return Self::default();
            }
        };

        match serde_json::from_str::<PartialConfig>(&content) {
            Ok(layer) => {
                tracing::debug!("Loaded config file {}", path.display());
                layer
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed config file {}", path.display());
                Self::default()
            }
        }
    }

    /// Fill unset fields from `lower`
    pub fn or(self, lower: PartialConfig) -> PartialConfig {
        PartialConfig {
            base_url: non_empty(self.base_url).or(non_empty(lower.base_url)),
            email: non_empty(self.email).or(non_empty(lower.email)),
            password: non_empty(self.password).or(non_empty(lower.password)),
            timezone: non_empty(self.timezone).or(non_empty(lower.timezone)),
        }
    }

    /// Apply defaults and validate credentials
    pub fn resolve(self) -> Result<Config> {
        let email = non_empty(self.email).ok_or_else(|| {
            ReportError::configuration(format!(
                "Email is required. Set {} env var or create ~/{}",
                ENV_EMAIL, CONFIG_FILE_NAME
            ))
        })?;
        let password = non_empty(self.password).ok_or_else(|| {
            ReportError::configuration(format!(
                "Password is required. Set {} env var or create ~/{}",
                ENV_PASSWORD, CONFIG_FILE_NAME
            ))
        })?;

        Ok(Config {
            base_url: non_empty(self.base_url).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            email,
            password,
            timezone: non_empty(self.timezone).unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
        })
    }
}

/// Load the full layered configuration
pub fn load_config(overrides: PartialConfig, config_path: Option<&Path>) -> Result<Config> {
    let file = config_path
        .map(PartialConfig::from_file)
        .unwrap_or_default();

    overrides.or(PartialConfig::from_env()).or(file).resolve()
}

/// Inclusive date range of the report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Resolve optional bounds: `end` defaults to `today`, `start` to
    /// `today - days`. Ordering is not enforced.
    ///
    /// Fails when `today - days` falls outside the supported calendar.
    pub fn resolve(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        days: u32,
        today: NaiveDate,
    ) -> Result<Self> {
        let end = end.unwrap_or(today);
        let start = match start {
            Some(start) => start,
            None => today
                .checked_sub_days(Days::new(u64::from(days)))
                .ok_or_else(|| {
                    ReportError::configuration(format!(
                        "--days {} reaches before the earliest supported date",
                        days
                    ))
                })?,
        };
        Ok(Self { start, end })
    }

    /// `YYYY-MM-DD` start bound as sent to the API
    pub fn start_param(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    /// `YYYY-MM-DD` end bound as sent to the API
    pub fn end_param(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ~ {}", self.start_param(), self.end_param())
    }
}
