//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::services::LinkMatcher;

/// Longest accepted poll interval (one week).
pub const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Portal location, login form, and navigation path
    #[serde(default)]
    pub portal: PortalConfig,

    /// HTTP client behavior
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Snapshot and lock file location
    #[serde(default)]
    pub storage: StorageConfig,

    /// Poll interval
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Notification transport
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Log verbosity
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.schedule.interval_minutes == 0 {
            return Err(AppError::validation(
                "schedule.interval_minutes must be > 0",
            ));
        }
        if self.schedule.interval_minutes > MAX_INTERVAL_MINUTES {
            return Err(AppError::validation(format!(
                "schedule.interval_minutes must be <= {MAX_INTERVAL_MINUTES}"
            )));
        }
        if self.portal.username_field.trim().is_empty()
            || self.portal.password_field.trim().is_empty()
        {
            return Err(AppError::validation("portal login field names are empty"));
        }
        if self.portal.navigation.is_empty() {
            return Err(AppError::validation("No navigation steps defined"));
        }
        url::Url::parse(&self.portal.entry_url)?;
        self.portal.link_matchers()?;
        self.notify.validate()?;
        Ok(())
    }
}

/// Portal entry point and page structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Page carrying the login form
    #[serde(default = "defaults::entry_url")]
    pub entry_url: String,

    /// Index of the login form among the page's forms
    #[serde(default)]
    pub login_form_index: usize,

    /// Name of the username input
    #[serde(default = "defaults::username_field")]
    pub username_field: String,

    /// Name of the password input
    #[serde(default = "defaults::password_field")]
    pub password_field: String,

    /// Selector identifying the results table
    #[serde(default = "defaults::results_table_selector")]
    pub results_table_selector: String,

    /// Links followed after login, in order
    #[serde(default = "defaults::navigation")]
    pub navigation: Vec<NavigationStep>,
}

impl PortalConfig {
    /// Compile the navigation steps into link matchers.
    pub fn link_matchers(&self) -> Result<Vec<LinkMatcher>> {
        self.navigation
            .iter()
            .map(|step| LinkMatcher::new(&step.name, &step.patterns))
            .collect()
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            entry_url: defaults::entry_url(),
            login_form_index: 0,
            username_field: defaults::username_field(),
            password_field: defaults::password_field(),
            results_table_selector: defaults::results_table_selector(),
            navigation: defaults::navigation(),
        }
    }
}

/// A single link-following step with one pattern per portal language.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationStep {
    pub name: String,
    pub patterns: Vec<String>,
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Refresh redirects followed per request
    #[serde(default = "defaults::max_refreshes")]
    pub max_refreshes: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_refreshes: defaults::max_refreshes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "defaults::data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "defaults::interval")]
    pub interval_minutes: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_minutes: defaults::interval(),
        }
    }
}

/// Which transport delivers change notifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Log,
    Mail,
    Webhook,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub sink: SinkKind,

    /// Recipient (and sender) for the mail sink
    #[serde(default)]
    pub mail_address: Option<String>,

    #[serde(default = "defaults::mail_subject")]
    pub mail_subject: String,

    #[serde(default = "defaults::mail_command")]
    pub mail_command: String,

    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl NotifyConfig {
    fn validate(&self) -> Result<()> {
        match self.sink {
            SinkKind::Log => Ok(()),
            SinkKind::Mail => match &self.mail_address {
                Some(address) if !address.trim().is_empty() => Ok(()),
                _ => Err(AppError::validation(
                    "notify.mail_address is required for the mail sink",
                )),
            },
            SinkKind::Webhook => match &self.webhook_url {
                Some(url) => {
                    url::Url::parse(url)?;
                    Ok(())
                }
                None => Err(AppError::validation(
                    "notify.webhook_url is required for the webhook sink",
                )),
            },
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            sink: SinkKind::default(),
            mail_address: None,
            mail_subject: defaults::mail_subject(),
            mail_command: defaults::mail_command(),
            webhook_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use super::NavigationStep;

    // Portal defaults
    pub fn entry_url() -> String {
        "https://www.tucan.tu-darmstadt.de/scripts/mgrqispi.dll?APPNAME=CampusNet&PRGNAME=EXTERNALPAGES&ARGUMENTS=-N000000000000001,-N000344,-Awelcome".into()
    }
    pub fn username_field() -> String {
        "usrname".into()
    }
    pub fn password_field() -> String {
        "pass".into()
    }
    pub fn results_table_selector() -> String {
        "table.nb.list".into()
    }
    pub fn navigation() -> Vec<NavigationStep> {
        vec![
            NavigationStep {
                name: "Examinations".to_string(),
                patterns: vec!["Examinations$".to_string(), "Prüfungen$".to_string()],
            },
            NavigationStep {
                name: "Semester Results".to_string(),
                patterns: vec![
                    "Semester Results$".to_string(),
                    "Semesterergebnisse$".to_string(),
                ],
            },
            NavigationStep {
                name: "Module Results".to_string(),
                patterns: vec![
                    "Module Results$".to_string(),
                    "Modulergebnisse$".to_string(),
                ],
            },
        ]
    }

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; tucan-notifier/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_refreshes() -> usize {
        3
    }

    pub fn data_dir() -> PathBuf {
        PathBuf::from("data")
    }

    pub fn interval() -> u64 {
        15
    }

    // Notification defaults
    pub fn mail_subject() -> String {
        "[TUCAN] - New Grade Received".into()
    }
    pub fn mail_command() -> String {
        "mail".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
