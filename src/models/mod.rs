// src/models/mod.rs

//! Domain models for the notifier.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod credentials;
mod record;
mod session;

// Re-export all public types
pub use config::{
    Config, CrawlerConfig, LoggingConfig, NavigationStep, NotifyConfig, PortalConfig,
    ScheduleConfig, SinkKind, StorageConfig,
};
pub use credentials::Credentials;
pub use record::{ChangeEvent, Record, Snapshot};
pub use session::{FormMethod, FormSubmission, Page, SessionState};
