// src/logging.rs

//! Logging context handed to every component of a poll cycle.
//!
//! Components never configure logging themselves. Each call receives a
//! [`LogContext`] and logs through it, so every line carries the cycle tag
//! and the binary alone decides where records go.

use chrono::{DateTime, Local};

/// Log level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "debug" | "trace" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }

    pub fn as_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

/// Per-cycle logging context.
#[derive(Debug, Clone)]
pub struct LogContext {
    cycle: u64,
    started_at: DateTime<Local>,
}

impl LogContext {
    pub fn new(cycle: u64) -> Self {
        Self {
            cycle,
            started_at: Local::now(),
        }
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Milliseconds since the cycle started.
    pub fn elapsed_ms(&self) -> i64 {
        (Local::now() - self.started_at).num_milliseconds()
    }

    pub fn debug(&self, message: &str) {
        log::debug!("[cycle {}] {}", self.cycle, message);
    }

    pub fn info(&self, message: &str) {
        log::info!("[cycle {}] {}", self.cycle, message);
    }

    pub fn warn(&self, message: &str) {
        log::warn!("[cycle {}] {}", self.cycle, message);
    }

    pub fn error(&self, message: &str) {
        log::error!("[cycle {}] {}", self.cycle, message);
    }

    /// Log a summary section
    pub fn summary(&self, title: &str, items: &[(&str, String)]) {
        self.info(title);
        for (key, value) in items {
            log::info!("[cycle {}]     {}: {}", self.cycle, key, value);
        }
    }
}
