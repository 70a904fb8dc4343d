// src/lib.rs

//! TUCaN grade notifier library.

pub mod error;
pub mod logging;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
