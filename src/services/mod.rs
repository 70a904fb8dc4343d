//! Service layer for the notifier.
//!
//! This module contains the core of a poll cycle:
//! - Portal login and link following (`SessionNavigator`)
//! - Results table parsing (`RecordExtractor`)
//! - Record fingerprints (`fingerprint`)

mod extractor;
mod fingerprint;
mod navigator;

pub use extractor::RecordExtractor;
pub use fingerprint::fingerprint;
pub use navigator::{LinkMatcher, Session, SessionNavigator};
