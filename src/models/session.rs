//! Pages, form submissions, and the navigation state machine.

use std::fmt;

use scraper::Html;
use url::Url;

/// A fetched page: the final URL after redirects plus its markup.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: Url,
    pub html: String,
}

impl Page {
    pub fn new(url: Url, html: impl Into<String>) -> Self {
        Self {
            url,
            html: html.into(),
        }
    }

    /// Parse the markup. The returned document is not `Send`; keep it out of `.await` points.
    pub fn document(&self) -> Html {
        Html::parse_document(&self.html)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMethod {
    Get,
    Post,
}

/// A filled-in form ready to be sent.
#[derive(Debug, Clone)]
pub struct FormSubmission {
    pub action: Url,
    pub method: FormMethod,
    pub fields: Vec<(String, String)>,
}

impl FormSubmission {
    /// Set a field, replacing an existing value with the same name.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Progress of a session through the portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
    /// Index of the last navigation step followed
    NavigatedTo(usize),
    ResultsReady,
    Failed(String),
}

impl SessionState {
    /// Whether moving to `next` is a legal transition.
    pub fn can_advance_to(&self, next: &SessionState) -> bool {
        use SessionState::*;

        match (self, next) {
            (Failed(_), _) => false,
            (_, Failed(_)) => true,
            (Unauthenticated, Authenticated) => true,
            (Authenticated, NavigatedTo(0)) => true,
            (NavigatedTo(i), NavigatedTo(j)) => *j == i + 1,
            // A zero-step path is valid: the login landing page holds the results.
            (Authenticated, ResultsReady) | (NavigatedTo(_), ResultsReady) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Unauthenticated => f.write_str("unauthenticated"),
            SessionState::Authenticated => f.write_str("authenticated"),
            SessionState::NavigatedTo(i) => write!(f, "navigated to step {}", i + 1),
            SessionState::ResultsReady => f.write_str("results ready"),
            SessionState::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}
