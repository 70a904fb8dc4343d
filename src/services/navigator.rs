// src/services/navigator.rs

//! Portal session navigation.
//!
//! Logs in through the entry page's form, then follows a fixed sequence of
//! links matched by their (English or German) label. Every failure is fatal
//! for the current cycle; sessions are never reused.

use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::logging::LogContext;
use crate::models::{Credentials, FormMethod, FormSubmission, Page, PortalConfig, SessionState};
use crate::utils::http::{PageFetcher, SessionFactory};
use crate::utils::{normalize_whitespace, resolve_url};

/// Matches a link label in any of the portal's languages.
#[derive(Debug, Clone)]
pub struct LinkMatcher {
    name: String,
    patterns: Vec<Regex>,
}

impl LinkMatcher {
    /// Compile case-insensitive alternatives; at least one is required.
    pub fn new(name: &str, patterns: &[String]) -> Result<Self> {
        if patterns.is_empty() {
            return Err(AppError::validation(format!(
                "navigation step '{name}' has no patterns"
            )));
        }
        let patterns = patterns
            .iter()
            .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            name: name.to_string(),
            patterns,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether any alternative matches the whitespace-normalized label.
    pub fn matches(&self, label: &str) -> bool {
        let label = normalize_whitespace(label);
        self.patterns.iter().any(|p| p.is_match(&label))
    }
}

/// An authenticated browsing session positioned on a page.
pub struct Session {
    fetcher: Box<dyn PageFetcher>,
    page: Page,
    state: SessionState,
}

impl Session {
    fn new(fetcher: Box<dyn PageFetcher>, page: Page) -> Self {
        Self {
            fetcher,
            page,
            state: SessionState::Unauthenticated,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    fn advance(&mut self, next: SessionState) -> Result<()> {
        if !self.state.can_advance_to(&next) {
            return Err(AppError::validation(format!(
                "illegal session transition: {} -> {}",
                self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }

    fn fail(&mut self, reason: impl Into<String>) {
        self.state = SessionState::Failed(reason.into());
    }
}

/// Drives a portal session from login to the results page.
pub struct SessionNavigator {
    sessions: Arc<dyn SessionFactory>,
    portal: PortalConfig,
}

impl SessionNavigator {
    pub fn new(sessions: Arc<dyn SessionFactory>, portal: PortalConfig) -> Self {
        Self { sessions, portal }
    }

    /// Open a fresh session and log in.
    pub async fn authenticate(&self, ctx: &LogContext, credentials: &Credentials) -> Result<Session> {
        if credentials.username.trim().is_empty() || credentials.password.is_empty() {
            return Err(AppError::auth("username or password is empty"));
        }

        let fetcher = self.sessions.open()?;
        let entry = Url::parse(&self.portal.entry_url)?;
        ctx.debug(&format!("Opening entry page {entry}"));
        let entry_page = fetcher.get(&entry).await?;

        let form = login_form(&entry_page, &self.portal, credentials)?;
        ctx.debug(&format!("Submitting login form to {}", form.action));
        let landing = fetcher.submit(&form).await?;

        if has_input(&landing, &self.portal.password_field) {
            return Err(AppError::auth("portal rejected the login"));
        }

        let mut session = Session::new(fetcher, landing);
        session.advance(SessionState::Authenticated)?;
        ctx.info(&format!("Logged in as {}", credentials.username));
        Ok(session)
    }

    /// Follow `steps` in order and return the final page.
    pub async fn follow_path(
        &self,
        ctx: &LogContext,
        mut session: Session,
        steps: &[LinkMatcher],
    ) -> Result<Page> {
        for (index, step) in steps.iter().enumerate() {
            let Some(target) = find_link(&session.page, step) else {
                let message = format!("no link matched on {}", session.page.url);
                session.fail(format!("step '{}': {}", step.name(), message));
                ctx.warn(&format!("Session {}", session.state));
                return Err(AppError::navigation(step.name(), message));
            };

            ctx.debug(&format!("Step {}/{} '{}': {}", index + 1, steps.len(), step.name(), target));
            session.page = session.fetcher.get(&target).await?;
            session.advance(SessionState::NavigatedTo(index))?;
        }

        session.advance(SessionState::ResultsReady)?;
        ctx.info(&format!("Reached results page {}", session.page.url));
        Ok(session.page)
    }
}

/// Fill the configured login form of `page`.
fn login_form(page: &Page, portal: &PortalConfig, credentials: &Credentials) -> Result<FormSubmission> {
    let document = page.document();
    let form_sel = parse_selector("form")?;
    let form = document
        .select(&form_sel)
        .nth(portal.login_form_index)
        .ok_or_else(|| AppError::auth(format!("no login form on {}", page.url)))?;

    let action = match form.value().attr("action") {
        Some(href) if !href.trim().is_empty() => resolve_url(&page.url, href)
            .ok_or_else(|| AppError::auth(format!("invalid form action '{href}'")))?,
        _ => page.url.clone(),
    };
    let method = match form.value().attr("method") {
        Some(m) if m.eq_ignore_ascii_case("get") => FormMethod::Get,
        _ => FormMethod::Post,
    };

    let mut submission = FormSubmission {
        action,
        method,
        fields: form_fields(form)?,
    };

    for field in [&portal.username_field, &portal.password_field] {
        if submission.get(field).is_none() {
            return Err(AppError::auth(format!("login form has no '{field}' field")));
        }
    }
    submission.set(&portal.username_field, credentials.username.as_str());
    submission.set(&portal.password_field, credentials.password.as_str());

    Ok(submission)
}

/// Named inputs of a form as a browser would send them, including the first submit button.
fn form_fields(form: ElementRef<'_>) -> Result<Vec<(String, String)>> {
    let input_sel = parse_selector("input[name]")?;
    let mut fields = Vec::new();
    let mut submit_seen = false;

    for input in form.select(&input_sel) {
        let el = input.value();
        let Some(name) = el.attr("name") else { continue };
        let value = el.attr("value").unwrap_or("").to_string();
        let kind = el.attr("type").unwrap_or("text").to_ascii_lowercase();

        match kind.as_str() {
            "submit" => {
                if !submit_seen {
                    submit_seen = true;
                    fields.push((name.to_string(), value));
                }
            }
            "button" | "image" | "reset" | "file" => {}
            "checkbox" | "radio" => {
                if el.attr("checked").is_some() {
                    fields.push((name.to_string(), value));
                }
            }
            _ => fields.push((name.to_string(), value)),
        }
    }
    Ok(fields)
}

/// First link on `page` whose label satisfies `matcher`, resolved to an absolute URL.
fn find_link(page: &Page, matcher: &LinkMatcher) -> Option<Url> {
    let document = page.document();
    let anchor_sel = Selector::parse("a[href]").ok()?;
    document
        .select(&anchor_sel)
        .filter(|a| matcher.matches(&a.text().collect::<String>()))
        .find_map(|a| a.value().attr("href").and_then(|href| resolve_url(&page.url, href)))
}

fn has_input(page: &Page, name: &str) -> bool {
    let document: Html = page.document();
    let Ok(input_sel) = Selector::parse("input[name]") else {
        return false;
    };
    document
        .select(&input_sel)
        .any(|input| input.value().attr("name") == Some(name))
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
