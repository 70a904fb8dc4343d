// src/utils/http.rs

//! HTTP page fetching.
//!
//! The navigator talks to the portal only through [`PageFetcher`]. Every
//! poll cycle opens a fresh fetcher via [`SessionFactory`], so cookies never
//! leak from one cycle into the next.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use scraper::{Html, Selector};
use url::Url;

use crate::error::Result;
use crate::models::{CrawlerConfig, FormMethod, FormSubmission, Page};

/// Fetches pages within one browsing session.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a page by URL.
    async fn get(&self, url: &Url) -> Result<Page>;

    /// Send a filled-in form and return the resulting page.
    async fn submit(&self, form: &FormSubmission) -> Result<Page>;
}

/// Opens independent browsing sessions.
pub trait SessionFactory: Send + Sync {
    fn open(&self) -> Result<Box<dyn PageFetcher>>;
}

/// Create a configured asynchronous HTTP client with its own cookie jar.
pub fn create_async_client(config: &CrawlerConfig) -> Result<Client> {
    let client = Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .cookie_store(true)
        .build()?;
    Ok(client)
}

/// reqwest-backed fetcher that also follows `Refresh` redirects.
pub struct HttpFetcher {
    client: Client,
    max_refreshes: usize,
}

impl HttpFetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            max_refreshes: config.max_refreshes,
        })
    }

    /// Read a response body, following refresh redirects up to the configured limit.
    async fn read_page(&self, response: Response) -> Result<Page> {
        let mut response = response.error_for_status()?;
        let mut hops = 0;

        loop {
            let url = response.url().clone();
            let header = response
                .headers()
                .get("refresh")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let html = response.text().await?;

            match refresh_target(&url, header.as_deref(), &html) {
                Some(next) if hops < self.max_refreshes && next != url => {
                    log::debug!("Following refresh from {} to {}", url, next);
                    hops += 1;
                    response = self.client.get(next).send().await?.error_for_status()?;
                }
                _ => return Ok(Page::new(url, html)),
            }
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn get(&self, url: &Url) -> Result<Page> {
        let response = self.client.get(url.clone()).send().await?;
        self.read_page(response).await
    }

    async fn submit(&self, form: &FormSubmission) -> Result<Page> {
        let request = match form.method {
            FormMethod::Get => self.client.get(form.action.clone()).query(&form.fields),
            FormMethod::Post => self.client.post(form.action.clone()).form(&form.fields),
        };
        let response = request.send().await?;
        self.read_page(response).await
    }
}

/// Builds a fresh [`HttpFetcher`] per session.
#[derive(Debug, Clone)]
pub struct HttpSessionFactory {
    config: CrawlerConfig,
}

impl HttpSessionFactory {
    pub fn new(config: CrawlerConfig) -> Self {
        Self { config }
    }
}

impl SessionFactory for HttpSessionFactory {
    fn open(&self) -> Result<Box<dyn PageFetcher>> {
        Ok(Box::new(HttpFetcher::new(&self.config)?))
    }
}

/// Target of a `Refresh` header or `<meta http-equiv="refresh">`, if any.
pub fn refresh_target(base: &Url, header: Option<&str>, html: &str) -> Option<Url> {
    if let Some(target) = header.and_then(|h| parse_refresh(base, h)) {
        return Some(target);
    }

    let document = Html::parse_document(html);
    let meta = Selector::parse("meta[http-equiv]").ok()?;
    document
        .select(&meta)
        .filter(|el| {
            el.value()
                .attr("http-equiv")
                .is_some_and(|v| v.eq_ignore_ascii_case("refresh"))
        })
        .find_map(|el| el.value().attr("content").and_then(|c| parse_refresh(base, c)))
}

/// Parse `"0; URL=/next"` into an absolute URL.
fn parse_refresh(base: &Url, value: &str) -> Option<Url> {
    let (_, rest) = value.split_once(';')?;
    let rest = rest.trim();
    let target = match rest.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("url=") => &rest[4..],
        _ => rest,
    };
    let target = target.trim().trim_matches(|c| c == '\'' || c == '"');
    if target.is_empty() {
        return None;
    }
    base.join(target).ok()
}
