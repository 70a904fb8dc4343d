//! In-memory portal and sinks for pipeline tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{FormSubmission, Page, Record, Snapshot};
use crate::notify::{Notification, NotificationSink};
use crate::storage::{LocalStorage, SnapshotStore};
use crate::utils::http::{PageFetcher, SessionFactory};

pub const ENTRY_URL: &str = "https://portal.example/scripts/mgrqispi.dll?PRGNAME=EXTERNALPAGES";
pub const PASSWORD: &str = "correct horse";

const LOGIN_PAGE: &str = r#"
    <html><body>
      <form id="cn_loginForm" action="/scripts/mgrqispi.dll" method="post">
        <input type="text" name="usrname">
        <input type="password" name="pass">
        <input type="hidden" name="PRGNAME" value="LOGINCHECK">
        <input type="submit" value="Login">
      </form>
    </body></html>"#;

const LANDING_PAGE: &str = r#"
    <html><body><ul id="pageTopNavi">
      <li><a href="/scripts/mgrqispi.dll?PRGNAME=MLSSTART">Aktuelles</a></li>
      <li><a href="/scripts/mgrqispi.dll?PRGNAME=EXAMS">Prüfungen</a></li>
    </ul></body></html>"#;

const EXAMS_PAGE: &str = r#"
    <html><body><ul>
      <li><a href="/scripts/mgrqispi.dll?PRGNAME=MYEXAMS">Meine Prüfungen</a></li>
      <li><a href="/scripts/mgrqispi.dll?PRGNAME=SEMESTER">Semesterergebnisse</a></li>
    </ul></body></html>"#;

const SEMESTER_PAGE: &str = r#"
    <html><body><ul>
      <li><a href="/scripts/mgrqispi.dll?PRGNAME=COURSERESULTS">Prüfungsergebnisse</a></li>
      <li><a href="/scripts/mgrqispi.dll?PRGNAME=COURSERESULTS&amp;ARGUMENTS=-N1">
          Modulergebnisse
      </a></li>
    </ul></body></html>"#;

fn url(query: &str) -> String {
    format!("https://portal.example/scripts/mgrqispi.dll?PRGNAME={query}")
}

/// Render a results page from `(id, name, grade, credits)` rows.
pub fn results_page(rows: &[(&str, &str, &str, &str)]) -> String {
    let body: String = rows
        .iter()
        .map(|(id, name, grade, credits)| {
            format!(
                "<tr><td>{id}</td><td>{name}</td><td>{grade}</td><td>{credits}</td><td>bestanden</td></tr>"
            )
        })
        .collect();
    format!(
        r#"<html><body><table class="nb list">
            <tr><th>Nr.</th><th>Kursname</th><th>Endnote</th><th>Credits</th><th>Status</th></tr>
            {body}
        </table></body></html>"#
    )
}

/// A fake portal serving fixed pages; login succeeds only with [`PASSWORD`].
#[derive(Clone)]
pub struct FakePortal {
    pages: Arc<Mutex<HashMap<String, String>>>,
    opened: Arc<AtomicUsize>,
}

impl FakePortal {
    pub fn new(results: &str) -> Self {
        let pages = HashMap::from([
            (ENTRY_URL.to_string(), LOGIN_PAGE.to_string()),
            (url("EXAMS"), EXAMS_PAGE.to_string()),
            (url("SEMESTER"), SEMESTER_PAGE.to_string()),
            (url("COURSERESULTS&ARGUMENTS=-N1"), results.to_string()),
        ]);
        Self {
            pages: Arc::new(Mutex::new(pages)),
            opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_results(&self, html: &str) {
        self.set_page(&url("COURSERESULTS&ARGUMENTS=-N1"), html);
    }

    pub fn set_page(&self, url: &str, html: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), html.to_string());
    }

    /// Sessions opened so far.
    pub fn sessions_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl SessionFactory for FakePortal {
    fn open(&self) -> Result<Box<dyn PageFetcher>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl PageFetcher for FakePortal {
    async fn get(&self, url: &Url) -> Result<Page> {
        let html = self.pages.lock().unwrap().get(url.as_str()).cloned();
        match html {
            Some(html) => Ok(Page::new(url.clone(), html)),
            None => Err(AppError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("404 {url}"),
            ))),
        }
    }

    async fn submit(&self, form: &FormSubmission) -> Result<Page> {
        let landing = Url::parse(&url("STARTPAGE_DISPATCH"))?;
        if form.get("pass") == Some(PASSWORD) && form.get("PRGNAME") == Some("LOGINCHECK") {
            Ok(Page::new(landing, LANDING_PAGE))
        } else {
            Ok(Page::new(form.action.clone(), LOGIN_PAGE))
        }
    }
}

/// Records every delivered notification.
#[derive(Default)]
pub struct RecordingSink {
    pub delivered: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn ids(&self) -> Vec<String> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.id.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn deliver(&self, notification: &Notification) -> Result<()> {
        self.delivered.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Rejects every notification.
pub struct FailingSink;

#[async_trait]
impl NotificationSink for FailingSink {
    fn name(&self) -> &str {
        "failing"
    }

    async fn deliver(&self, _notification: &Notification) -> Result<()> {
        Err(AppError::notify("transport down"))
    }
}

/// Local storage whose next update fails once armed, like a full disk.
///
/// A batch update fails outright. Single updates let the first record
/// through and fail on the second, so per-record writing leaves a
/// half-updated snapshot behind.
pub struct FlakyStore {
    pub inner: LocalStorage,
    armed: AtomicBool,
    single_writes: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: LocalStorage) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(false),
            single_writes: AtomicUsize::new(0),
        }
    }

    pub fn arm(&self) {
        self.single_writes.store(0, Ordering::SeqCst);
        self.armed.store(true, Ordering::SeqCst);
    }

    fn fail(&self) -> Result<()> {
        self.armed.store(false, Ordering::SeqCst);
        Err(AppError::persistence("disk full"))
    }
}

#[async_trait]
impl SnapshotStore for FlakyStore {
    async fn load_all(&self) -> Result<Snapshot> {
        self.inner.load_all().await
    }

    async fn insert_many(&self, records: &[Record]) -> Result<()> {
        self.inner.insert_many(records).await
    }

    async fn update_one(&self, record: &Record) -> Result<()> {
        if self.armed.load(Ordering::SeqCst) && self.single_writes.fetch_add(1, Ordering::SeqCst) >= 1 {
            return self.fail();
        }
        self.inner.update_one(record).await
    }

    async fn update_many(&self, records: &[Record]) -> Result<()> {
        if self.armed.load(Ordering::SeqCst) {
            return self.fail();
        }
        self.inner.update_many(records).await
    }
}
