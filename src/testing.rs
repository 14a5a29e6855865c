// Test doubles shared by the unit tests
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use url::Url;

use crate::callback::CallbackSender;
use crate::dispatcher::Dispatcher;
use crate::handlers;
use crate::routes::RouteTable;
use crate::error::{CallbackError, StoreError};
use crate::frontmatter::{self, FrontMatter};
use crate::periodic::{default_periodic_settings, Period, PeriodicNoteSettings, PeriodicNotes};
use crate::results::StepOutcome;
use crate::store::{validate_relative, CachedMetadata, Note, NoteStore};
use crate::ui::Ui;
use crate::{Context, Settings};

/// Notes held in memory. The metadata index is only filled through
/// `seed_index`, so tests control exactly what it claims.
#[derive(Default)]
pub struct MemoryStore {
    notes: RwLock<BTreeMap<String, String>>,
    index: RwLock<Vec<CachedMetadata>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, path: &str, content: &str) {
        self.notes
            .write()
            .await
            .insert(path.to_string(), content.to_string());
    }

    pub async fn content(&self, path: &str) -> Option<String> {
        self.notes.read().await.get(path).cloned()
    }

    pub async fn seed_index(&self, path: &str, content: &str) {
        self.index.write().await.push(CachedMetadata {
            hash: frontmatter::content_hash(content),
            path: path.to_string(),
            front_matter: frontmatter::parse(content).unwrap_or_default(),
        });
    }
}

#[async_trait]
impl NoteStore for MemoryStore {
    async fn list_notes(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.notes.read().await.keys().cloned().collect())
    }

    async fn list_folders(&self) -> Result<Vec<String>, StoreError> {
        let mut folders = BTreeSet::new();
        for path in self.notes.read().await.keys() {
            let mut rest = path.as_str();
            while let Some((parent, _)) = rest.rsplit_once('/') {
                folders.insert(parent.to_string());
                rest = parent;
            }
        }
        Ok(folders.into_iter().collect())
    }

    async fn front_matter(&self, path: &str) -> Result<FrontMatter, StoreError> {
        let content = self
            .content(path)
            .await
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        frontmatter::parse(&content).map_err(|e| StoreError::FrontMatter {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    async fn note_at_path(&self, path: &str) -> Result<Option<Note>, StoreError> {
        validate_relative(path)?;
        Ok(self.content(path).await.map(|content| Note {
            path: path.to_string(),
            title: frontmatter::extract_title(&content, path),
            content,
            modified: 0,
        }))
    }

    async fn metadata_index(&self) -> Vec<CachedMetadata> {
        let mut entries = self.index.read().await.clone();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }

    async fn write_note(&self, path: &str, content: &str) -> Result<Note, StoreError> {
        validate_relative(path)?;
        self.insert(path, content).await;
        Ok(Note {
            path: path.to_string(),
            title: frontmatter::extract_title(content, path),
            content: content.to_string(),
            modified: 0,
        })
    }

    fn vault_name(&self) -> String {
        "memory".to_string()
    }

    fn base_path(&self) -> String {
        "/memory".to_string()
    }
}

#[derive(Default)]
pub struct RecordingUi {
    opened: Mutex<Vec<String>>,
    notices: Mutex<Vec<String>>,
}

impl RecordingUi {
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl Ui for RecordingUi {
    async fn focus_or_open_note(&self, path: &str) -> StepOutcome {
        self.opened.lock().unwrap().push(path.to_string());
        StepOutcome::Done(format!("Opened {}", path))
    }

    fn show_notice(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }
}

#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<Url>>,
    fail: bool,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<Url> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl CallbackSender for RecordingSender {
    async fn send(&self, url: &Url) -> Result<(), CallbackError> {
        self.sent.lock().unwrap().push(url.clone());
        if self.fail {
            return Err(CallbackError::Launch(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        Ok(())
    }
}

pub fn fixed_today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 14).unwrap()
}

/// Daily notes in `Daily/`, every other granularity left at its (disabled) default.
pub fn test_periodic_settings() -> BTreeMap<Period, PeriodicNoteSettings> {
    let mut settings = default_periodic_settings();
    if let Some(daily) = settings.get_mut(&Period::Daily) {
        daily.enabled = true;
        daily.folder = "Daily".to_string();
    }
    settings
}

/// A context wired to in-memory doubles, with handles kept for assertions.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub ui: Arc<RecordingUi>,
    pub sender: Arc<RecordingSender>,
    pub ctx: Context,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_sender(RecordingSender::new())
    }

    pub fn with_sender(sender: RecordingSender) -> Self {
        let store = Arc::new(MemoryStore::new());
        let ui = Arc::new(RecordingUi::default());
        let sender = Arc::new(sender);
        let settings = Settings {
            notes_folder: Some("/memory".to_string()),
            periodic_notes: test_periodic_settings(),
            ..Settings::default()
        };
        let periodic = Arc::new(PeriodicNotes::with_clock(
            &settings.periodic_notes,
            store.clone(),
            fixed_today,
        ));
        let ctx = Context {
            settings,
            store: store.clone(),
            periodic,
            ui: ui.clone(),
            callbacks: sender.clone(),
        };
        Self {
            store,
            ui,
            sender,
            ctx,
        }
    }

    /// Dispatcher over every built-in route, sharing this harness's doubles.
    pub fn dispatcher(&self) -> Dispatcher {
        let mut routes = RouteTable::new();
        handlers::register_all(&mut routes).unwrap();
        Dispatcher::new(routes, self.ctx.clone())
    }
}
