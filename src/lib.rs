use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

pub mod callback;
pub mod dispatcher;
pub mod error;
pub mod frontmatter;
pub mod handlers;
pub mod params;
pub mod periodic;
pub mod results;
pub mod routes;
pub mod store;
pub mod targeting;
pub mod ui;

#[cfg(test)]
pub(crate) mod testing;

use callback::{CallbackSender, SystemCallbackSender};
use dispatcher::Dispatcher;
use periodic::{default_periodic_settings, Period, PeriodicCapability, PeriodicNoteSettings, PeriodicNotes};
use routes::RouteTable;
use store::{FsNoteStore, NoteStore};
use targeting::NoteResolver;
use ui::{DesktopUi, Ui};

fn default_scheme() -> String {
    "scratch".to_string()
}

fn default_namespace() -> String {
    "actions".to_string()
}

// App settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub notes_folder: Option<String>,
    /// URL scheme the router answers to.
    #[serde(default = "default_scheme")]
    pub scheme: String,
    /// First path segment (URL host) every action lives under.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_periodic_settings")]
    pub periodic_notes: BTreeMap<Period, PeriodicNoteSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            notes_folder: None,
            scheme: default_scheme(),
            namespace: default_namespace(),
            periodic_notes: default_periodic_settings(),
        }
    }
}

// Load settings from disk, falling back to defaults when the file is absent
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings from {}", path.display()))?;
    let settings: Settings = serde_json::from_str(&content)
        .with_context(|| format!("Invalid settings in {}", path.display()))?;
    for (period, note_settings) in &settings.periodic_notes {
        periodic::check_format(&note_settings.format)
            .with_context(|| format!("Invalid {} notes settings in {}", period, path.display()))?;
    }
    Ok(settings)
}

// Save settings to disk
pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Collaborators shared by every component, handed in at construction.
#[derive(Clone)]
pub struct Context {
    pub settings: Settings,
    pub store: Arc<dyn NoteStore>,
    pub periodic: Arc<dyn PeriodicCapability>,
    pub ui: Arc<dyn Ui>,
    pub callbacks: Arc<dyn CallbackSender>,
}

impl Context {
    pub fn resolver(&self) -> NoteResolver<'_> {
        NoteResolver::new(self.store.as_ref(), self.periodic.as_ref())
    }
}

/// Wire the filesystem store, desktop UI and system callback sender behind
/// every built-in route.
pub fn build_dispatcher(settings: Settings) -> Result<Dispatcher> {
    let folder = settings
        .notes_folder
        .clone()
        .ok_or_else(|| anyhow::anyhow!("Notes folder not set"))?;
    if !Path::new(&folder).is_dir() {
        anyhow::bail!("Notes folder {} does not exist", folder);
    }

    let store: Arc<dyn NoteStore> = Arc::new(FsNoteStore::new(&folder));
    let periodic = Arc::new(PeriodicNotes::new(&settings.periodic_notes, store.clone()));
    let ctx = Context {
        settings,
        store,
        periodic,
        ui: Arc::new(DesktopUi::new(&folder)),
        callbacks: Arc::new(SystemCallbackSender::new()),
    };

    let mut routes = RouteTable::new();
    handlers::register_all(&mut routes)?;
    tracing::debug!("Registered {} routes", routes.len());

    Ok(Dispatcher::new(routes, ctx))
}
