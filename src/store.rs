use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::frontmatter::{self, FrontMatter};

// Full note content
#[derive(Debug, Clone, Serialize)]
pub struct Note {
    pub path: String,
    pub title: String,
    pub content: String,
    pub modified: i64,
}

/// One entry of the metadata index: the parsed front matter of a note as it
/// was when its content hashed to `hash`.
#[derive(Debug, Clone)]
pub struct CachedMetadata {
    pub hash: String,
    pub path: String,
    pub front_matter: FrontMatter,
}

/// Query surface of the note store. Paths are vault-relative and use `/`.
#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn list_notes(&self) -> Result<Vec<String>, StoreError>;

    async fn list_folders(&self) -> Result<Vec<String>, StoreError>;

    async fn front_matter(&self, path: &str) -> Result<FrontMatter, StoreError>;

    async fn note_at_path(&self, path: &str) -> Result<Option<Note>, StoreError>;

    async fn exists(&self, path: &str) -> bool {
        matches!(self.note_at_path(path).await, Ok(Some(_)))
    }

    /// Snapshot of the metadata index, ordered by path.
    async fn metadata_index(&self) -> Vec<CachedMetadata>;

    async fn write_note(&self, path: &str, content: &str) -> Result<Note, StoreError>;

    fn vault_name(&self) -> String;

    fn base_path(&self) -> String;
}

/// Reject absolute paths and anything that climbs out of the vault.
pub fn validate_relative(path: &str) -> Result<&Path, StoreError> {
    let candidate = Path::new(path);
    if path.is_empty()
        || !candidate
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(candidate)
}

fn modified_secs(metadata: &std::fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Markdown notes under a folder on disk.
pub struct FsNoteStore {
    root: PathBuf,
    // path -> metadata as of the last read or write
    index: RwLock<HashMap<String, CachedMetadata>>,
}

impl FsNoteStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index: RwLock::new(HashMap::new()),
        }
    }

    fn absolute(&self, path: &str) -> Result<PathBuf, StoreError> {
        Ok(self.root.join(validate_relative(path)?))
    }

    fn relative(&self, absolute: &Path) -> Option<String> {
        let rel = absolute.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }

    async fn remember(&self, path: &str, content: &str) -> FrontMatter {
        let front_matter = match frontmatter::parse(content) {
            Ok(fm) => fm,
            Err(e) => {
                tracing::warn!("Unreadable front matter in {}: {}", path, e);
                FrontMatter::new()
            }
        };
        self.index.write().await.insert(
            path.to_string(),
            CachedMetadata {
                hash: frontmatter::content_hash(content),
                path: path.to_string(),
                front_matter: front_matter.clone(),
            },
        );
        front_matter
    }

    // Recursive walk collecting markdown files and folders, skipping dot entries
    async fn walk(&self) -> Result<(Vec<String>, Vec<String>), StoreError> {
        let mut notes = Vec::new();
        let mut folders = Vec::new();
        if !self.root.exists() {
            return Ok((notes, folders));
        }

        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') {
                    continue;
                }
                let file_path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    if let Some(rel) = self.relative(&file_path) {
                        folders.push(rel);
                    }
                    pending.push(file_path);
                } else if file_path.extension().map_or(false, |ext| ext == "md") {
                    if let Some(rel) = self.relative(&file_path) {
                        notes.push(rel);
                    }
                }
            }
        }

        notes.sort();
        folders.sort();
        Ok((notes, folders))
    }
}

#[async_trait]
impl NoteStore for FsNoteStore {
    async fn list_notes(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.walk().await?.0)
    }

    async fn list_folders(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.walk().await?.1)
    }

    async fn front_matter(&self, path: &str) -> Result<FrontMatter, StoreError> {
        let file_path = self.absolute(path)?;
        if !file_path.is_file() {
            return Err(StoreError::NotFound(path.to_string()));
        }
        let content = fs::read_to_string(&file_path).await?;
        Ok(self.remember(path, &content).await)
    }

    async fn note_at_path(&self, path: &str) -> Result<Option<Note>, StoreError> {
        let file_path = self.absolute(path)?;
        if !file_path.is_file() {
            return Ok(None);
        }

        let content = fs::read_to_string(&file_path).await?;
        let metadata = fs::metadata(&file_path).await?;
        self.remember(path, &content).await;

        Ok(Some(Note {
            path: path.to_string(),
            title: frontmatter::extract_title(&content, path),
            content,
            modified: modified_secs(&metadata),
        }))
    }

    async fn exists(&self, path: &str) -> bool {
        self.absolute(path).map_or(false, |p| p.is_file())
    }

    async fn metadata_index(&self) -> Vec<CachedMetadata> {
        let index = self.index.read().await;
        let mut entries: Vec<CachedMetadata> = index.values().cloned().collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }

    async fn write_note(&self, path: &str, content: &str) -> Result<Note, StoreError> {
        let file_path = self.absolute(path)?;
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Last write wins; concurrent writers are not coordinated here
        fs::write(&file_path, content).await?;
        let metadata = fs::metadata(&file_path).await?;
        self.remember(path, content).await;

        Ok(Note {
            path: path.to_string(),
            title: frontmatter::extract_title(content, path),
            content: content.to_string(),
            modified: modified_secs(&metadata),
        })
    }

    fn vault_name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn base_path(&self) -> String {
        self.root.to_string_lossy().into_owned()
    }
}
