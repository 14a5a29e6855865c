use serde::Serialize;

use crate::error::StoreError;
use crate::frontmatter;
use crate::params::{IssueKind, RefinedParameters, ValidationIssue};
use crate::periodic::{Period, PeriodicCapability};
use crate::store::NoteStore;

/// Which targeting parameter identified the note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKey {
    File,
    Uid,
    PeriodicNote,
}

impl TargetKey {
    pub const ALL: [TargetKey; 3] = [TargetKey::File, TargetKey::Uid, TargetKey::PeriodicNote];

    pub fn field(&self) -> &'static str {
        match self {
            TargetKey::File => "file",
            TargetKey::Uid => "uid",
            TargetKey::PeriodicNote => "periodic-note",
        }
    }
}

/// Whether a missing note fails validation (hard) or is left to the handler (soft).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetingMode {
    Soft,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComputedTargeting {
    pub selected_key: TargetKey,
    /// Empty when nothing could be resolved.
    pub resolved_path: String,
    pub path_exists: bool,
}

/// Resolves targeting parameters to a single note path.
pub struct NoteResolver<'a> {
    store: &'a dyn NoteStore,
    periodic: &'a dyn PeriodicCapability,
}

impl<'a> NoteResolver<'a> {
    pub fn new(store: &'a dyn NoteStore, periodic: &'a dyn PeriodicCapability) -> Self {
        Self { store, periodic }
    }

    pub async fn resolve(
        &self,
        params: &RefinedParameters,
        mode: TargetingMode,
    ) -> Result<ComputedTargeting, ValidationIssue> {
        let present: Vec<(TargetKey, &str)> = TargetKey::ALL
            .into_iter()
            .filter_map(|key| {
                params
                    .text(key.field())
                    .filter(|v| !v.trim().is_empty())
                    .map(|v| (key, v))
            })
            .collect();

        let (key, value) = match present.as_slice() {
            [single] => *single,
            _ => {
                let given: Vec<&str> = present.iter().map(|(k, _)| k.field()).collect();
                let detail = if given.is_empty() {
                    "none given".to_string()
                } else {
                    format!("got {}", given.join(", "))
                };
                return Err(ValidationIssue::new(
                    "note-targeting",
                    IssueKind::TargetingAmbiguous,
                    format!(
                        "faulty note targeting: expected exactly one of file, uid, periodic-note ({})",
                        detail
                    ),
                ));
            }
        };

        let resolved_path = match key {
            TargetKey::File => value.to_string(),
            TargetKey::Uid => self
                .find_by_uid(value)
                .await
                .map_err(|e| {
                    ValidationIssue::new(
                        key.field(),
                        IssueKind::StoreFailure,
                        format!("could not search notes: {}", e),
                    )
                })?
                .unwrap_or_default(),
            TargetKey::PeriodicNote => {
                let period = value.parse::<Period>().map_err(|e| {
                    ValidationIssue::new(key.field(), IssueKind::Invalid, e.to_string())
                })?;
                if !self.periodic.is_enabled(period) {
                    return Err(ValidationIssue::new(
                        key.field(),
                        IssueKind::FeatureUnavailable,
                        format!("{} notes feature is not available", period),
                    ));
                }
                self.periodic
                    .current_note_path(period)
                    .await
                    .map_err(|e| {
                        ValidationIssue::new(
                            key.field(),
                            IssueKind::FeatureUnavailable,
                            format!("{} notes are misconfigured: {}", period, e),
                        )
                    })?
                    .unwrap_or_default()
            }
        };

        let path_exists = !resolved_path.is_empty() && self.store.exists(&resolved_path).await;

        if mode == TargetingMode::Hard && !path_exists {
            return Err(ValidationIssue::new(
                key.field(),
                IssueKind::NoteNotFound,
                format!("note not found ({} '{}')", key.field(), value),
            ));
        }

        Ok(ComputedTargeting {
            selected_key: key,
            resolved_path,
            path_exists,
        })
    }

    /// First note whose front matter carries `uid`. The metadata index is
    /// consulted first; a linear scan over every note is the fallback.
    pub async fn find_by_uid(&self, uid: &str) -> Result<Option<String>, StoreError> {
        for entry in self.store.metadata_index().await {
            if !frontmatter::has_uid(&entry.front_matter, uid) {
                continue;
            }
            // Index entries can be stale, confirm against the current content
            match self.store.front_matter(&entry.path).await {
                Ok(current) if frontmatter::has_uid(&current, uid) => return Ok(Some(entry.path)),
                Ok(_) | Err(StoreError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        for path in self.store.list_notes().await? {
            match self.store.front_matter(&path).await {
                Ok(fm) if frontmatter::has_uid(&fm, uid) => return Ok(Some(path)),
                Ok(_) => {}
                Err(e) => tracing::warn!("Skipping {} during uid search: {}", path, e),
            }
        }

        Ok(None)
    }
}
