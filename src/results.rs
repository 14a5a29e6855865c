use serde::Serialize;
use serde_json::Value;

use crate::error::{ErrorCode, StoreError};
use crate::frontmatter::{self, FrontMatter};
use crate::params::RefinedParameters;
use crate::store::Note;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct NoteInfo {
    #[serde(rename = "filepath")]
    pub path: String,
    pub title: String,
    pub content: String,
    pub body: String,
    pub front_matter: FrontMatter,
    pub modified: i64,
}

impl From<Note> for NoteInfo {
    fn from(note: Note) -> Self {
        let front_matter = frontmatter::parse(&note.content).unwrap_or_default();
        let body = frontmatter::split(&note.content).body.to_string();
        Self {
            path: note.path,
            title: note.title,
            content: note.content,
            body,
            front_matter,
            modified: note.modified,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct VaultInfo {
    pub name: String,
    pub base_path: String,
    pub note_count: usize,
    pub folder_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum SuccessPayload {
    Empty,
    Text(String),
    Note(NoteInfo),
    Paths(Vec<String>),
    Vault(VaultInfo),
}

impl SuccessPayload {
    /// Flatten the payload into `result-*` query pairs for a success callback.
    pub fn callback_pairs(&self) -> Vec<(String, String)> {
        match self {
            SuccessPayload::Empty => Vec::new(),
            SuccessPayload::Text(text) => vec![("result-message".to_string(), text.clone())],
            SuccessPayload::Paths(paths) => vec![(
                "result-paths".to_string(),
                serde_json::to_string(paths).unwrap_or_default(),
            )],
            SuccessPayload::Note(note) => flatten(serde_json::to_value(note).unwrap_or_default()),
            SuccessPayload::Vault(vault) => flatten(serde_json::to_value(vault).unwrap_or_default()),
        }
    }
}

fn flatten(value: Value) -> Vec<(String, String)> {
    let Value::Object(map) = value else {
        return Vec::new();
    };
    map.into_iter()
        .filter_map(|(key, v)| {
            let text = match v {
                Value::Null => return None,
                Value::String(s) => s,
                other => other.to_string(),
            };
            Some((format!("result-{}", key), text))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerSuccess {
    pub payload: SuccessPayload,
    /// Note the handler acted on, if any.
    pub processed_file: Option<String>,
}

impl HandlerSuccess {
    pub fn new(payload: SuccessPayload) -> Self {
        Self {
            payload,
            processed_file: None,
        }
    }

    pub fn processed(payload: SuccessPayload, path: impl Into<String>) -> Self {
        Self {
            payload,
            processed_file: Some(path.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerFailure {
    pub code: ErrorCode,
    pub message: String,
}

impl HandlerFailure {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }
}

impl From<StoreError> for HandlerFailure {
    fn from(err: StoreError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum HandlerResult {
    Success(HandlerSuccess),
    Failure(HandlerFailure),
}

impl HandlerResult {
    pub fn is_success(&self) -> bool {
        matches!(self, HandlerResult::Success(_))
    }

    pub fn processed_file(&self) -> Option<&str> {
        match self {
            HandlerResult::Success(s) => s.processed_file.as_deref(),
            HandlerResult::Failure(_) => None,
        }
    }
}

impl From<Result<HandlerSuccess, HandlerFailure>> for HandlerResult {
    fn from(result: Result<HandlerSuccess, HandlerFailure>) -> Self {
        match result {
            Ok(success) => HandlerResult::Success(success),
            Err(failure) => HandlerResult::Failure(failure),
        }
    }
}

/// Outcome of a pipeline step. Skipping is reported, never silent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "message", rename_all = "kebab-case")]
pub enum StepOutcome {
    Done(String),
    Skipped(String),
    Failed(String),
}

impl StepOutcome {
    pub fn message(&self) -> &str {
        match self {
            StepOutcome::Done(m) | StepOutcome::Skipped(m) | StepOutcome::Failed(m) => m,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, StepOutcome::Done(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StepOutcome::Skipped(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }
}

/// Diagnostic record of one handled call.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingResult {
    pub route: String,
    pub params: RefinedParameters,
    pub handler_result: HandlerResult,
    pub callback: StepOutcome,
    pub open: StepOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn note() -> NoteInfo {
        NoteInfo::from(Note {
            path: "people/ada.md".into(),
            title: "Ada".into(),
            content: "---\nuid: abc123\n---\n# Ada\n".into(),
            modified: 7,
        })
    }

    #[test]
    fn test_note_info_splits_body_and_front_matter() {
        let info = note();
        assert_eq!(info.body, "# Ada\n");
        assert_eq!(info.front_matter.get("uid"), Some(&json!("abc123")));
    }

    #[test]
    fn test_note_callback_pairs() {
        let pairs = SuccessPayload::Note(note()).callback_pairs();
        let get = |k: &str| pairs.iter().find(|(key, _)| key == k).map(|(_, v)| v.as_str());
        assert_eq!(get("result-filepath"), Some("people/ada.md"));
        assert_eq!(get("result-body"), Some("# Ada\n"));
        assert_eq!(get("result-front-matter"), Some(r#"{"uid":"abc123"}"#));
        assert_eq!(get("result-modified"), Some("7"));
    }

    #[test]
    fn test_other_payload_pairs() {
        assert!(SuccessPayload::Empty.callback_pairs().is_empty());
        assert_eq!(
            SuccessPayload::Paths(vec!["a.md".into(), "b.md".into()]).callback_pairs(),
            vec![("result-paths".to_string(), r#"["a.md","b.md"]"#.to_string())]
        );
        let vault = SuccessPayload::Vault(VaultInfo {
            name: "notes".into(),
            base_path: "/home/me/notes".into(),
            note_count: 3,
            folder_count: 1,
        });
        assert!(vault
            .callback_pairs()
            .contains(&("result-note-count".to_string(), "3".to_string())));
    }

    #[test]
    fn test_handler_result_conversions() {
        let ok: HandlerResult = Ok(HandlerSuccess::processed(SuccessPayload::Empty, "a.md")).into();
        assert!(ok.is_success());
        assert_eq!(ok.processed_file(), Some("a.md"));

        let failed: HandlerResult = Err(HandlerFailure::from(StoreError::NotFound("a.md".into()))).into();
        assert!(!failed.is_success());
        assert_eq!(failed.processed_file(), None);
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["code"], 404);
    }

    #[test]
    fn test_step_outcome_serializes_tagged() {
        let json = serde_json::to_value(StepOutcome::Skipped("No callback requested".into())).unwrap();
        assert_eq!(json, json!({ "outcome": "skipped", "message": "No callback requested" }));
    }
}
