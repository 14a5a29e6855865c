use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use url::Url;

use crate::error::ErrorCode;
use crate::periodic::Period;
use crate::store::validate_relative;
use crate::targeting::{ComputedTargeting, NoteResolver, TargetKey, TargetingMode};

/// Query parameters exactly as they arrived, already URL-decoded.
pub type RawParameters = BTreeMap<String, String>;

pub const X_SUCCESS: &str = "x-success";
pub const X_ERROR: &str = "x-error";
pub const SILENT: &str = "silent";
pub const DEBUG_MODE: &str = "debug-mode";
pub const CALL_ID: &str = "call-id";

pub const PERIOD_NAMES: &[&str] = &["daily", "weekly", "monthly", "quarterly", "yearly"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    Missing,
    Invalid,
    TargetingAmbiguous,
    NoteNotFound,
    FeatureUnavailable,
    StoreFailure,
    Refinement,
}

impl IssueKind {
    pub fn code(&self) -> ErrorCode {
        match self {
            IssueKind::NoteNotFound => ErrorCode::NotFound,
            IssueKind::FeatureUnavailable => ErrorCode::FeatureUnavailable,
            IssueKind::StoreFailure => ErrorCode::HandlerError,
            _ => ErrorCode::InvalidInput,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
    pub kind: IssueKind,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            kind,
        }
    }
}

/// Every problem found in one validation pass, in the order found.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationErrors(Vec<ValidationIssue>);

impl ValidationErrors {
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.0
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|i| i.field == field)
    }

    pub fn has_kind(&self, kind: IssueKind) -> bool {
        self.0.iter().any(|i| i.kind == kind)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self
            .0
            .iter()
            .map(|i| format!("{}: {}", i.field, i.message))
            .collect();
        write!(f, "{}", lines.join("\n"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Flag,
    Integer,
    Url,
    /// Vault-relative note path, normalised and given a `.md` extension.
    NotePath,
    OneOf(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy)]
struct FieldSpec {
    name: &'static str,
    kind: FieldKind,
    required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Integer(i64),
    Url(Url),
    Text(String),
}

pub type Refinement =
    Arc<dyn Fn(&mut RefinedParameters) -> Result<(), ValidationIssue> + Send + Sync>;

/// Declarative description of the parameters a route accepts.
#[derive(Clone)]
pub struct ParameterSchema {
    fields: Vec<FieldSpec>,
    targeting: Option<TargetingMode>,
    refinements: Vec<Refinement>,
}

impl Default for ParameterSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterSchema {
    /// A schema carrying only the parameters every call understands.
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            targeting: None,
            refinements: Vec::new(),
        }
        .optional(X_SUCCESS, FieldKind::Url)
        .optional(X_ERROR, FieldKind::Url)
        .optional(SILENT, FieldKind::Flag)
        .optional(DEBUG_MODE, FieldKind::Flag)
        .optional(CALL_ID, FieldKind::Text)
    }

    pub fn required(self, name: &'static str, kind: FieldKind) -> Self {
        self.field(name, kind, true)
    }

    pub fn optional(self, name: &'static str, kind: FieldKind) -> Self {
        self.field(name, kind, false)
    }

    fn field(mut self, name: &'static str, kind: FieldKind, required: bool) -> Self {
        let spec = FieldSpec {
            name,
            kind,
            required,
        };
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(existing) => *existing = spec,
            None => self.fields.push(spec),
        }
        self
    }

    /// Accept `file`, `uid` and `periodic-note` and resolve them to one note.
    pub fn targeting(self, mode: TargetingMode) -> Self {
        let mut schema = self
            .optional(TargetKey::File.field(), FieldKind::NotePath)
            .optional(TargetKey::Uid.field(), FieldKind::Text)
            .optional(TargetKey::PeriodicNote.field(), FieldKind::OneOf(PERIOD_NAMES));
        schema.targeting = Some(mode);
        schema
    }

    pub fn refine<F>(mut self, refinement: F) -> Self
    where
        F: Fn(&mut RefinedParameters) -> Result<(), ValidationIssue> + Send + Sync + 'static,
    {
        self.refinements.push(Arc::new(refinement));
        self
    }

    pub fn targeting_mode(&self) -> Option<TargetingMode> {
        self.targeting
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }
}

/// Parameters after validation, with typed values and the resolved target.
#[derive(Debug, Clone, Serialize)]
pub struct RefinedParameters {
    pub input: RawParameters,
    pub values: BTreeMap<String, FieldValue>,
    pub targeting: Option<ComputedTargeting>,
}

impl RefinedParameters {
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(FieldValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn flag(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(FieldValue::Flag(true)))
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(FieldValue::Integer(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn url(&self, name: &str) -> Option<&Url> {
        match self.values.get(name) {
            Some(FieldValue::Url(u)) => Some(u),
            _ => None,
        }
    }

    pub fn x_success(&self) -> Option<&Url> {
        self.url(X_SUCCESS)
    }

    pub fn x_error(&self) -> Option<&Url> {
        self.url(X_ERROR)
    }

    pub fn silent(&self) -> bool {
        self.flag(SILENT)
    }

    pub fn debug_mode(&self) -> bool {
        self.flag(DEBUG_MODE)
    }

    pub fn call_id(&self) -> Option<&str> {
        self.text(CALL_ID).filter(|s| !s.is_empty())
    }

    pub fn targeting(&self) -> Option<&ComputedTargeting> {
        self.targeting.as_ref()
    }

    pub fn period(&self) -> Option<Period> {
        self.text(TargetKey::PeriodicNote.field())
            .and_then(|s| s.parse().ok())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "" | "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Normalise a caller-supplied note path: forward slashes, no leading slash,
/// `.md` extension. Returns `None` when nothing usable is left.
pub fn normalize_note_path(value: &str) -> Option<String> {
    let path = value.trim().replace('\\', "/");
    let path = path.trim_start_matches('/').trim();
    if path.is_empty() {
        return None;
    }
    if path.to_ascii_lowercase().ends_with(".md") {
        Some(path.to_string())
    } else {
        Some(format!("{}.md", path))
    }
}

fn check_field(spec: &FieldSpec, raw: Option<&str>) -> Result<Option<FieldValue>, ValidationIssue> {
    let invalid = |message: String| ValidationIssue::new(spec.name, IssueKind::Invalid, message);

    let value = match raw {
        Some(v) => v,
        None if spec.required => {
            return Err(ValidationIssue::new(
                spec.name,
                IssueKind::Missing,
                "required parameter is missing",
            ))
        }
        None => return Ok(None),
    };
    let trimmed = value.trim();

    match spec.kind {
        FieldKind::Text => Ok(Some(FieldValue::Text(value.to_string()))),
        FieldKind::Flag => parse_flag(trimmed)
            .map(|b| Some(FieldValue::Flag(b)))
            .ok_or_else(|| invalid(format!("expected a boolean, got '{}'", value))),
        _ if trimmed.is_empty() => {
            if spec.required {
                Err(invalid("must not be empty".to_string()))
            } else {
                Ok(None)
            }
        }
        FieldKind::Integer => trimmed
            .parse::<i64>()
            .map(|n| Some(FieldValue::Integer(n)))
            .map_err(|_| invalid(format!("expected an integer, got '{}'", value))),
        FieldKind::Url => Url::parse(trimmed)
            .map(|u| Some(FieldValue::Url(u)))
            .map_err(|e| invalid(format!("invalid URL: {}", e))),
        FieldKind::NotePath => match normalize_note_path(trimmed) {
            Some(path) if validate_relative(&path).is_ok() => Ok(Some(FieldValue::Text(path))),
            Some(_) => Err(invalid("path must stay inside the vault".to_string())),
            None if spec.required => Err(invalid("must not be empty".to_string())),
            None => Ok(None),
        },
        FieldKind::OneOf(options) => {
            if options.contains(&trimmed) {
                Ok(Some(FieldValue::Text(trimmed.to_string())))
            } else {
                Err(invalid(format!("expected one of: {}", options.join(", "))))
            }
        }
    }
}

/// Validate raw parameters against a schema.
///
/// Per-field checks run first and all of them are reported together. Only
/// when they pass do the cross-field steps run: note targeting (if the schema
/// asks for it) followed by each refinement in order. Every cross-field step
/// runs even after an earlier one failed.
pub async fn validate(
    schema: &ParameterSchema,
    raw: &RawParameters,
    resolver: &NoteResolver<'_>,
) -> Result<RefinedParameters, ValidationErrors> {
    let mut issues = Vec::new();
    let mut values = BTreeMap::new();

    for spec in &schema.fields {
        match check_field(spec, raw.get(spec.name).map(String::as_str)) {
            Ok(Some(value)) => {
                values.insert(spec.name.to_string(), value);
            }
            Ok(None) => {}
            Err(issue) => issues.push(issue),
        }
    }
    if !issues.is_empty() {
        return Err(ValidationErrors(issues));
    }

    let mut params = RefinedParameters {
        input: raw.clone(),
        values,
        targeting: None,
    };

    if let Some(mode) = schema.targeting {
        match resolver.resolve(&params, mode).await {
            Ok(targeting) => params.targeting = Some(targeting),
            Err(issue) => issues.push(issue),
        }
    }

    for refinement in &schema.refinements {
        if let Err(issue) = refinement(&mut params) {
            issues.push(issue);
        }
    }

    if issues.is_empty() {
        Ok(params)
    } else {
        Err(ValidationErrors(issues))
    }
}
