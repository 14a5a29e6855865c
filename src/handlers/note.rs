use async_trait::async_trait;

use super::target;
use crate::error::{ErrorCode, RouteError};
use crate::frontmatter;
use crate::params::{FieldKind, IssueKind, ParameterSchema, RefinedParameters, ValidationIssue};
use crate::results::{HandlerFailure, HandlerResult, HandlerSuccess, SuccessPayload};
use crate::routes::{Handler, RouteTable};
use crate::store::NoteStore;
use crate::targeting::{ComputedTargeting, TargetKey, TargetingMode};
use crate::Context;

const CONTENT: &str = "content";
const IF_EXISTS: &str = "if-exists";
const CREATE_IF_NOT_FOUND: &str = "create-if-not-found";

pub(super) fn register(routes: &mut RouteTable) -> Result<(), RouteError> {
    routes.register_aliases(
        &["note/get", "note/read"],
        ParameterSchema::new().targeting(TargetingMode::Hard),
        GetNote,
    )?;
    routes.register(
        "note/open",
        ParameterSchema::new().targeting(TargetingMode::Hard),
        OpenNote,
    )?;
    routes.register(
        "note/create",
        ParameterSchema::new()
            .targeting(TargetingMode::Soft)
            .optional(CONTENT, FieldKind::Text)
            .optional(IF_EXISTS, FieldKind::OneOf(&["skip", "overwrite", "error"]))
            .refine(|params| match params.text(TargetKey::Uid.field()) {
                Some(uid) if !uid.trim().is_empty() => Err(ValidationIssue::new(
                    TargetKey::Uid.field(),
                    IssueKind::Refinement,
                    "notes cannot be created by uid, use file or periodic-note",
                )),
                _ => Ok(()),
            }),
        CreateNote,
    )?;
    routes.register("note/append", add_text_schema(), AddText(Position::Append))?;
    routes.register("note/prepend", add_text_schema(), AddText(Position::Prepend))?;
    Ok(())
}

fn add_text_schema() -> ParameterSchema {
    ParameterSchema::new()
        .targeting(TargetingMode::Soft)
        .required(CONTENT, FieldKind::Text)
        .optional(CREATE_IF_NOT_FOUND, FieldKind::Flag)
}

async fn read_content(ctx: &Context, path: &str) -> Result<String, HandlerFailure> {
    match ctx.store.note_at_path(path).await? {
        Some(note) => Ok(note.content),
        None => Err(HandlerFailure::not_found(format!("note not found: {}", path))),
    }
}

async fn note_payload(ctx: &Context, path: String) -> Result<HandlerSuccess, HandlerFailure> {
    let note = ctx
        .store
        .note_at_path(&path)
        .await?
        .ok_or_else(|| HandlerFailure::not_found(format!("note not found: {}", path)))?;
    Ok(HandlerSuccess::processed(SuccessPayload::Note(note.into()), path))
}

fn missing_note(target: &ComputedTargeting, params: &RefinedParameters) -> HandlerFailure {
    let key = target.selected_key.field();
    match target.selected_key {
        TargetKey::File => HandlerFailure::not_found(format!("note not found: {}", target.resolved_path)),
        _ => HandlerFailure::not_found(format!(
            "note not found ({} '{}')",
            key,
            params.text(key).unwrap_or_default()
        )),
    }
}

fn already_exists(path: &str) -> HandlerFailure {
    HandlerFailure::new(ErrorCode::AlreadyExists, format!("note already exists: {}", path))
}

/// `name.md` -> first of `name-1.md`, `name-2.md`, ... that does not exist yet.
pub async fn next_free_path(store: &dyn NoteStore, path: &str) -> String {
    let stem = if path.to_ascii_lowercase().ends_with(".md") {
        &path[..path.len() - 3]
    } else {
        path
    };

    let mut counter = 1;
    let mut candidate = format!("{}-{}.md", stem, counter);
    while store.exists(&candidate).await {
        counter += 1;
        candidate = format!("{}-{}.md", stem, counter);
    }
    candidate
}

pub fn append_text(existing: &str, addition: &str) -> String {
    let mut out = existing.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(addition);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Insert `addition` at the top of the body, below any front matter.
pub fn prepend_text(existing: &str, addition: &str) -> String {
    let parts = frontmatter::split(existing);
    let mut out = parts.head.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(addition);
    if !addition.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(parts.body);
    out
}

struct GetNote;

#[async_trait]
impl Handler for GetNote {
    async fn handle(&self, ctx: &Context, params: &RefinedParameters) -> HandlerResult {
        let path = match target(params) {
            Ok(t) => t.resolved_path.clone(),
            Err(failure) => return HandlerResult::Failure(failure),
        };
        note_payload(ctx, path).await.into()
    }
}

struct OpenNote;

#[async_trait]
impl Handler for OpenNote {
    async fn handle(&self, _ctx: &Context, params: &RefinedParameters) -> HandlerResult {
        target(params)
            .map(|t| HandlerSuccess::processed(SuccessPayload::Empty, t.resolved_path.clone()))
            .into()
    }
}

struct CreateNote;

impl CreateNote {
    async fn create(&self, ctx: &Context, params: &RefinedParameters) -> Result<HandlerSuccess, HandlerFailure> {
        let target = target(params)?;
        let content = params.text(CONTENT).unwrap_or_default();
        let if_exists = params.text(IF_EXISTS);

        let path = match target.selected_key {
            TargetKey::Uid => {
                return Err(HandlerFailure::invalid("notes cannot be created by uid"));
            }
            TargetKey::PeriodicNote => {
                let period = params
                    .period()
                    .ok_or_else(|| HandlerFailure::invalid("unknown period"))?;
                if target.path_exists {
                    if if_exists == Some("error") {
                        return Err(already_exists(&target.resolved_path));
                    }
                    if if_exists == Some("overwrite") {
                        ctx.store.write_note(&target.resolved_path, content).await?;
                    }
                    target.resolved_path.clone()
                } else {
                    let path = ctx.periodic.create(period).await?;
                    if !content.is_empty() {
                        let existing = read_content(ctx, &path).await?;
                        ctx.store.write_note(&path, &append_text(&existing, content)).await?;
                    }
                    path
                }
            }
            TargetKey::File => {
                let requested = &target.resolved_path;
                let path = match (target.path_exists, if_exists) {
                    (false, _) => requested.clone(),
                    (true, Some("skip")) => return note_payload(ctx, requested.clone()).await,
                    (true, Some("error")) => return Err(already_exists(requested)),
                    (true, Some("overwrite")) => requested.clone(),
                    (true, _) => next_free_path(ctx.store.as_ref(), requested).await,
                };
                ctx.store.write_note(&path, content).await?;
                tracing::info!("Created note {}", path);
                path
            }
        };

        note_payload(ctx, path).await
    }
}

#[async_trait]
impl Handler for CreateNote {
    async fn handle(&self, ctx: &Context, params: &RefinedParameters) -> HandlerResult {
        self.create(ctx, params).await.into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Append,
    Prepend,
}

struct AddText(Position);

impl AddText {
    async fn add(&self, ctx: &Context, params: &RefinedParameters) -> Result<HandlerSuccess, HandlerFailure> {
        let target = target(params)?;
        let addition = params.text(CONTENT).unwrap_or_default();

        let (path, existing) = if target.path_exists {
            let existing = read_content(ctx, &target.resolved_path).await?;
            (target.resolved_path.clone(), existing)
        } else if !params.flag(CREATE_IF_NOT_FOUND) {
            return Err(missing_note(target, params));
        } else {
            match target.selected_key {
                TargetKey::File => (target.resolved_path.clone(), String::new()),
                TargetKey::PeriodicNote => {
                    let period = params
                        .period()
                        .ok_or_else(|| HandlerFailure::invalid("unknown period"))?;
                    let path = ctx.periodic.create(period).await?;
                    let existing = read_content(ctx, &path).await?;
                    (path, existing)
                }
                // Nothing to name a new note after
                TargetKey::Uid => return Err(missing_note(target, params)),
            }
        };

        let updated = match self.0 {
            Position::Append => append_text(&existing, addition),
            Position::Prepend => prepend_text(&existing, addition),
        };
        ctx.store.write_note(&path, &updated).await?;
        tracing::info!("Updated note {} ({:?})", path, self.0);
        note_payload(ctx, path).await
    }
}

#[async_trait]
impl Handler for AddText {
    async fn handle(&self, ctx: &Context, params: &RefinedParameters) -> HandlerResult {
        self.add(ctx, params).await.into()
    }
}
