use async_trait::async_trait;

use crate::error::{ErrorCode, RouteError};
use crate::params::{FieldKind, ParameterSchema, RefinedParameters, PERIOD_NAMES};
use crate::periodic::Period;
use crate::results::{HandlerFailure, HandlerResult, HandlerSuccess, SuccessPayload, VaultInfo};
use crate::routes::{Handler, RouteTable};
use crate::Context;

pub(super) fn register(routes: &mut RouteTable) -> Result<(), RouteError> {
    routes.register(
        "note/list",
        ParameterSchema::new().optional("folder", FieldKind::Text),
        ListNotes,
    )?;
    routes.register("folder/list", ParameterSchema::new(), ListFolders)?;
    routes.register(
        "periodic-note/list",
        ParameterSchema::new().required("period", FieldKind::OneOf(PERIOD_NAMES)),
        ListPeriodicNotes,
    )?;
    routes.register("vault/info", ParameterSchema::new(), ShowVault)?;
    routes.register_aliases(&["", "info"], ParameterSchema::new(), Info)?;
    Ok(())
}

// Notes directly or transitively inside `folder`; everything when no folder is given
fn in_folder(path: &str, folder: &str) -> bool {
    let folder = folder.trim_matches('/');
    folder.is_empty()
        || path
            .strip_prefix(folder)
            .map_or(false, |rest| rest.starts_with('/'))
}

struct ListNotes;

#[async_trait]
impl Handler for ListNotes {
    async fn handle(&self, ctx: &Context, params: &RefinedParameters) -> HandlerResult {
        let folder = params.text("folder").unwrap_or_default();
        match ctx.store.list_notes().await {
            Ok(notes) => HandlerResult::Success(HandlerSuccess::new(SuccessPayload::Paths(
                notes.into_iter().filter(|p| in_folder(p, folder)).collect(),
            ))),
            Err(e) => HandlerResult::Failure(e.into()),
        }
    }
}

struct ListFolders;

#[async_trait]
impl Handler for ListFolders {
    async fn handle(&self, ctx: &Context, _params: &RefinedParameters) -> HandlerResult {
        ctx.store
            .list_folders()
            .await
            .map(|folders| HandlerSuccess::new(SuccessPayload::Paths(folders)))
            .map_err(HandlerFailure::from)
            .into()
    }
}

struct ListPeriodicNotes;

#[async_trait]
impl Handler for ListPeriodicNotes {
    async fn handle(&self, ctx: &Context, params: &RefinedParameters) -> HandlerResult {
        let Some(period) = params.text("period").and_then(|s| s.parse::<Period>().ok()) else {
            return HandlerResult::Failure(HandlerFailure::invalid("unknown period"));
        };
        if !ctx.periodic.is_enabled(period) {
            return HandlerResult::Failure(HandlerFailure::new(
                ErrorCode::FeatureUnavailable,
                format!("{} notes feature is not available", period),
            ));
        }
        ctx.periodic
            .all_notes(period)
            .await
            .map(|paths| HandlerSuccess::new(SuccessPayload::Paths(paths)))
            .map_err(HandlerFailure::from)
            .into()
    }
}

struct ShowVault;

impl ShowVault {
    async fn info(&self, ctx: &Context) -> Result<HandlerSuccess, HandlerFailure> {
        let note_count = ctx.store.list_notes().await?.len();
        let folder_count = ctx.store.list_folders().await?.len();
        Ok(HandlerSuccess::new(SuccessPayload::Vault(VaultInfo {
            name: ctx.store.vault_name(),
            base_path: ctx.store.base_path(),
            note_count,
            folder_count,
        })))
    }
}

#[async_trait]
impl Handler for ShowVault {
    async fn handle(&self, ctx: &Context, _params: &RefinedParameters) -> HandlerResult {
        self.info(ctx).await.into()
    }
}

struct Info;

#[async_trait]
impl Handler for Info {
    async fn handle(&self, _ctx: &Context, _params: &RefinedParameters) -> HandlerResult {
        HandlerResult::Success(HandlerSuccess::new(SuccessPayload::Text(format!(
            "{} {}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        ))))
    }
}
