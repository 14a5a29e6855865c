use url::Url;

use crate::callback::maybe_send_callback;
use crate::error::DispatchError;
use crate::params::{self, RawParameters};
use crate::results::{HandlerResult, ProcessingResult};
use crate::routes::{normalize_route, RouteTable};
use crate::ui::maybe_open_note;
use crate::{Context, Settings};

/// Split an inbound `scheme://namespace/route?query` URL into the route path
/// and its decoded query parameters. A repeated key keeps its last value.
pub fn parse_incoming(input: &str, settings: &Settings) -> Result<(String, RawParameters), DispatchError> {
    let url = Url::parse(input)?;
    if !url.scheme().eq_ignore_ascii_case(&settings.scheme) {
        return Err(DispatchError::ForeignScheme(url.scheme().to_string()));
    }
    let namespace = url.host_str().unwrap_or("");
    if namespace != settings.namespace {
        return Err(DispatchError::ForeignNamespace(namespace.to_string()));
    }

    let route = normalize_route(url.path()).to_string();
    let raw: RawParameters = url.query_pairs().into_owned().collect();
    Ok((route, raw))
}

/// Runs one inbound call through lookup, validation, the handler, the
/// callback and the open-note step.
pub struct Dispatcher {
    routes: RouteTable,
    ctx: Context,
}

impl Dispatcher {
    pub fn new(routes: RouteTable, ctx: Context) -> Self {
        Self { routes, ctx }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub async fn handle_url(&self, input: &str) -> Result<ProcessingResult, DispatchError> {
        let (route, raw) = parse_incoming(input, &self.ctx.settings)?;
        self.handle(&route, raw).await
    }

    pub async fn handle(&self, path: &str, raw: RawParameters) -> Result<ProcessingResult, DispatchError> {
        let route = normalize_route(path);
        let Some(definition) = self.routes.lookup(route) else {
            tracing::warn!("No route registered for '{}'", route);
            self.ctx.ui.show_notice(&format!("Unknown action '{}'", route));
            return Err(DispatchError::UnknownRoute(route.to_string()));
        };
        tracing::info!("Handling '{}'", route);

        let resolver = self.ctx.resolver();
        let params = match params::validate(&definition.schema, &raw, &resolver).await {
            Ok(params) => params,
            Err(errors) => {
                // Reported locally only; the handler and x-error never run
                tracing::warn!("Invalid parameters for '{}': {}", route, errors);
                self.ctx
                    .ui
                    .show_notice(&format!("Invalid parameters for '{}':\n{}", route, errors));
                return Err(DispatchError::Validation(errors));
            }
        };

        let handler_result = definition.handler.handle(&self.ctx, &params).await;
        if let HandlerResult::Failure(failure) = &handler_result {
            tracing::warn!("'{}' failed ({}): {}", route, failure.code, failure.message);
            if params.x_error().is_none() {
                self.ctx.ui.show_notice(&failure.message);
            }
        }

        let callback = maybe_send_callback(self.ctx.callbacks.as_ref(), &handler_result, &params).await;
        let open = maybe_open_note(self.ctx.ui.as_ref(), &handler_result, &params).await;

        let result = ProcessingResult {
            route: route.to_string(),
            params,
            handler_result,
            callback,
            open,
        };
        if let Ok(json) = serde_json::to_string(&result) {
            tracing::debug!("Processed '{}': {}", route, json);
        }
        Ok(result)
    }
}
