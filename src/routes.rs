use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::RouteError;
use crate::params::{ParameterSchema, RefinedParameters};
use crate::results::HandlerResult;
use crate::Context;

/// Domain logic behind one route.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &Context, params: &RefinedParameters) -> HandlerResult;
}

pub struct RouteDefinition {
    pub paths: Vec<String>,
    pub schema: ParameterSchema,
    pub handler: Arc<dyn Handler>,
}

/// Route paths are matched without surrounding slashes.
pub fn normalize_route(path: &str) -> &str {
    path.trim_matches('/')
}

/// Static mapping from route path to schema and handler.
#[derive(Default)]
pub struct RouteTable {
    routes: HashMap<String, Arc<RouteDefinition>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, path: &str, schema: ParameterSchema, handler: H) -> Result<(), RouteError>
    where
        H: Handler + 'static,
    {
        self.register_aliases(&[path], schema, handler)
    }

    /// Bind one schema and handler to several equivalent paths.
    pub fn register_aliases<H>(
        &mut self,
        paths: &[&str],
        schema: ParameterSchema,
        handler: H,
    ) -> Result<(), RouteError>
    where
        H: Handler + 'static,
    {
        let paths: Vec<String> = paths.iter().map(|p| normalize_route(p).to_string()).collect();
        for (i, path) in paths.iter().enumerate() {
            if self.routes.contains_key(path) || paths[..i].contains(path) {
                return Err(RouteError::Duplicate(path.clone()));
            }
        }

        let definition = Arc::new(RouteDefinition {
            paths: paths.clone(),
            schema,
            handler: Arc::new(handler),
        });
        for path in paths {
            self.routes.insert(path, Arc::clone(&definition));
        }
        Ok(())
    }

    pub fn lookup(&self, path: &str) -> Option<Arc<RouteDefinition>> {
        self.routes.get(normalize_route(path)).cloned()
    }

    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
