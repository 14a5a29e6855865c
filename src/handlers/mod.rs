//! Built-in actions. Handlers stay thin: targeting and parameter checks are
//! done by the schema before they run.

mod note;
mod vault;

use crate::error::RouteError;
use crate::params::RefinedParameters;
use crate::results::HandlerFailure;
use crate::routes::RouteTable;
use crate::targeting::ComputedTargeting;

pub use note::{append_text, next_free_path, prepend_text};

pub fn register_all(routes: &mut RouteTable) -> Result<(), RouteError> {
    note::register(routes)?;
    vault::register(routes)?;
    Ok(())
}

fn target(params: &RefinedParameters) -> Result<&ComputedTargeting, HandlerFailure> {
    params
        .targeting()
        .ok_or_else(|| HandlerFailure::invalid("note targeting was not resolved"))
}
