use async_trait::async_trait;
use std::path::PathBuf;

use crate::params::RefinedParameters;
use crate::results::{HandlerResult, StepOutcome};

/// What the router needs from the application window.
#[async_trait]
pub trait Ui: Send + Sync {
    /// Bring the note to the front, opening it if needed.
    async fn focus_or_open_note(&self, path: &str) -> StepOutcome;

    /// Transient, non-blocking message to the user.
    fn show_notice(&self, message: &str);
}

/// Opens notes with the system handler for markdown files.
pub struct DesktopUi {
    base: PathBuf,
}

impl DesktopUi {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

#[async_trait]
impl Ui for DesktopUi {
    async fn focus_or_open_note(&self, path: &str) -> StepOutcome {
        let file_path = self.base.join(path);
        if !file_path.is_file() {
            return StepOutcome::Failed(format!("Note {} does not exist", path));
        }

        match tokio::task::spawn_blocking(move || open::that(file_path)).await {
            Ok(Ok(())) => StepOutcome::Done(format!("Opened {}", path)),
            Ok(Err(e)) => StepOutcome::Failed(format!("Failed to open {}: {}", path, e)),
            Err(e) => StepOutcome::Failed(format!("Failed to open {}: {}", path, e)),
        }
    }

    fn show_notice(&self, message: &str) {
        eprintln!("{}", message);
    }
}

/// Surface the processed note unless the call failed or asked to stay quiet.
pub async fn maybe_open_note(
    ui: &dyn Ui,
    result: &HandlerResult,
    params: &RefinedParameters,
) -> StepOutcome {
    let path = match result {
        HandlerResult::Failure(_) => {
            return StepOutcome::Skipped("Handler failed, nothing to open".to_string())
        }
        HandlerResult::Success(success) => success.processed_file.as_deref(),
    };
    if params.silent() {
        return StepOutcome::Skipped("Silent call, note not opened".to_string());
    }
    match path {
        Some(path) => ui.focus_or_open_note(path).await,
        None => StepOutcome::Skipped("No processed file to open".to_string()),
    }
}
