//! Post-search processing: auto-save and exports after a launch frame is found.

use crate::cli::Cli;
use crate::model::BisectResult;
use crate::storage;

/// Outcome of post-search processing, ready for presentation layers.
#[derive(Debug, Default)]
pub(crate) struct ProcessedRun {
    pub messages: Vec<String>,
    pub auto_saved_path: Option<std::path::PathBuf>,
}

/// Auto-save and export a finished search. Failures become messages rather than errors so
/// the result itself is still shown.
pub(crate) fn process_completion(args: &Cli, result: &BisectResult) -> ProcessedRun {
    let mut processed = ProcessedRun::default();

    if args.auto_save {
        match storage::save_result(result) {
            Ok(path) => {
                processed.messages.push(format!("Saved: {}", path.display()));
                processed.auto_saved_path = Some(path);
            }
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "auto-save failed");
                processed.messages.push(format!("Auto-save failed: {e:#}"));
            }
        }
    }

    if let Some(path) = args.export_json.as_deref() {
        match storage::export_json(path, result) {
            Ok(()) => processed
                .messages
                .push(format!("Exported JSON: {}", path.display())),
            Err(e) => processed.messages.push(format!("Export JSON failed: {e:#}")),
        }
    }

    processed
}
