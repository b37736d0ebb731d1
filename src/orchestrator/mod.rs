//! Application-level orchestration.
//!
//! This module owns the search lifecycle (start/answer/restart) and post-search processing
//! such as auto-save and exports. UI/CLI layers call into it to keep responsibilities
//! separated.

mod controller;
mod post_process;

pub(crate) use controller::{run_controller, BisectController, UiCommand};
pub(crate) use post_process::process_completion;
