//! Plan, display and apply manifest changes

pub mod differ;
pub mod executor;
pub mod planner;

pub use executor::{ExecuteOptions, confirm_proceed, execute};
pub use planner::{Plan, build_plan};

use colored::Colorize;

/// Print an engine error with its category, advice and the remote's raw reply
pub fn report_error(err: &reconcile::Error) {
    let category = err.category();
    eprintln!("    {} {}", "✗".red(), err);
    eprintln!("      {}: {}", "kind".dimmed(), category.description());
    eprintln!("      {}: {}", "hint".dimmed(), category.advice());
    if let Some(detail) = err.detail() {
        eprintln!("      {}: {}", "remote said".dimmed(), detail);
    }
    if let Some(id) = err.cluster_id() {
        eprintln!("      {}: {}", "cluster".dimmed(), id);
    }
}
