//! Plan display

use colored::Colorize;
use reconcile::{ClusterSpec, ResourceKind};

use super::planner::{Action, KeysTarget, Plan};

/// What kind of change an action is, for the leading symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Add,
    Change,
    Remove,
}

/// Symbol and one-line description of an action
pub fn describe(action: &Action) -> (ChangeKind, String) {
    match action {
        Action::CreateCluster { spec, .. } => (ChangeKind::Add, describe_spec(spec)),
        Action::UpdateCluster {
            changes, drift, ..
        } => {
            let mut parts: Vec<String> = changes
                .iter()
                .map(|c| format!("{}: {} → {}", c.field, c.current, c.desired))
                .collect();
            parts.extend(
                drift
                    .iter()
                    .filter(|d| !changes.iter().any(|c| c.field == d.field))
                    .map(|d| format!("{}: {} → {} (drift)", d.field, d.observed, d.desired)),
            );
            (ChangeKind::Change, parts.join(", "))
        }
        Action::IssueKeys {
            target, replaces, ..
        } => {
            let for_cluster = match target {
                KeysTarget::Known(id) => format!("for cluster {id}"),
                KeysTarget::AfterCreate(address) => format!("for {address} (id known after apply)"),
            };
            match replaces {
                Some(old) => (
                    ChangeKind::Change,
                    format!("reissue {for_cluster}, replacing keys of {}", old.cluster_id),
                ),
                None => (ChangeKind::Add, format!("issue {for_cluster}")),
            }
        }
        Action::Delete { record, .. } => {
            let what = match record.kind() {
                ResourceKind::Cluster => format!("(will terminate {})", record.id()),
                ResourceKind::ClusterApiKeys => {
                    "(will forget; keys stay valid remotely)".to_string()
                }
            };
            (ChangeKind::Remove, what)
        }
    }
}

fn describe_spec(spec: &ClusterSpec) -> String {
    let mut out = format!("(new) {} / {} / {}", spec.memory, spec.vcpu, spec.region);
    if let Some(name) = &spec.name {
        out.push_str(&format!(" as {name}"));
    }
    if spec.high_availability {
        out.push_str(", HA");
    }
    if spec.high_performance_disk {
        out.push_str(", HP disk");
    }
    out
}

/// Display a plan in a user-friendly format
pub fn display_plan(plan: &Plan) {
    if plan.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
    } else {
        println!();
        println!(
            "┌─ {} ─────────────────────────────────────────┐",
            "Execution Plan".bold()
        );
        println!("│");

        for (kind, title) in [
            (ResourceKind::Cluster, "Clusters"),
            (ResourceKind::ClusterApiKeys, "API keys"),
        ] {
            let actions: Vec<&Action> = plan
                .actions
                .iter()
                .filter(|a| a.address().kind == kind)
                .collect();
            if actions.is_empty() {
                continue;
            }

            println!("│ {}", title.bold());
            for action in actions {
                let (change, text) = describe(action);
                let symbol = match change {
                    ChangeKind::Add => "+".green(),
                    ChangeKind::Change => "~".yellow(),
                    ChangeKind::Remove => "-".red(),
                };
                println!(
                    "│   {} {:<30} {}",
                    symbol,
                    action.address().to_string(),
                    text.dimmed()
                );
            }
            println!("│");
        }

        let summary = plan.summary();
        println!("├─────────────────────────────────────────────────────┤");
        println!(
            "│ Summary: {} changes ({} to add, {} to change, {} to destroy)",
            summary.total().to_string().bold(),
            summary.additions.to_string().green(),
            summary.modifications.to_string().yellow(),
            summary.removals.to_string().red()
        );
        println!("└─────────────────────────────────────────────────────┘");
    }

    if !plan.notices.is_empty() {
        println!();
        for notice in &plan.notices {
            println!(
                "  {} {}: {}",
                "⚠".yellow(),
                notice.address.to_string().bold(),
                notice.message
            );
        }
    }
}
