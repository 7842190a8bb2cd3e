//! Execution engine - runs a plan against the provider, one entity at a time

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use reconcile::{
    ApiKeysSpec, ApplyContext, Desired, Phase, Provider, Record, Verb, WaitOptions,
};

use crate::progress::SpinnerProgress;
use crate::state::{StateStore, TrackedState};

use super::differ::display_plan;
use super::planner::{Action, KeysTarget, Plan};
use super::report_error;

/// Options for execution
#[derive(Debug, Clone, Copy)]
pub struct ExecuteOptions {
    /// Skip confirmation prompts
    pub yes: bool,
    /// Hide spinners
    pub quiet: bool,
    pub wait: WaitOptions,
}

/// Summary of execution results
#[derive(Debug, Default)]
pub struct ExecuteSummary {
    pub created: usize,
    pub modified: usize,
    pub removed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ExecuteSummary {
    pub fn total_changes(&self) -> usize {
        self.created + self.modified + self.removed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Modified,
    Removed,
}

/// Display, confirm and execute the plan
///
/// State is saved after every entity, so an interrupted run keeps what it
/// already did. The first failure stops the run.
pub fn execute(
    plan: &Plan,
    provider: &Provider,
    store: &mut StateStore,
    opts: ExecuteOptions,
) -> Result<ExecuteSummary> {
    display_plan(plan);

    if plan.is_empty() {
        return Ok(ExecuteSummary::default());
    }

    if !opts.yes && !confirm_proceed("Apply these changes?", true)? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(ExecuteSummary {
            skipped: plan.actions.len(),
            ..Default::default()
        });
    }

    let mut summary = ExecuteSummary::default();
    println!();

    for action in &plan.actions {
        let address = action.address();
        let progress = SpinnerProgress::new(address.to_string(), opts.quiet);
        let ctx = ApplyContext::with_progress(opts.wait, &progress);

        let result = apply_action(action, provider, &mut store.state, &ctx);
        progress.finish();

        match result {
            Ok(outcome) => {
                match outcome {
                    Outcome::Created => summary.created += 1,
                    Outcome::Modified => summary.modified += 1,
                    Outcome::Removed => summary.removed += 1,
                }
                store.save()?;
                println!("  {} {} {}", "✓".green(), address, past_tense(outcome).dimmed());
            }
            Err(err) => {
                if let Some(partial) = err.partial_record() {
                    log::debug!("Recording partial state for {address}");
                    store.state.set(address, Record::Cluster(partial.clone()));
                }
                store.save()?;
                summary.failed += 1;
                summary.skipped = plan.actions.len() - summary.total_changes() - summary.failed;

                println!("  {} {}", "✗".red(), address);
                report_error(&err);
                print_summary(&summary);
                return Err(anyhow::Error::new(err)).with_context(|| format!("Failed to apply {address}"));
            }
        }
    }

    print_summary(&summary);
    Ok(summary)
}

/// Apply one action, updating `state` in memory
pub fn apply_action(
    action: &Action,
    provider: &Provider,
    state: &mut TrackedState,
    ctx: &ApplyContext<'_>,
) -> reconcile::Result<Outcome> {
    match action {
        Action::CreateCluster { address, spec } => {
            let tracked = state.get(address);
            let record = provider.create(tracked.as_ref(), &Desired::Cluster(spec.clone()), ctx)?;
            state.set(address, record);
            Ok(Outcome::Created)
        }
        Action::UpdateCluster {
            address,
            record,
            spec,
            ..
        } => {
            let tracked = Record::Cluster(record.clone());
            let updated = provider.update(&tracked, &Desired::Cluster(spec.clone()), ctx)?;
            state.set(address, updated);
            Ok(Outcome::Modified)
        }
        Action::IssueKeys {
            address,
            target,
            replaces,
        } => {
            let cluster_id = resolve_target(target, state)?;
            if let Some(old) = replaces {
                provider.delete(&Record::ApiKeys(old.clone()), ctx)?;
                state.remove(address);
            }
            // One key set per cluster, whichever address tracks it
            let tracked = state
                .keys_for_cluster(&cluster_id)
                .first()
                .and_then(|other| state.get(other));
            let desired = Desired::ApiKeys(ApiKeysSpec { cluster_id });
            let record = provider.create(tracked.as_ref(), &desired, ctx)?;
            state.set(address, record);
            Ok(if replaces.is_some() {
                Outcome::Modified
            } else {
                Outcome::Created
            })
        }
        Action::Delete { address, record } => {
            provider.delete(record, ctx)?;
            state.remove(address);
            if let Record::Cluster(cluster) = record {
                for keys in state.keys_for_cluster(&cluster.id) {
                    log::info!("Forgetting {keys}; cluster {} is gone", cluster.id);
                    state.remove(&keys);
                }
            }
            Ok(Outcome::Removed)
        }
    }
}

fn resolve_target(target: &KeysTarget, state: &TrackedState) -> reconcile::Result<String> {
    match target {
        KeysTarget::Known(id) => Ok(id.clone()),
        KeysTarget::AfterCreate(address) => state
            .clusters
            .get(&address.name)
            .filter(|r| r.phase == Phase::Ready)
            .map(|r| r.id.clone())
            .ok_or_else(|| {
                reconcile::Error::precondition(
                    Verb::Create,
                    Phase::Unprovisioned,
                    format!("{address} is not provisioned yet; apply it first"),
                )
            }),
    }
}

const fn past_tense(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Created => "created",
        Outcome::Modified => "updated",
        Outcome::Removed => "destroyed",
    }
}

/// Confirm with user
pub fn confirm_proceed(prompt: &str, default: bool) -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt(prompt)
        .default(default)
        .interact()
        .context("Could not read confirmation; pass --yes to skip the prompt")?;

    Ok(confirmed)
}

/// Print final summary
fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Apply complete!", "✓".green().bold());
    } else {
        println!("  {} Apply stopped with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} created", summary.created);
    }
    if summary.modified > 0 {
        println!("    • {} updated", summary.modified);
    }
    if summary.removed > 0 {
        println!("    • {} destroyed", summary.removed);
    }
    if summary.skipped > 0 {
        println!("    • {} not attempted", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {}", summary.failed, "failed".red());
    }
}
