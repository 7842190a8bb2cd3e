//! plan, apply and refresh

use anyhow::{Result, bail};
use colored::Colorize;
use reconcile::{ApplyContext, ClusterRecord, Provider, Verb};

use crate::Context;
use crate::cli::{ApplyArgs, PlanArgs, RefreshArgs};
use crate::config::Settings;
use crate::engine::{self, ExecuteOptions, Plan, build_plan, report_error};
use crate::manifest::{Address, Manifest};
use crate::progress::SpinnerProgress;
use crate::state::{StateStore, TrackedState};
use crate::ui;

/// What a refresh pass found
#[derive(Debug, Default)]
pub struct RefreshReport {
    pub refreshed: Vec<Address>,
    pub vanished: Vec<Address>,
    pub failed: Vec<(Address, reconcile::Error)>,
}

/// Read every readable tracked cluster and fold the results into `state`
///
/// Clusters the remote no longer knows are dropped from state. Failed reads
/// leave the tracked record as it was.
pub fn refresh_tracked(
    provider: &Provider,
    state: &mut TrackedState,
    ctx: &ApplyContext<'_>,
    jobs: usize,
) -> RefreshReport {
    let (names, records): (Vec<String>, Vec<ClusterRecord>) = state
        .clusters
        .iter()
        .filter(|(_, r)| r.phase.allows(Verb::Read))
        .map(|(name, r)| (name.clone(), r.clone()))
        .unzip();

    let mut report = RefreshReport::default();
    for (name, result) in names.into_iter().zip(provider.refresh_all(&records, ctx, jobs)) {
        let address = Address::cluster(&name);
        match result {
            Ok(Some(record)) => {
                state.clusters.insert(name, record);
                report.refreshed.push(address);
            }
            Ok(None) => {
                state.clusters.remove(&name);
                report.vanished.push(address);
            }
            Err(err) => report.failed.push((address, err)),
        }
    }
    report
}

fn refresh_with_spinner(
    ctx: &Context,
    settings: &Settings,
    provider: &Provider,
    state: &mut TrackedState,
    jobs: usize,
) -> RefreshReport {
    if state.clusters.is_empty() {
        return RefreshReport::default();
    }

    let progress = SpinnerProgress::new("Refreshing tracked clusters", ctx.quiet);
    let apply_ctx = ApplyContext::with_progress(settings.wait_options(), &progress);
    let report = refresh_tracked(provider, state, &apply_ctx, jobs);
    progress.finish();

    for address in &report.vanished {
        ui::warn(&format!("{address} no longer exists remotely; dropped from state"));
    }
    for (address, err) in &report.failed {
        ui::error(&format!("Could not refresh {address}"));
        report_error(err);
    }
    report
}

/// Everything plan and apply share: refreshed state and the plan built on it
struct Prepared {
    settings: Settings,
    provider: Provider,
    store: StateStore,
    plan: Plan,
    report: RefreshReport,
}

fn prepare(ctx: &Context, target: Option<&Address>, jobs: usize) -> Result<Prepared> {
    let manifest = Manifest::load(&ctx.manifest)?;
    let settings = Settings::load()?;
    let provider = crate::commands::provider(&settings)?;
    let mut store = StateStore::open()?;

    let report = refresh_with_spinner(ctx, &settings, &provider, &mut store.state, jobs);

    let mut plan = build_plan(&manifest, &store.state);
    if let Some(target) = target {
        if !manifest.contains(target) && store.state.get(target).is_none() {
            bail!("{target} is neither in {} nor tracked", ctx.manifest.display());
        }
        plan.retain_target(target);
    }
    Ok(Prepared {
        settings,
        provider,
        store,
        plan,
        report,
    })
}

/// Show what apply would do; tracked state is not written
pub fn plan(ctx: &Context, args: &PlanArgs) -> Result<()> {
    let prepared = prepare(ctx, args.target.as_ref(), args.jobs)?;
    engine::differ::display_plan(&prepared.plan);

    if !prepared.report.failed.is_empty() {
        println!();
        ui::warn("Some clusters could not be refreshed; the plan may be stale");
    }
    Ok(())
}

pub fn apply(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let Prepared {
        settings,
        provider,
        mut store,
        plan,
        report,
    } = prepare(ctx, args.target.as_ref(), args.jobs)?;

    if !report.failed.is_empty() {
        bail!(
            "{} tracked cluster(s) could not be refreshed; not applying",
            report.failed.len()
        );
    }
    if !report.vanished.is_empty() {
        store.save()?;
    }

    let summary = engine::execute(
        &plan,
        &provider,
        &mut store,
        ExecuteOptions {
            yes: args.yes,
            quiet: ctx.quiet,
            wait: settings.wait_options(),
        },
    )?;

    log::info!(
        "Applied {} change(s), {} skipped",
        summary.total_changes(),
        summary.skipped
    );
    Ok(())
}

pub fn refresh(ctx: &Context, args: &RefreshArgs) -> Result<()> {
    let settings = Settings::load()?;
    let provider = crate::commands::provider(&settings)?;
    let mut store = StateStore::open()?;

    if store.state.clusters.is_empty() {
        ui::info("No tracked clusters");
        return Ok(());
    }

    let report = refresh_with_spinner(ctx, &settings, &provider, &mut store.state, args.jobs);
    store.save()?;

    if !ctx.quiet {
        for address in &report.refreshed {
            if let Some(record) = store.state.clusters.get(&address.name) {
                println!(
                    "  {} {:<30} {}",
                    "✓".green(),
                    address.to_string(),
                    format!("{} ({})", record.phase, record.id).dimmed()
                );
            }
        }
    }

    if report.failed.is_empty() {
        ui::success(&format!(
            "Refreshed {} cluster(s), {} dropped",
            report.refreshed.len(),
            report.vanished.len()
        ));
        Ok(())
    } else {
        bail!("{} cluster(s) could not be refreshed", report.failed.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudapi::{Cluster, MockApi, Operation};
    use reconcile::{NoProgress, Phase, RetryConfig, WaitOptions};
    use std::sync::Arc;

    fn record(id: &str, phase: Phase) -> ClusterRecord {
        ClusterRecord {
            phase,
            ..ClusterRecord::bootstrap(Cluster {
                id: id.to_string(),
                regions: vec!["oregon".to_string()],
                status: "in_service".to_string(),
                ..Cluster::default()
            })
        }
    }

    #[test]
    fn test_refresh_tracked_folds_results() {
        let mock = MockApi::new();
        mock.insert_cluster(Cluster {
            id: "live".to_string(),
            name: "renamed".to_string(),
            regions: vec!["oregon".to_string()],
            status: "in_service".to_string(),
            ..Cluster::default()
        });
        let provider = Provider::with_retry(Arc::new(mock.clone()), RetryConfig::no_retry());

        let mut state = TrackedState::default();
        state.clusters.insert("a".to_string(), record("live", Phase::Ready));
        state.clusters.insert("b".to_string(), record("gone", Phase::Ready));
        state.clusters.insert("c".to_string(), record("old", Phase::Gone));

        let ctx = ApplyContext::with_progress(WaitOptions::default(), &NoProgress);
        let report = refresh_tracked(&provider, &mut state, &ctx, 1);

        assert_eq!(report.refreshed, vec![Address::cluster("a")]);
        assert_eq!(report.vanished, vec![Address::cluster("b")]);
        assert!(report.failed.is_empty());
        assert_eq!(state.clusters["a"].observed.name, "renamed");
        assert!(!state.clusters.contains_key("b"));
        // Gone records are not read
        assert!(state.clusters.contains_key("c"));
        assert_eq!(mock.call_count(Operation::FetchCluster), 2);
    }

    #[test]
    fn test_refresh_tracked_keeps_record_on_failure() {
        let mock = MockApi::new();
        mock.fail_next(
            Operation::FetchCluster,
            cloudapi::Error::transport("timed out", None),
        );
        let provider = Provider::with_retry(Arc::new(mock), RetryConfig::no_retry());

        let mut state = TrackedState::default();
        state.clusters.insert("a".to_string(), record("c1", Phase::Ready));
        let before = state.clusters["a"].clone();

        let ctx = ApplyContext::with_progress(WaitOptions::default(), &NoProgress);
        let report = refresh_tracked(&provider, &mut state, &ctx, 4);

        assert_eq!(report.failed.len(), 1);
        assert_eq!(state.clusters["a"], before);
    }
}
