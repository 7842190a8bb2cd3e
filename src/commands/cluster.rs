//! import, lookup and destroy

use anyhow::{Context as AnyhowContext, Result, bail};
use reconcile::{ApplyContext, NoProgress, Record, ResourceKind};

use crate::Context;
use crate::config::Settings;
use crate::engine::{confirm_proceed, report_error};
use crate::manifest::{Address, Manifest};
use crate::progress::SpinnerProgress;
use crate::state::StateStore;
use crate::ui;

use super::state::print_cluster;

/// Manifest at `ctx.manifest`, if it can be read
fn manifest(ctx: &Context) -> Option<Manifest> {
    match Manifest::load(&ctx.manifest) {
        Ok(manifest) => Some(manifest),
        Err(e) => {
            log::debug!("Not checking the manifest: {e:#}");
            None
        }
    }
}

pub fn import(ctx: &Context, address: &Address, cluster_id: &str) -> Result<()> {
    let settings = Settings::load()?;
    let provider = super::provider(&settings)?;
    let mut store = StateStore::open()?;

    let tracked = store.state.get(address);
    let apply_ctx = ApplyContext::with_progress(settings.wait_options(), &NoProgress);

    let record = match provider.import(address.kind, tracked.as_ref(), cluster_id, &apply_ctx) {
        Ok(record) => record,
        Err(err) => {
            ui::error(&format!("Could not import {cluster_id} as {address}"));
            report_error(&err);
            return Err(err.into());
        }
    };

    store.state.set(address, record.clone());
    store.save()?;
    ui::success(&format!("Imported {cluster_id} as {address}"));

    if let Record::Cluster(cluster) = &record
        && !ctx.quiet
    {
        print_cluster(cluster);
    }

    if let Some(manifest) = manifest(ctx)
        && !manifest.contains(address)
    {
        ui::warn(&format!(
            "{address} is not in {}; the next apply would destroy it",
            ctx.manifest.display()
        ));
    }
    Ok(())
}

pub fn lookup(ctx: &Context, cluster_id: &str, json: bool) -> Result<()> {
    let settings = Settings::load()?;
    let provider = super::provider(&settings)?;

    let record = match provider.lookup(cluster_id) {
        Ok(record) => record,
        Err(err) => {
            ui::error(&format!("Could not look up {cluster_id}"));
            report_error(&err);
            return Err(err.into());
        }
    };

    if json {
        let rendered =
            serde_json::to_string_pretty(&record).context("Failed to serialize cluster")?;
        println!("{rendered}");
    } else {
        if !ctx.quiet {
            ui::header(&format!("Cluster {cluster_id}"));
        }
        print_cluster(&record);
    }
    Ok(())
}

pub fn destroy(ctx: &Context, address: &Address, yes: bool) -> Result<()> {
    let settings = Settings::load()?;
    let provider = super::provider(&settings)?;
    let mut store = StateStore::open()?;

    let Some(record) = store.state.get(address) else {
        bail!("{address} is not tracked");
    };

    let dependents = match &record {
        Record::Cluster(cluster) => store.state.keys_for_cluster(&cluster.id),
        Record::ApiKeys(_) => Vec::new(),
    };

    let prompt = match record.kind() {
        ResourceKind::Cluster => format!("Terminate cluster {} ({address})?", record.id()),
        ResourceKind::ClusterApiKeys => {
            format!("Forget the keys of {address}? They stay valid remotely")
        }
    };
    if !yes && !confirm_proceed(&prompt, false)? {
        ui::info("Aborted");
        return Ok(());
    }

    let progress = SpinnerProgress::new(address.to_string(), ctx.quiet);
    let apply_ctx = ApplyContext::with_progress(settings.wait_options(), &progress);
    let result = provider.delete(&record, &apply_ctx);
    progress.finish();

    if let Err(err) = result {
        ui::error(&format!("Could not destroy {address}"));
        report_error(&err);
        return Err(err.into());
    }

    store.state.remove(address);
    for keys in &dependents {
        store.state.remove(keys);
        ui::info(&format!("Forgot {keys}; its cluster is gone"));
    }
    store.save()?;
    ui::success(&format!("Destroyed {address}"));

    if let Some(manifest) = manifest(ctx)
        && manifest.contains(address)
    {
        ui::warn(&format!(
            "{address} is still in {}; the next apply will recreate it",
            ctx.manifest.display()
        ));
    }
    Ok(())
}
