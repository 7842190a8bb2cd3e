//! state list / state show

use anyhow::{Result, bail};
use colored::Colorize;
use reconcile::{ApiKeysRecord, ClusterRecord, Phase, Record};

use crate::Context;
use crate::manifest::Address;
use crate::state::StateStore;
use crate::ui;

pub fn list(ctx: &Context) -> Result<()> {
    let store = StateStore::open()?;
    let addresses = store.state.addresses();

    if addresses.is_empty() {
        ui::info("Nothing is tracked yet");
        return Ok(());
    }

    if !ctx.quiet {
        ui::header("Tracked entities");
    }
    for address in &addresses {
        match store.state.get(address) {
            Some(Record::Cluster(r)) => println!(
                "  {:<30} {:<14} {}",
                address.to_string(),
                colored_phase(r.phase),
                r.id.dimmed()
            ),
            Some(Record::ApiKeys(r)) => println!(
                "  {:<30} {:<14} {}",
                address.to_string(),
                colored_phase(Phase::Ready),
                format!("cluster {}", r.cluster_id).dimmed()
            ),
            None => {}
        }
    }

    if !ctx.quiet {
        println!();
        ui::dim(&format!(
            "{} | last updated {}",
            store.path().display(),
            store.state.last_updated.format("%Y-%m-%d %H:%M:%S UTC")
        ));
    }
    Ok(())
}

pub fn show(address: &Address, show_secrets: bool) -> Result<()> {
    let store = StateStore::open()?;
    let Some(record) = store.state.get(address) else {
        bail!("{address} is not tracked");
    };

    ui::header(&address.to_string());
    match &record {
        Record::Cluster(r) => print_cluster(r),
        Record::ApiKeys(r) => print_keys(r, show_secrets),
    }
    Ok(())
}

/// Print the desired and observed halves of a cluster record
pub fn print_cluster(record: &ClusterRecord) {
    let spec = &record.spec;
    let observed = &record.observed;

    ui::kv("id", &record.id);
    ui::kv("phase", &colored_phase(record.phase));
    ui::kv("name", &ui::or_dash(spec.name.as_deref().unwrap_or_default()));
    ui::kv("memory", &spec.memory);
    ui::kv("vcpu", &spec.vcpu);
    ui::kv("region", &spec.region);
    ui::kv("high availability", ui::yes_no(spec.high_availability));
    ui::kv("high performance disk", ui::yes_no(spec.high_performance_disk));
    ui::kv("auto upgrade capacity", ui::yes_no(spec.auto_upgrade_capacity));

    ui::section("Remote");
    ui::kv("status", &ui::or_dash(&observed.status));
    ui::kv("server version", &ui::or_dash(&observed.typesense_server_version));
    ui::kv("regions", &ui::or_dash(&observed.regions.join(", ")));
    ui::kv("load balancing", &ui::or_dash(&observed.load_balancing));
    ui::kv(
        "search delivery network",
        &ui::or_dash(&observed.search_delivery_network),
    );
    ui::kv("endpoint", &ui::or_dash(&observed.hostnames.load_balanced));
    for node in &observed.hostnames.nodes {
        ui::kv("node", node);
    }

    let drift = reconcile::detect_drift(record);
    if !drift.is_empty() {
        ui::section("Drift");
        for field in drift {
            ui::warn(&format!(
                "{}: tracked {}, remote reports {}",
                field.field, field.desired, field.observed
            ));
        }
    }
}

fn print_keys(record: &ApiKeysRecord, show_secrets: bool) {
    let reveal = |secret: &cloudapi::Secret| {
        if show_secrets {
            secret.expose().to_string()
        } else {
            secret.to_string()
        }
    };

    ui::kv("cluster", &record.cluster_id);
    ui::kv("admin key", &reveal(&record.admin_key));
    ui::kv("search-only key", &reveal(&record.search_only_key));
    if !show_secrets {
        ui::dim("pass --show-secrets to print the key values");
    }
}

fn colored_phase(phase: Phase) -> String {
    let text = phase.to_string();
    match phase {
        Phase::Ready => text.green().to_string(),
        Phase::Error => text.red().to_string(),
        Phase::Gone | Phase::Unprovisioned => text.dimmed().to_string(),
        Phase::Provisioning | Phase::Updating | Phase::Terminating => text.yellow().to_string(),
    }
}
