//! Blocking wait for a cluster to finish provisioning.
//!
//! The loop sleeps in short slices so a cancel request or the deadline is
//! noticed within [`SLICE`] even when the poll interval is long.

use crate::context::ApplyContext;
use cloudapi::Cluster;
use std::thread;
use std::time::{Duration, Instant};

/// Longest uninterrupted sleep.
const SLICE: Duration = Duration::from_millis(50);

/// Why a wait ended without the cluster becoming ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitFailure {
    /// A poll failed.
    Fetch(cloudapi::Error),
    /// The deadline passed.
    Timeout {
        waited: Duration,
        last_status: String,
    },
    /// The cancel token fired.
    Cancelled { last_status: String },
}

/// Poll `fetch` until the cluster reports `in_service`.
///
/// Each iteration waits the poll interval first, then fetches. The cluster
/// from the first ready poll is returned.
pub fn until_ready<F>(
    id: &str,
    initial_status: &str,
    ctx: &ApplyContext<'_>,
    mut fetch: F,
) -> Result<Cluster, WaitFailure>
where
    F: FnMut() -> cloudapi::Result<Cluster>,
{
    let started = Instant::now();
    let mut last_status = initial_status.to_string();
    let mut attempt = 0u32;

    loop {
        pause(ctx, started, &last_status)?;

        attempt += 1;
        // A fetch cut short by cancel or the deadline reports as such
        let cluster = fetch()
            .map_err(|e| interruption(ctx, started, &last_status).unwrap_or(WaitFailure::Fetch(e)))?;
        log::debug!("{id}: poll {attempt} status={}", cluster.status);
        ctx.progress.on_poll(id, attempt, &cluster.status);

        if cluster.is_ready() {
            return Ok(cluster);
        }
        last_status.clone_from(&cluster.status);
    }
}

fn pause(ctx: &ApplyContext<'_>, started: Instant, last_status: &str) -> Result<(), WaitFailure> {
    let wake = started.elapsed().saturating_add(ctx.wait.poll_interval);

    loop {
        if let Some(failure) = interruption(ctx, started, last_status) {
            return Err(failure);
        }
        let elapsed = started.elapsed();
        if elapsed >= wake {
            return Ok(());
        }
        let nap = (wake - elapsed)
            .min(ctx.wait.max_wait.saturating_sub(elapsed))
            .min(SLICE);
        thread::sleep(nap);
    }
}

/// Cancel or deadline, whichever has happened
fn interruption(ctx: &ApplyContext<'_>, started: Instant, last_status: &str) -> Option<WaitFailure> {
    if ctx.cancel.is_cancelled() {
        return Some(WaitFailure::Cancelled {
            last_status: last_status.to_string(),
        });
    }
    let elapsed = started.elapsed();
    (elapsed >= ctx.wait.max_wait).then(|| WaitFailure::Timeout {
        waited: elapsed,
        last_status: last_status.to_string(),
    })
}
