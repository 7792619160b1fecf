use metrics::{Unit, counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use std::time::Instant;

use crate::core::entities::EntityKind;

pub const CONDUIT_MUTATIONS_TOTAL: &str = "conduit_mutations_total";
pub const CONDUIT_SYNC_DURATION_SECONDS: &str = "conduit_sync_duration_seconds";
pub const CONDUIT_PROXY_RELOADS_TOTAL: &str = "conduit_proxy_reloads_total";

static DESCRIPTIONS: Lazy<()> = Lazy::new(|| {
    describe_counter!(
        CONDUIT_MUTATIONS_TOTAL,
        Unit::Count,
        "Mutating calls handled by the sync service, by entity kind, operation and outcome."
    );
    describe_histogram!(
        CONDUIT_SYNC_DURATION_SECONDS,
        Unit::Seconds,
        "Time spent rendering the haproxy config and reloading the proxy."
    );
    describe_counter!(
        CONDUIT_PROXY_RELOADS_TOTAL,
        Unit::Count,
        "Reload commands issued to the proxy, by result."
    );
});

/// Install the global Prometheus recorder and return the handle used by `/metrics`.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    Lazy::force(&DESCRIPTIONS);
    Ok(handle)
}

pub fn increment_mutation_total(kind: EntityKind, operation: &'static str, outcome: &'static str) {
    counter!(
        CONDUIT_MUTATIONS_TOTAL,
        "kind" => kind.to_string(),
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}

pub fn increment_reload_total(success: bool) {
    let result = if success { "success" } else { "failure" };
    counter!(CONDUIT_PROXY_RELOADS_TOTAL, "result" => result).increment(1);
}

// Records the sync latency when dropped
pub struct SyncTimer {
    start: Instant,
}

impl SyncTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SyncTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SyncTimer {
    fn drop(&mut self) {
        histogram!(CONDUIT_SYNC_DURATION_SECONDS).record(self.start.elapsed().as_secs_f64());
    }
}
