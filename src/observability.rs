use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: mutations executed through the controller. Labels: action.
pub const MUTATIONS_TOTAL: &str = "caseiro_mutations_total";

/// Counter: guest projections through the release gate. Labels: released.
pub const GATE_PROJECTIONS_TOTAL: &str = "caseiro_gate_projections_total";

/// Counter: history pages fetched from the store.
pub const HISTORY_FETCHES_TOTAL: &str = "caseiro_history_fetches_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Counter: feed snapshots applied by the pumps. Labels: feed.
pub const FEED_UPDATES_TOTAL: &str = "caseiro_feed_updates_total";

/// Counter: history cache invalidations.
pub const HISTORY_INVALIDATIONS_TOTAL: &str = "caseiro_history_invalidations_total";

/// Counter: audit writes that failed after the mutation itself succeeded.
pub const AUDIT_FAILURES_TOTAL: &str = "caseiro_audit_failures_total";

/// Counter: background favorite syncs that failed.
pub const FAVORITE_SYNC_FAILURES_TOTAL: &str = "caseiro_favorite_sync_failures_total";

/// Counter: expired event listings removed by the sweeper.
pub const SWEEPER_DELETES_TOTAL: &str = "caseiro_sweeper_deletes_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
