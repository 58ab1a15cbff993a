use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metric registration so every series shows up on /metrics
/// with help text, whether or not it has fired yet.
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("poll_cycles_total", "Poll cycles completed, per adapter.");
        describe_counter!("poll_cycle_errors_total", "Poll cycles aborted by an error.");
        describe_counter!(
            "poll_items_examined_total",
            "Items fetched and run through the keyword filter."
        );
        describe_counter!("poll_matches_total", "Items that matched the keyword.");
        describe_counter!("notify_sent_total", "Notifications delivered to the channel.");
        describe_counter!(
            "notify_replayed_total",
            "Notifications skipped because their replay key was already sent."
        );
        describe_gauge!(
            "poll_last_run_ts",
            "Unix ts of the most recent cycle, per adapter."
        );
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    pub fn init() -> Self {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("prometheus: install recorder");
        ensure_described();
        Self { handle }
    }

    /// Router exposing `/metrics` in the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
