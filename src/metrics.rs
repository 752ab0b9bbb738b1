use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up in the exposition).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "digest_titles_considered_total",
            "Titles in the working set of an aggregation run."
        );
        describe_counter!(
            "digest_titles_matched_total",
            "Titles assigned to a group."
        );
        describe_counter!(
            "digest_titles_rejected_total",
            "Titles filtered out or matching no group."
        );
        describe_gauge!(
            "digest_groups_emitted",
            "Groups in the most recent aggregation output."
        );
    });
}

/// Record the outcome of one aggregation run. `variant` is `ranked` or `rss`.
pub fn record_run(variant: &'static str, considered: usize, matched: usize, groups: usize) {
    ensure_metrics_described();
    counter!("digest_titles_considered_total", "variant" => variant).increment(considered as u64);
    counter!("digest_titles_matched_total", "variant" => variant).increment(matched as u64);
    counter!("digest_titles_rejected_total", "variant" => variant)
        .increment(considered.saturating_sub(matched) as u64);
    gauge!("digest_groups_emitted", "variant" => variant).set(groups as f64);
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder for this process.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Prometheus exposition text.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
