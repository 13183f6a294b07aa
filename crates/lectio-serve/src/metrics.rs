//! Prometheus metrics for the lectio service.
//!
//! Counters are recorded through the `metrics` facade and are no-ops until
//! [`init_metrics`] installs the Prometheus recorder, so handlers and tests
//! can record unconditionally.
//!
//! # Metric Naming Conventions
//!
//! - Suffix: unit or type (`_total`)
//! - Labels: small closed sets only (`provider`, `outcome`, `source`)

use std::net::SocketAddr;

use axum::{Router, routing::get};
use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::scripture::UpstreamError;

pub const UPSTREAM_REQUESTS: &str = "upstream_requests_total";
pub const STUDY_GENERATED: &str = "study_generated_total";
pub const VERSES_SERVED: &str = "verses_served_total";
pub const LLM_FALLBACK: &str = "llm_fallback_total";

/// Install the Prometheus recorder and register metric descriptions.
///
/// Fails if a recorder is already installed.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {e}"))?;

    register_metrics();

    Ok(handle)
}

/// Serve `/metrics` on the given port from a background task.
///
/// The listener is bound before returning so a port clash surfaces here.
pub async fn start_metrics_server(port: u16, handle: PrometheusHandle) -> std::io::Result<()> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Metrics server listening on http://{}/metrics", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "metrics server stopped");
        }
    });

    Ok(())
}

fn register_metrics() {
    describe_counter!(
        UPSTREAM_REQUESTS,
        "Outbound provider calls (labels: provider, outcome)"
    );
    describe_counter!(
        STUDY_GENERATED,
        "Studies composed (label: source)"
    );
    describe_counter!(
        VERSES_SERVED,
        "Verse listings served (label: source)"
    );
    describe_counter!(
        LLM_FALLBACK,
        "Studies that fell back to local motifs after an LLM failure"
    );
}

// =============================================================================
// Metric Recording Helpers
// =============================================================================

/// Record the outcome of one outbound call.
pub fn record_upstream<T>(provider: &'static str, result: &Result<T, UpstreamError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.outcome(),
    };
    metrics::counter!(UPSTREAM_REQUESTS, "provider" => provider, "outcome" => outcome)
        .increment(1);
}

#[inline]
pub fn record_study(source: &'static str) {
    metrics::counter!(STUDY_GENERATED, "source" => source).increment(1);
}

#[inline]
pub fn record_verses(source: &'static str) {
    metrics::counter!(VERSES_SERVED, "source" => source).increment(1);
}

#[inline]
pub fn record_llm_fallback() {
    metrics::counter!(LLM_FALLBACK).increment(1);
}
