//! Optional Prometheus surface (spec §2's ambient metrics addition): a
//! couple of counters tracked per wallet manager, served over HTTP the same
//! way `ordhook-core`'s monitoring module exposes its indexing metrics --
//! `hyper` for the listener, `prometheus` for the registry and text
//! encoding. Disabled entirely unless a caller constructs a [`Metrics`] and
//! passes it in; nothing here runs by default.

use std::convert::Infallible;
use std::net::SocketAddr;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    sync_ticks: IntCounter,
    transfers_submitted: IntCounter,
}

impl Metrics {
    pub fn new() -> Metrics {
        let registry = Registry::new();
        let sync_ticks = IntCounter::new(
            "wallet_core_sync_ticks_total",
            "sync ticks that issued a GetBlockNumber request to the remote indexer",
        )
        .expect("metric name is valid");
        let transfers_submitted = IntCounter::new(
            "wallet_core_transfers_submitted_total",
            "transfers handed off for broadcast",
        )
        .expect("metric name is valid");
        registry
            .register(Box::new(sync_ticks.clone()))
            .expect("metric registration cannot fail for a fresh registry");
        registry
            .register(Box::new(transfers_submitted.clone()))
            .expect("metric registration cannot fail for a fresh registry");
        Metrics {
            registry,
            sync_ticks,
            transfers_submitted,
        }
    }

    pub fn record_sync_tick(&self) {
        self.sync_ticks.inc();
    }

    pub fn record_transfer_submitted(&self) {
        self.transfers_submitted.inc();
    }

    pub fn sync_ticks_total(&self) -> i64 {
        self.sync_ticks.get()
    }

    pub fn transfers_submitted_total(&self) -> i64 {
        self.transfers_submitted.get()
    }

    fn render(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .expect("prometheus text encoding cannot fail");
        buffer
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics::new()
    }
}

/// Serves the registry's current snapshot at `GET /metrics` on `port`.
/// Runs until the process exits; the caller spawns this on its own task or
/// thread (mirrors `ordhook-core`'s
/// `start_serving_prometheus_metrics`/`nestable_block_on` pairing).
pub async fn start_serving_prometheus_metrics(port: u16, metrics: Metrics) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let make_svc = make_service_fn(move |_conn| {
        let metrics = metrics.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |_req: Request<Body>| {
                let metrics = metrics.clone();
                async move { Ok::<_, Infallible>(Response::new(Body::from(metrics.render()))) }
            }))
        }
    });
    if let Err(e) = Server::bind(&addr).serve(make_svc).await {
        eprintln!("prometheus metrics server error: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_increment() {
        let metrics = Metrics::new();
        let before = String::from_utf8(metrics.render()).unwrap();
        assert!(before.contains("wallet_core_sync_ticks_total 0"));
        metrics.record_sync_tick();
        metrics.record_transfer_submitted();
        let after = String::from_utf8(metrics.render()).unwrap();
        assert!(after.contains("wallet_core_sync_ticks_total 1"));
        assert!(after.contains("wallet_core_transfers_submitted_total 1"));
    }
}
