//! TCP connect probe.

use std::sync::Arc;
use std::time::Duration;
use dashmap::DashMap;
use tokio::net::TcpStream;
use tokio::task::AbortHandle;
use tokio::time;
use crate::health::probe::{HealthProbe, ProbeReporter};
use crate::upstream::{Host, HostId};

/// Healthy if a TCP connection can be established within `timeout`.
pub struct TcpProbe {
    timeout: Duration,
    in_flight: DashMap<HostId, AbortHandle>,
}

impl TcpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            in_flight: DashMap::new(),
        }
    }
}

impl HealthProbe for TcpProbe {
    fn on_interval(&self, host: &Arc<Host>, reporter: ProbeReporter) {
        let addr = host.address;
        let timeout = self.timeout;

        let task = tokio::spawn(async move {
            match time::timeout(timeout, TcpStream::connect(addr)).await {
                Ok(Ok(_stream)) => {
                    tracing::debug!(address = %addr, "TCP health check succeeded");
                    reporter.success();
                }
                Ok(Err(e)) => {
                    tracing::debug!(address = %addr, error = %e, "TCP health check failed");
                    reporter.failure();
                }
                Err(_) => {
                    tracing::debug!(address = %addr, "TCP health check timed out");
                    reporter.failure();
                }
            }
        });

        if let Some(previous) = self.in_flight.insert(host.id(), task.abort_handle()) {
            previous.abort();
        }
    }

    fn on_timeout(&self, host: &Arc<Host>) {
        if let Some((_, task)) = self.in_flight.remove(&host.id()) {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HealthCheckConfig;
    use crate::health::HealthChecker;
    use crate::upstream::Cluster;
    use crate::config::HostConfig;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_connect_success_and_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                drop(socket);
            }
        });

        // Bind then drop to get a port nothing listens on.
        let closed = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();

        let cluster = Arc::new(Cluster::new("tcp"));
        cluster.update_hosts(&[
            HostConfig { address: open.to_string(), priority: 0 },
            HostConfig { address: closed.to_string(), priority: 0 },
        ]);

        let config = HealthCheckConfig {
            interval_ms: 60_000,
            timeout_ms: 2_000,
            unhealthy_threshold: 1,
            ..HealthCheckConfig::default()
        };
        let checker = HealthChecker::new("tcp", config)
            .unwrap()
            .with_cluster(cluster)
            .with_probe(Arc::new(TcpProbe::new(Duration::from_secs(2))));

        let (tx, mut rx) = mpsc::unbounded_channel();
        checker.add_host_check_complete_cb(move |host, changed| {
            let _ = tx.send((host.address, changed));
        });
        checker.start().unwrap();

        let mut results = vec![rx.recv().await.unwrap(), rx.recv().await.unwrap()];
        results.sort_by_key(|(addr, _)| *addr == closed);
        assert_eq!(results[0], (open, false));
        assert_eq!(results[1], (closed, true));

        checker.stop();
    }
}
