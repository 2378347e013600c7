//! HTTP GET probe.
//!
//! # Responsibilities
//! - Probe `http://<host><path>` and treat 2xx as healthy
//! - Optionally verify the upstream identifies as the expected service
//!
//! # Design Decisions
//! - One pooled client per probe, shared by every host in the cluster
//! - A service name mismatch is a failure and bumps `verify_cluster`

use std::sync::Arc;
use std::time::Duration;
use bytes::Bytes;
use dashmap::DashMap;
use http_body_util::Empty;
use hyper::{header, Method, Request, Uri};
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use tokio::task::AbortHandle;
use tokio::time;
use crate::health::probe::{HealthProbe, ProbeReporter};
use crate::upstream::{Host, HostId};

/// Response header carrying the upstream's service name.
pub const HEALTHCHECKED_CLUSTER_HEADER: &str = "x-envoy-upstream-healthchecked-cluster";

pub struct HttpProbe {
    client: Client<HttpConnector, Empty<Bytes>>,
    path: String,
    service_name: Option<String>,
    timeout: Duration,
    in_flight: DashMap<HostId, AbortHandle>,
}

impl HttpProbe {
    pub fn new(path: String, service_name: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .build(HttpConnector::new());

        Self {
            client,
            path,
            service_name,
            timeout,
            in_flight: DashMap::new(),
        }
    }

    fn build_request(&self, host: &Host) -> Result<Request<Empty<Bytes>>, http::Error> {
        let uri: Uri = format!("http://{}{}", host.address, self.path).parse()?;
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(header::USER_AGENT, "upstream-health-check")
            .body(Empty::new())
    }
}

impl HealthProbe for HttpProbe {
    fn on_interval(&self, host: &Arc<Host>, reporter: ProbeReporter) {
        let addr = host.address;
        let request = match self.build_request(host) {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(address = %addr, error = %e, "Failed to build health check request");
                reporter.failure();
                return;
            }
        };

        let response_future = self.client.request(request);
        let service_name = self.service_name.clone();
        let timeout = self.timeout;

        let task = tokio::spawn(async move {
            let response = match time::timeout(timeout, response_future).await {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    let incomplete = std::error::Error::source(&e)
                        .and_then(|source| source.downcast_ref::<hyper::Error>())
                        .is_some_and(hyper::Error::is_incomplete_message);
                    tracing::debug!(
                        address = %addr,
                        error = %e,
                        connect = e.is_connect(),
                        incomplete,
                        "Health check failed: connection error"
                    );
                    reporter.failure();
                    return;
                }
                Err(_) => {
                    tracing::debug!(address = %addr, "Health check failed: timeout");
                    reporter.failure();
                    return;
                }
            };

            if !response.status().is_success() {
                tracing::debug!(address = %addr, status = %response.status(), "Health check failed: non-success status");
                reporter.failure();
                return;
            }

            match service_name {
                Some(expected) => {
                    let actual = response
                        .headers()
                        .get(HEALTHCHECKED_CLUSTER_HEADER)
                        .and_then(|v| v.to_str().ok());
                    if actual == Some(expected.as_str()) {
                        reporter.success();
                    } else {
                        tracing::debug!(address = %addr, expected = %expected, actual = ?actual, "Health check failed: service name mismatch");
                        reporter.verify_cluster_failure();
                    }
                }
                None => reporter.success(),
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
