//! Metrics tracking middleware
//!
//! Tracks request latency, counts and status codes, plus authentication
//! outcomes, in a Prometheus registry owned by the application state.

use crate::state::AppState;
use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Instant;

/// Prometheus collectors for the HTTP surface
#[derive(Clone)]
pub struct ApiMetrics {
    registry: Registry,
    requests: IntCounterVec,
    latency: HistogramVec,
    auth_outcomes: IntCounterVec,
}

impl ApiMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("tribe".to_string()), None)?;

        let requests = IntCounterVec::new(
            Opts::new("http_requests_total", "HTTP requests by endpoint and status"),
            &["endpoint", "method", "status"],
        )?;
        let latency = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "HTTP request latency")
                .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
            &["endpoint"],
        )?;
        let auth_outcomes = IntCounterVec::new(
            Opts::new("auth_outcomes_total", "Authentication outcomes by operation"),
            &["operation", "outcome"],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(latency.clone()))?;
        registry.register(Box::new(auth_outcomes.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Self {
            registry,
            requests,
            latency,
            auth_outcomes,
        })
    }

    pub fn record_request(&self, endpoint: &str, method: &str, status: u16, elapsed_secs: f64) {
        self.requests
            .with_label_values(&[endpoint, method, &status.to_string()])
            .inc();
        self.latency
            .with_label_values(&[endpoint])
            .observe(elapsed_secs);
    }

    /// Count a sign-up, sign-in, join or credential check outcome
    pub fn record_auth(&self, operation: &str, outcome: &str) {
        self.auth_outcomes
            .with_label_values(&[operation, outcome])
            .inc();
    }

    /// Render every collector in the Prometheus text format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub async fn metrics_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let endpoint = match request.extensions().get::<MatchedPath>() {
        Some(matched) => matched.as_str().to_string(),
        None => normalize_endpoint(request.uri().path()),
    };
    let method = request.method().clone();

    let response = next.run(request).await;

    state.metrics.record_request(
        &endpoint,
        method.as_str(),
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}

/// Replace numeric id segments with `:id` so unmatched paths group together
fn normalize_endpoint(path: &str) -> String {
    path.split('/')
        .map(|seg| if is_numeric(seg) { ":id" } else { seg })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(
            normalize_endpoint("/api/auth/join/communities/3"),
            "/api/auth/join/communities/:id"
        );
        assert_eq!(normalize_endpoint("/api/communities"), "/api/communities");
        assert_eq!(normalize_endpoint("/health"), "/health");
    }

    #[test]
    fn test_is_numeric() {
        assert!(is_numeric("123"));
        assert!(!is_numeric("12a"));
        assert!(!is_numeric(""));
    }

    #[test]
    fn test_render_contains_recorded_series() {
        let metrics = ApiMetrics::new().unwrap();
        metrics.record_request("/api/auth/sign_in", "POST", 200, 0.02);
        metrics.record_auth("sign_in", "success");

        let output = metrics.render().unwrap();
        assert!(output.contains("tribe_http_requests_total"));
        assert!(output.contains("endpoint=\"/api/auth/sign_in\""));
        assert!(output.contains("tribe_auth_outcomes_total"));
        assert!(output.contains("outcome=\"success\""));
    }

    #[test]
    fn test_registries_are_independent() {
        let first = ApiMetrics::new().unwrap();
        let second = ApiMetrics::new().unwrap();
        first.record_auth("sign_up", "success");

        assert!(!second.render().unwrap().contains("sign_up"));
    }
}
