/*!
 * # Metrics Module
 *
 * Prometheus counters for HTTP traffic and domain activity, exposed in text
 * format at `/metrics`.
 */

use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::error;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref HTTP_REQUESTS: IntCounterVec = register_counter_vec(
        "http_requests_total",
        "HTTP requests by method and status code",
        &["method", "status"],
    );

    pub static ref DOMAIN_EVENTS: IntCounterVec = register_counter_vec(
        "domain_events_total",
        "Domain events processed, by event name",
        &["event"],
    );

    pub static ref WARRANTIES_CREATED: IntCounter =
        register_counter("warranties_created_total", "Total number of warranties created");

    pub static ref WARRANTY_CREATION_FAILURES: IntCounter = register_counter(
        "warranty_creation_failures_total",
        "Sales whose warranty batch failed and rolled back"
    );

    pub static ref SERVICE_CONFLICTS: IntCounter = register_counter(
        "service_open_conflicts_total",
        "Repairs rejected because another one was still open"
    );

    pub static ref POLICY_DENIALS: IntCounter = register_counter(
        "policy_denials_total",
        "Requests rejected by the access policy gate"
    );
}

fn register_counter(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("metric can be created");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("metric can be registered");
    counter
}

fn register_counter_vec(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    let counter = IntCounterVec::new(Opts::new(name, help), labels).expect("metric can be created");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("metric can be registered");
    counter
}

pub fn record_event(name: &str) {
    DOMAIN_EVENTS.with_label_values(&[name]).inc();
}

/// Counts every response by method and status
pub async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let response = next.run(request).await;
    HTTP_REQUESTS
        .with_label_values(&[method.as_str(), response.status().as_str()])
        .inc();
    response
}

/// Renders the registry in Prometheus text format
pub fn render() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| e.to_string())?;
    String::from_utf8(buffer).map_err(|e| e.to_string())
}

pub async fn metrics_handler() -> Response {
    match render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_rendered_output() {
        WARRANTIES_CREATED.inc();
        record_event("warranty_created");
        let text = render().unwrap();
        assert!(text.contains("warranties_created_total"));
        assert!(text.contains("domain_events_total"));
    }
}
