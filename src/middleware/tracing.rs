use axum::{
    extract::{MatchedPath, Request},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use opentelemetry::{
    trace::{Span, SpanKind, Status, Tracer},
    KeyValue,
};
use std::time::{Duration, Instant};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Request fields captured before the request is handed on.
struct RequestInfo {
    method: String,
    url: String,
    route: String,
    user_agent: Option<String>,
    forwarded_for: Option<String>,
}

impl RequestInfo {
    fn from_request(request: &Request) -> Self {
        // The SPA fallback has no matched route
        let route = request
            .extensions()
            .get::<MatchedPath>()
            .map_or("fallback", MatchedPath::as_str)
            .to_string();
        let headers = request.headers();

        Self {
            method: request.method().to_string(),
            url: request.uri().to_string(),
            route,
            user_agent: header_value(headers, header::USER_AGENT.as_str()),
            forwarded_for: header_value(headers, "x-forwarded-for"),
        }
    }

    fn span_name(&self) -> String {
        format!("{} {}", self.method, self.route)
    }

    fn otel_attributes(&self) -> Vec<KeyValue> {
        let mut attributes = vec![
            KeyValue::new("http.method", self.method.clone()),
            KeyValue::new("http.url", self.url.clone()),
            KeyValue::new("http.route", self.route.clone()),
        ];
        if let Some(agent) = &self.user_agent {
            attributes.push(KeyValue::new("http.user_agent", agent.clone()));
        }
        if let Some(ip) = &self.forwarded_for {
            attributes.push(KeyValue::new("http.client_ip", ip.clone()));
        }
        attributes
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Wraps every request in an OpenTelemetry server span plus a `tracing`
/// span carrying a fresh request id, then logs status and latency.
pub async fn observability_middleware(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let info = RequestInfo::from_request(&request);

    let tracer = crate::telemetry::get_tracer("alanmath-http");
    let mut otel_span = tracer
        .span_builder(info.span_name())
        .with_kind(SpanKind::Server)
        .with_attributes(info.otel_attributes())
        .start(&tracer);

    let log_span = info_span!(
        "request",
        method = %info.method,
        route = %info.route,
        request_id = %Uuid::now_v7(),
    );

    let response = next.run(request).instrument(log_span.clone()).await;
    let status = response.status();
    let elapsed = started.elapsed();

    log_span.in_scope(|| log_outcome(status, elapsed));
    finish_span(&mut otel_span, status, elapsed);

    response
}

fn log_outcome(status: StatusCode, elapsed: Duration) {
    let latency_ms = elapsed.as_millis() as u64;
    if status.is_server_error() {
        warn!(status = status.as_u16(), latency_ms, "Request failed");
    } else {
        info!(status = status.as_u16(), latency_ms, "Request completed");
    }
}

fn finish_span(span: &mut impl Span, status: StatusCode, elapsed: Duration) {
    span.set_attribute(KeyValue::new("http.status_code", i64::from(status.as_u16())));
    span.set_attribute(KeyValue::new(
        "http.response_time_ms",
        elapsed.as_millis() as i64,
    ));
    span.set_status(if status.is_server_error() {
        Status::error(format!("HTTP {}", status.as_u16()))
    } else {
        Status::Ok
    });
    span.end();
}
