//! # Trace Middleware
//!
//! W3C trace context for each request, the per-request span, and the
//! `X-Trace-Id` / `X-Sampled` response headers.
//!
//! An inbound `traceparent` is continued: the request keeps its trace id and
//! sampling decision and gets a fresh span id. Without one (or with a
//! malformed one) a new sampled trace is started.

use axum::extract::{MatchedPath, Request};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::Response;
use opentelemetry::trace::{SpanId, TraceFlags, TraceId};
use tower_http::trace::MakeSpan;
use tracing::{field, info_span, Span};
use uuid::Uuid;

use crate::web::middleware::request_id::RequestId;

pub static TRACEPARENT: HeaderName = HeaderName::from_static("traceparent");
pub static X_TRACE_ID: HeaderName = HeaderName::from_static("x-trace-id");
pub static X_SAMPLED: HeaderName = HeaderName::from_static("x-sampled");

const TRACEPARENT_VERSION: &str = "00";

/// Trace identity of the request being served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub parent_span_id: Option<SpanId>,
    pub flags: TraceFlags,
}

impl TraceContext {
    /// Start a new sampled trace.
    pub fn root() -> Self {
        Self {
            trace_id: TraceId::from_bytes(Uuid::new_v4().into_bytes()),
            span_id: new_span_id(),
            parent_span_id: None,
            flags: TraceFlags::SAMPLED,
        }
    }

    /// Continue the trace described by a `traceparent` header value.
    ///
    /// Returns `None` for malformed values and for all-zero trace or span ids.
    pub fn from_traceparent(value: &str) -> Option<Self> {
        let mut fields = value.trim().split('-');
        let version = fields.next()?;
        let trace_id = fields.next()?;
        let parent_id = fields.next()?;
        let flags = fields.next()?;

        if version != TRACEPARENT_VERSION || fields.next().is_some() {
            return None;
        }
        if !is_lower_hex(trace_id, 32) || !is_lower_hex(parent_id, 16) || !is_lower_hex(flags, 2) {
            return None;
        }

        let trace_id = TraceId::from_hex(trace_id).ok()?;
        let parent_span_id = SpanId::from_hex(parent_id).ok()?;
        if trace_id == TraceId::INVALID || parent_span_id == SpanId::INVALID {
            return None;
        }
        let flags = u8::from_str_radix(flags, 16).ok()?;

        Some(Self {
            trace_id,
            span_id: new_span_id(),
            parent_span_id: Some(parent_span_id),
            flags: TraceFlags::new(flags & TraceFlags::SAMPLED.to_u8()),
        })
    }

    pub fn is_sampled(&self) -> bool {
        self.flags.is_sampled()
    }

    /// `traceparent` value naming this request's span as the parent
    pub fn traceparent(&self) -> String {
        format!(
            "{TRACEPARENT_VERSION}-{}-{}-{:02x}",
            self.trace_id,
            self.span_id,
            self.flags.to_u8()
        )
    }
}

fn new_span_id() -> SpanId {
    let bytes = Uuid::new_v4().into_bytes();
    let mut span = [0u8; 8];
    span.copy_from_slice(&bytes[8..]);
    SpanId::from_bytes(span)
}

fn is_lower_hex(value: &str, len: usize) -> bool {
    value.len() == len
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Attach a [`TraceContext`] to the request and report it on the response.
pub async fn propagate_trace(mut request: Request, next: Next) -> Response {
    let trace = request
        .headers()
        .get(&TRACEPARENT)
        .and_then(|value| value.to_str().ok())
        .and_then(TraceContext::from_traceparent)
        .unwrap_or_else(TraceContext::root);
    request.extensions_mut().insert(trace);

    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&trace.trace_id.to_string()) {
        headers.insert(X_TRACE_ID.clone(), value);
    }
    headers.insert(
        X_SAMPLED.clone(),
        HeaderValue::from_static(if trace.is_sampled() { "1" } else { "0" }),
    );
    response
}

/// Span name: `METHOD <route template>`, or the raw path when no route matched
pub fn span_name<B>(request: &axum::http::Request<B>) -> String {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(MatchedPath::as_str)
        .unwrap_or_else(|| request.uri().path());
    format!("{} {route}", request.method())
}

/// Builds the `http_request` span for [`tower_http::trace::TraceLayer`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> Span {
        let method: &Method = request.method();
        let route = request
            .extensions()
            .get::<MatchedPath>()
            .map(MatchedPath::as_str);

        let span = info_span!(
            "http_request",
            otel.name = %span_name(request),
            http.method = %method,
            http.route = field::Empty,
            url.path = %request.uri().path(),
            request_id = field::Empty,
            trace_id = field::Empty,
            span_id = field::Empty,
            sampled = field::Empty,
        );

        if let Some(route) = route {
            span.record("http.route", route);
        }
        if let Some(RequestId(id)) = request.extensions().get::<RequestId>() {
            span.record("request_id", id.as_str());
        }
        if let Some(trace) = request.extensions().get::<TraceContext>() {
            span.record("trace_id", field::display(trace.trace_id));
            span.record("span_id", field::display(trace.span_id));
            span.record("sampled", trace.is_sampled());
        }
        span
    }
}
