use std::{
    collections::VecDeque,
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
    thread,
    time::Duration,
};

use bytes::Bytes;
use http_body_util::BodyExt;
use http_metrics::{
    DebugValue, Dimension, DimensionSet, Entity, Exchange, HttpMetricsRegistry, MetricKind,
    MetricSettings, SettingsError,
};
use hyper::{
    body::{Body, Frame},
    Method, Request, Response, StatusCode, Version,
};
use quanta::Clock;

const REQUEST_CONTENT: &str = "This is the request content";

struct Chunks {
    frames: VecDeque<Bytes>,
}

impl Chunks {
    fn new(chunks: &[&'static str]) -> Self {
        Chunks { frames: chunks.iter().map(|chunk| Bytes::from_static(chunk.as_bytes())).collect() }
    }
}

impl Body for Chunks {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
        Poll::Ready(self.frames.pop_front().map(|chunk| Ok(Frame::data(chunk))))
    }

    fn is_end_stream(&self) -> bool {
        self.frames.is_empty()
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn registry(settings: MetricSettings) -> HttpMetricsRegistry {
    init_tracing();
    HttpMetricsRegistry::new(settings).expect("settings are valid")
}

fn detailed() -> MetricSettings {
    MetricSettings::default()
        .with_method_dimension(true)
        .with_path_dimension(true)
        .with_status_dimension(true)
}

fn request(method: Method, entity: Entity<Chunks>) -> Request<Entity<Chunks>> {
    Request::builder().method(method).uri("/").body(entity).expect("valid request")
}

fn response(status: StatusCode, entity: Entity<Chunks>) -> Response<Entity<Chunks>> {
    Response::builder().status(status).body(entity).expect("valid response")
}

#[test]
fn test_requests_active_tracks_unanswered_requests() {
    let registry = registry(MetricSettings::default());
    let server = DimensionSet::empty();

    let exchanges: Vec<Exchange> = (0..5)
        .map(|_| {
            let request = request(Method::GET, Entity::empty());
            let exchange = registry.exchange(&request);
            let _ = registry.on_request(request, &exchange);
            exchange
        })
        .collect();

    assert_eq!(registry.requests().value(&server), 5);
    assert_eq!(registry.requests_active().value(&server), 5);

    for exchange in &exchanges[..3] {
        let _ = registry.on_response(response(StatusCode::OK, Entity::empty()), exchange);
    }
    assert_eq!(registry.requests_active().value(&server), 2);

    registry.on_failure(&exchanges[3]);
    assert_eq!(registry.requests_active().value(&server), 1);
    assert_eq!(registry.requests_failures().total(), 1);
    assert_eq!(registry.responses().total(), 3);
}

#[test]
fn test_connections() {
    let registry = registry(MetricSettings::default());

    registry.on_connection();
    registry.on_connection();
    registry.on_disconnection();
    registry.on_connection();

    assert_eq!(registry.connections().total(), 3);
    assert_eq!(registry.connections_active().total(), 2);

    registry.on_disconnection();
    registry.on_disconnection();
    assert_eq!(registry.connections().total(), 3);
    assert_eq!(registry.connections_active().total(), 0);
}

#[test]
fn test_connections_from_many_threads() {
    let registry = registry(MetricSettings::default());

    thread::scope(|s| {
        for _ in 0..8 {
            let registry = registry.clone();
            s.spawn(move || {
                for _ in 0..100 {
                    registry.on_connection();
                    registry.on_disconnection();
                }
            });
        }
    });

    assert_eq!(registry.connections().total(), 800);
    assert_eq!(registry.connections_active().total(), 0);
}

#[test]
fn test_disconnection_without_connection_goes_negative() {
    let registry = registry(MetricSettings::default());
    registry.on_disconnection();
    assert_eq!(registry.connections_active().total(), -1);
}

#[test]
fn test_strict_request_size_recorded_immediately() {
    let registry = registry(MetricSettings::default());
    let request = request(Method::POST, Entity::strict(REQUEST_CONTENT));
    let exchange = registry.exchange(&request);

    let request = registry.on_request(request, &exchange);

    assert!(request.body().is_strict());
    assert_eq!(registry.requests_size().values(&DimensionSet::empty()), vec![27.0]);
}

#[tokio::test]
async fn test_chunked_request_size_recorded_once_consumed() {
    let registry = registry(MetricSettings::default());
    let request = request(Method::POST, Entity::chunked(Chunks::new(&["a", "b", "c"])));
    let exchange = registry.exchange(&request);

    let request = registry.on_request(request, &exchange);
    assert!(registry.requests_size().values(&DimensionSet::empty()).is_empty());

    let body = request.into_body().collect().await.expect("infallible").to_bytes();
    assert_eq!(body, "abc");
    assert_eq!(registry.requests_size().values(&DimensionSet::empty()), vec![3.0]);
}

#[tokio::test]
async fn test_streamed_request_size_matches_strict() {
    let registry = registry(MetricSettings::default());
    let entity = Entity::chunked(Chunks::new(&["This is ", "the request ", "content"]));
    let request = request(Method::POST, entity);
    let exchange = registry.exchange(&request);

    let request = registry.on_request(request, &exchange);
    let body = request.into_body().collect().await.expect("infallible").to_bytes();

    assert_eq!(body, REQUEST_CONTENT);
    assert_eq!(registry.requests_size().values(&DimensionSet::empty()), vec![27.0]);
}

#[tokio::test]
async fn test_response_duration_measured_from_arrival_to_completion() {
    init_tracing();
    let (clock, mock) = Clock::mock();
    let registry = HttpMetricsRegistry::with_clock(MetricSettings::default(), clock)
        .expect("default settings are valid");

    let request = request(Method::GET, Entity::empty());
    let exchange = registry.exchange(&request);
    let _ = registry.on_request(request, &exchange);

    mock.increment(Duration::from_millis(500));
    let entity = Entity::chunked(Chunks::new(&["response ", "content"]));
    let response = registry.on_response(response(StatusCode::OK, entity), &exchange);
    assert!(registry.responses_duration().values(&DimensionSet::empty()).is_empty());

    mock.increment(Duration::from_millis(250));
    let body = response.into_body().collect().await.expect("infallible").to_bytes();
    assert_eq!(body, "response content");

    let durations = registry.responses_duration().values(&DimensionSet::empty());
    assert_eq!(durations.len(), 1);
    assert!(durations[0] > 0.5, "duration was {}", durations[0]);
    assert_eq!(registry.responses_size().values(&DimensionSet::empty()), vec![16.0]);
}

#[test]
fn test_strict_response_duration_recorded_immediately() {
    let (clock, mock) = Clock::mock();
    let registry = HttpMetricsRegistry::with_clock(MetricSettings::default(), clock)
        .expect("default settings are valid");

    let request = request(Method::GET, Entity::empty());
    let exchange = registry.exchange(&request);
    let _ = registry.on_request(request, &exchange);

    mock.increment(Duration::from_millis(500));
    let _ = registry.on_response(response(StatusCode::OK, Entity::strict("ok")), &exchange);

    assert_eq!(registry.responses_duration().values(&DimensionSet::empty()), vec![0.5]);
    assert_eq!(registry.responses_size().values(&DimensionSet::empty()), vec![2.0]);
}

#[test]
fn test_exchange_without_timestamp_skips_duration() {
    let registry = registry(MetricSettings::default());
    let exchange = Exchange::new();

    let _ = registry.on_response(response(StatusCode::OK, Entity::strict("ok")), &exchange);

    assert_eq!(registry.responses().total(), 1);
    assert_eq!(registry.responses_size().count(&DimensionSet::empty()), 1);
    assert_eq!(registry.responses_duration().count(&DimensionSet::empty()), 0);
}

#[tokio::test]
async fn test_http10_declared_length_response_is_not_reframed() {
    let registry = registry(MetricSettings::default());
    let exchange = Exchange::new();
    let entity = Entity::with_content_length(5, Chunks::new(&["hello"]));
    let mut response = response(StatusCode::OK, entity);
    *response.version_mut() = Version::HTTP_10;

    let response = registry.on_response(response, &exchange);

    assert!(matches!(
        response.body(),
        Entity::Default { content_length: 5, body } if !body.is_instrumented()
    ));
    assert_eq!(registry.responses_size().values(&DimensionSet::empty()), vec![5.0]);

    let body = response.into_body().collect().await.expect("infallible").to_bytes();
    assert_eq!(body, "hello");
    assert_eq!(registry.responses_size().values(&DimensionSet::empty()), vec![5.0]);
}

#[tokio::test]
async fn test_http11_declared_length_response_is_metered() {
    let registry = registry(MetricSettings::default());
    let exchange = Exchange::new();
    let entity = Entity::with_content_length(10, Chunks::new(&["hello", "world"]));

    let response = registry.on_response(response(StatusCode::OK, entity), &exchange);

    assert!(matches!(response.body(), Entity::Default { body, .. } if body.is_instrumented()));
    assert!(registry.responses_size().values(&DimensionSet::empty()).is_empty());

    let _ = response.into_body().collect().await.expect("infallible");
    assert_eq!(registry.responses_size().values(&DimensionSet::empty()), vec![10.0]);
}

#[test]
fn test_method_dimension() {
    let registry = registry(MetricSettings::default().with_method_dimension(true));

    for method in [Method::GET, Method::PUT, Method::GET] {
        let request = request(method, Entity::empty());
        let exchange = registry.exchange(&request);
        let _ = registry.on_request(request, &exchange);
        let _ = registry.on_response(response(StatusCode::OK, Entity::empty()), &exchange);
    }

    let get = DimensionSet::new(&[("method", "GET")]);
    let put = DimensionSet::new(&[("method", "PUT")]);
    assert_eq!(registry.requests().value(&get), 2);
    assert_eq!(registry.requests().value(&put), 1);
    assert_eq!(registry.responses().value(&get), 2);
    assert_eq!(registry.responses().value(&put), 1);
    assert_eq!(registry.requests().total(), 3);

    // Active gauges are not segmented by method.
    assert_eq!(registry.requests_active().value(&DimensionSet::empty()), 0);
}

#[test]
fn test_unused_method_reads_zero() {
    let registry = registry(MetricSettings::default().with_method_dimension(true));
    let request = request(Method::GET, Entity::empty());
    let exchange = registry.exchange(&request);
    let _ = registry.on_request(request, &exchange);
    let _ = registry.on_response(response(StatusCode::OK, Entity::empty()), &exchange);

    let get = DimensionSet::new(&[("method", "GET")]);
    let put = DimensionSet::new(&[("method", "PUT")]);
    assert_eq!(registry.requests().value(&get), 1);
    assert_eq!(registry.requests().value(&put), 0);
    assert_eq!(registry.responses().value(&get), 1);
    assert_eq!(registry.responses().value(&put), 0);
}

#[test]
fn test_request_method_used_when_exchange_has_none() {
    let registry = registry(MetricSettings::default().with_method_dimension(true));

    let _ = registry.on_request(request(Method::DELETE, Entity::empty()), &Exchange::new());
    let _ = registry.on_response(response(StatusCode::OK, Entity::empty()), &Exchange::new());

    assert_eq!(registry.requests().value(&DimensionSet::new(&[("method", "DELETE")])), 1);
    assert_eq!(registry.responses().value(&DimensionSet::new(&[("method", "unknown")])), 1);
}

#[test]
fn test_path_dimension() {
    let registry = registry(MetricSettings::default().with_path_dimension(true));

    let labelled = request(Method::GET, Entity::empty());
    let exchange = registry.exchange(&labelled).with_path("/users/{id}");
    let _ = registry.on_request(labelled, &exchange);

    let _ = registry.on_response(response(StatusCode::OK, Entity::empty()), &exchange);

    let unlabelled = request(Method::GET, Entity::empty());
    let exchange = registry.exchange(&unlabelled);
    let _ = registry.on_request(unlabelled, &exchange);
    let _ = registry.on_response(response(StatusCode::OK, Entity::empty()), &exchange);

    let labelled = DimensionSet::new(&[("path", "/users/{id}")]);
    let unlabelled = DimensionSet::new(&[("path", "unlabelled")]);
    assert_eq!(registry.requests().value(&labelled), 1);
    assert_eq!(registry.requests().value(&unlabelled), 1);
    assert_eq!(registry.responses().value(&labelled), 1);
    assert_eq!(registry.responses().value(&unlabelled), 1);
    assert_eq!(registry.responses().total(), 2);
}

#[test]
fn test_status_dimension_and_errors() {
    let registry = registry(MetricSettings::default().with_status_dimension(true));

    for status in [StatusCode::OK, StatusCode::NOT_FOUND, StatusCode::BAD_GATEWAY, StatusCode::OK] {
        let _ = registry.on_response(response(status, Entity::empty()), &Exchange::new());
    }

    let ok = DimensionSet::new(&[("status", "2xx")]);
    let not_found = DimensionSet::new(&[("status", "4xx")]);
    let bad_gateway = DimensionSet::new(&[("status", "5xx")]);
    assert_eq!(registry.responses().value(&ok), 2);
    assert_eq!(registry.responses().value(&not_found), 1);
    assert_eq!(registry.responses().value(&bad_gateway), 1);
    assert_eq!(registry.responses_errors().value(&bad_gateway), 1);
    assert_eq!(registry.responses_errors().total(), 1);
}

#[test]
fn test_custom_error_classifier() {
    let settings = MetricSettings::default()
        .with_error_classifier(|status: StatusCode| status.as_u16() >= 400);
    let registry = registry(settings);

    for status in [StatusCode::OK, StatusCode::NOT_FOUND, StatusCode::INTERNAL_SERVER_ERROR] {
        let _ = registry.on_response(response(status, Entity::empty()), &Exchange::new());
    }

    assert_eq!(registry.responses_errors().total(), 2);
}

#[test]
fn test_server_dimensions_on_every_metric() {
    let settings = detailed().with_server_dimension(Dimension::new("env", "test"));
    let registry = registry(settings);

    registry.on_connection();
    let request = request(Method::GET, Entity::strict(REQUEST_CONTENT));
    let exchange = registry.exchange(&request).with_path("/");
    let _ = registry.on_request(request, &exchange);
    let _ = registry.on_response(response(StatusCode::OK, Entity::strict("ok")), &exchange);

    let server = DimensionSet::new(&[("env", "test")]);
    let request_dims = DimensionSet::new(&[("env", "test"), ("method", "GET"), ("path", "/")]);
    let response_dims =
        DimensionSet::new(&[("env", "test"), ("method", "GET"), ("path", "/"), ("status", "2xx")]);

    assert_eq!(registry.connections().value(&server), 1);
    assert_eq!(registry.connections_active().value(&server), 1);
    assert_eq!(registry.requests().value(&request_dims), 1);
    assert_eq!(registry.requests_active().value(&server), 0);
    assert_eq!(registry.requests_size().values(&request_dims), vec![27.0]);
    assert_eq!(registry.responses().value(&response_dims), 1);
    assert_eq!(registry.responses_size().values(&response_dims), vec![2.0]);
    assert_eq!(registry.responses_duration().count(&response_dims), 1);
}

#[test]
fn test_failure_dimensions() {
    let registry = registry(detailed());
    let request = request(Method::POST, Entity::empty());
    let exchange = registry.exchange(&request).with_path("/upload");
    let _ = registry.on_request(request, &exchange);

    registry.on_failure(&exchange);

    let dims = DimensionSet::new(&[("method", "POST"), ("path", "/upload")]);
    assert_eq!(registry.requests_failures().value(&dims), 1);
    assert_eq!(registry.requests_active().total(), 0);
    assert_eq!(registry.responses().total(), 0);
}

#[tokio::test]
async fn test_abandoned_response_records_partial_size() {
    let registry = registry(MetricSettings::default());
    let entity = Entity::chunked(Chunks::new(&["abc", "def", "ghi"]));
    let mut response = registry.on_response(response(StatusCode::OK, entity), &Exchange::new());

    let _ = response.body_mut().frame().await;
    drop(response);

    assert_eq!(registry.responses_size().values(&DimensionSet::empty()), vec![3.0]);
}

#[test]
fn test_snapshot() {
    let registry = registry(MetricSettings::default().with_namespace("api"));
    registry.on_connection();
    let request = request(Method::GET, Entity::strict(REQUEST_CONTENT));
    let exchange = registry.exchange(&request);
    let _ = registry.on_request(request, &exchange);
    let _ = registry.on_response(response(StatusCode::BAD_GATEWAY, Entity::empty()), &exchange);

    let snapshot = registry.snapshot();
    let empty = DimensionSet::empty();

    assert_eq!(snapshot.get("api_requests", &empty), Some(&DebugValue::Counter(1)));
    assert_eq!(snapshot.get("api_requests_active", &empty), Some(&DebugValue::Gauge(0)));
    assert_eq!(snapshot.get("api_responses_errors", &empty), Some(&DebugValue::Counter(1)));
    assert_eq!(snapshot.get("api_connections_active", &empty), Some(&DebugValue::Gauge(1)));
    assert_eq!(snapshot.get("api_requests_failures", &empty), None);
    assert!(matches!(
        snapshot.get("api_requests_size", &empty),
        Some(DebugValue::Histogram(values)) if values.len() == 1
    ));

    let kinds: Vec<MetricKind> = snapshot.iter().map(|entry| entry.kind).collect();
    assert!(kinds.contains(&MetricKind::Histogram));
    assert!(snapshot.iter().all(|entry| entry.name.starts_with("api_")));
}

#[test]
fn test_snapshot_and_clear_drains_histograms() {
    let registry = registry(MetricSettings::default());
    let empty = DimensionSet::empty();

    for _ in 0..10_000 {
        let exchange = Exchange::new();
        let _ = registry.on_response(response(StatusCode::OK, Entity::strict("ok")), &exchange);
    }
    assert_eq!(registry.responses_size().retained(), 10_000);

    // A copying snapshot leaves samples in place.
    let _ = registry.snapshot();
    let _ = registry.snapshot();
    assert_eq!(registry.responses_size().retained(), 10_000);

    let drained = registry.snapshot_and_clear();
    assert!(matches!(
        drained.get("http_responses_size", &empty),
        Some(DebugValue::Histogram(values)) if values.len() == 10_000
    ));
    assert_eq!(drained.get("http_responses", &empty), Some(&DebugValue::Counter(10_000)));
    assert_eq!(registry.responses_size().retained(), 0);
    assert_eq!(registry.requests_size().retained(), 0);

    let _ = registry.on_response(response(StatusCode::OK, Entity::strict("ok")), &Exchange::new());
    let next = registry.snapshot_and_clear();
    assert!(matches!(
        next.get("http_responses_size", &empty),
        Some(DebugValue::Histogram(values)) if values.len() == 1
    ));
    assert_eq!(registry.responses_size().retained(), 0);

    // Counters are cumulative and never drained.
    assert_eq!(registry.responses().total(), 10_001);
}

#[test]
fn test_clones_share_settings_and_clock() {
    let (clock, mock) = Clock::mock();
    let settings = MetricSettings::default().with_namespace("edge");
    let registry = HttpMetricsRegistry::with_clock(settings, clock).expect("valid settings");
    let handle = registry.clone();

    assert_eq!(handle.settings().namespace(), "edge");
    assert_eq!(handle.settings().full_name("requests"), "edge_requests");

    let before = registry.clock().now();
    mock.increment(Duration::from_secs(2));
    assert_eq!(handle.clock().now().duration_since(before), Duration::from_secs(2));

    handle.on_connection();
    assert_eq!(registry.connections().total(), 1);
}

#[test]
fn test_registries_are_independent() {
    let first = registry(MetricSettings::default());
    let second = registry(MetricSettings::default());

    first.on_connection();

    assert_eq!(first.connections().total(), 1);
    assert_eq!(second.connections().total(), 0);
}

#[test]
fn test_invalid_settings_are_rejected() {
    init_tracing();
    let settings = MetricSettings::default()
        .with_method_dimension(true)
        .with_server_dimensions(&[("method", "fixed")]);

    assert_eq!(
        HttpMetricsRegistry::new(settings).err(),
        Some(SettingsError::ReservedDimensionKey { key: "method".to_string() })
    );
}
