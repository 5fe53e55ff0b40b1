//! A dimensional metrics registry for HTTP servers and clients.
//!
//! `http-metrics` records the traffic of an HTTP layer as a fixed family of metrics: how many
//! requests arrived and how many are still in flight, how big their bodies were, how long the
//! responses took to complete, and how many connections are open.  Each sample is tagged with
//! [dimensions][Dimension] so that the same metric can be broken down by method, by route, by
//! status class, or by anything the server chooses to attach.
//!
//! # Recording traffic
//!
//! The HTTP layer owns an [`HttpMetricsRegistry`] and calls its hooks as traffic flows:
//!
//! - [`on_connection`][HttpMetricsRegistry::on_connection] and
//!   [`on_disconnection`][HttpMetricsRegistry::on_disconnection] as connections open and close,
//! - [`on_request`][HttpMetricsRegistry::on_request] when a request arrives,
//! - [`on_response`][HttpMetricsRegistry::on_response] when its response is sent, or
//!   [`on_failure`][HttpMetricsRegistry::on_failure] when no response will be.
//!
//! A request and its response are tied together by an [`Exchange`], which carries the request
//! method, an optional path label and the arrival instant.  Message bodies are passed as an
//! [`Entity`]; the hooks hand them back wrapped in a [`Metered`] body, and the body size (and for
//! responses, the duration) is recorded once the consumer has read the body to its end.
//!
//! ```
//! use bytes::Bytes;
//! use http_metrics::{Entity, HttpMetricsRegistry, MetricSettings};
//! use http_body_util::Empty;
//! use hyper::{Request, Response};
//!
//! let settings = MetricSettings::default().with_method_dimension(true);
//! let registry = HttpMetricsRegistry::new(settings).expect("default settings are valid");
//!
//! let request = Request::get("/").body(Entity::<Empty<Bytes>>::empty()).expect("valid request");
//! let exchange = registry.exchange(&request).with_path("/");
//! let _request = registry.on_request(request, &exchange);
//! assert_eq!(registry.requests_active().total(), 1);
//!
//! let response = Response::new(Entity::<Empty<Bytes>>::strict("hello"));
//! let _response = registry.on_response(response, &exchange);
//! assert_eq!(registry.requests_active().total(), 0);
//! assert_eq!(registry.responses().total(), 1);
//! ```
//!
//! # Reading metrics
//!
//! Every metric is reachable through an accessor on the registry, and
//! [`snapshot`][HttpMetricsRegistry::snapshot] copies all of them, under their namespaced names,
//! for an exporter to read.
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

pub mod dimensions;

mod entity;
pub use entity::Entity;

mod exchange;
pub use exchange::Exchange;

mod metered;
pub use metered::Metered;

mod registry;
pub use registry::HttpMetricsRegistry;

mod settings;
pub use settings::{MetricNames, MetricSettings, SettingsError};

pub use http_metrics_util::{
    Counter, DebugValue, Dimension, DimensionSet, Gauge, Histogram, IntoDimensions, MetricKind,
    SharedString, Snapshot, SnapshotEntry,
};
