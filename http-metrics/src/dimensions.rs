//! Derivation of the dimension set attached to each event.
//!
//! Every function here is pure: the dimensions of an event depend on the settings, the exchange
//! and the message alone, never on what the registry has recorded before.
use std::borrow::Cow;

use http_metrics_util::{Dimension, DimensionSet, SharedString};
use hyper::{Method, StatusCode};

use crate::{Exchange, MetricSettings};

/// Key of the method dimension.
pub const METHOD: &str = "method";

/// Key of the path dimension.
pub const PATH: &str = "path";

/// Key of the status dimension.
pub const STATUS: &str = "status";

/// Path value used when an exchange carries no path label.
pub const UNLABELLED: &str = "unlabelled";

/// Method value used when a response or failure exchange carries no method.
pub const UNKNOWN_METHOD: &str = "unknown";

/// Gets the status group of a status code: its leading digit followed by `xx`.
pub fn status_group(status: StatusCode) -> SharedString {
    match status.as_u16() / 100 {
        1 => Cow::Borrowed("1xx"),
        2 => Cow::Borrowed("2xx"),
        3 => Cow::Borrowed("3xx"),
        4 => Cow::Borrowed("4xx"),
        5 => Cow::Borrowed("5xx"),
        group => Cow::Owned(format!("{}xx", group)),
    }
}

fn method_value(method: &Method) -> SharedString {
    match *method {
        Method::GET => Cow::Borrowed("GET"),
        Method::HEAD => Cow::Borrowed("HEAD"),
        Method::POST => Cow::Borrowed("POST"),
        Method::PUT => Cow::Borrowed("PUT"),
        Method::DELETE => Cow::Borrowed("DELETE"),
        Method::CONNECT => Cow::Borrowed("CONNECT"),
        Method::OPTIONS => Cow::Borrowed("OPTIONS"),
        Method::TRACE => Cow::Borrowed("TRACE"),
        Method::PATCH => Cow::Borrowed("PATCH"),
        _ => Cow::Owned(method.as_str().to_string()),
    }
}

/// Dimensions of connection events, and of the active gauges: the server dimensions alone.
pub fn for_connection(settings: &MetricSettings) -> DimensionSet {
    DimensionSet::new(settings.server_dimensions())
}

fn exchange_dimensions(
    settings: &MetricSettings,
    exchange: &Exchange,
    fallback_method: Option<&Method>,
) -> Vec<Dimension> {
    let mut dimensions = settings.server_dimensions().to_vec();

    if settings.include_method_dimension() {
        let value = match exchange.method().or(fallback_method) {
            Some(method) => method_value(method),
            None => Cow::Borrowed(UNKNOWN_METHOD),
        };
        dimensions.push(Dimension::new(METHOD, value));
    }

    if settings.include_path_dimension() {
        let value = exchange.path().cloned().unwrap_or(Cow::Borrowed(UNLABELLED));
        dimensions.push(Dimension::new(PATH, value));
    }

    dimensions
}

/// Dimensions of a request event.
///
/// The method is taken from the exchange, or from the request itself when the exchange has
/// none.
pub fn for_request(
    settings: &MetricSettings,
    exchange: &Exchange,
    method: &Method,
) -> DimensionSet {
    DimensionSet::new(exchange_dimensions(settings, exchange, Some(method)))
}

/// Dimensions of a request that ended without a response.
pub fn for_failure(settings: &MetricSettings, exchange: &Exchange) -> DimensionSet {
    DimensionSet::new(exchange_dimensions(settings, exchange, None))
}

/// Dimensions of a response event.
pub fn for_response(
    settings: &MetricSettings,
    exchange: &Exchange,
    status: StatusCode,
) -> DimensionSet {
    let mut dimensions = exchange_dimensions(settings, exchange, None);
    if settings.include_status_dimension() {
        dimensions.push(Dimension::new(STATUS, status_group(status)));
    }
    DimensionSet::new(dimensions)
}
