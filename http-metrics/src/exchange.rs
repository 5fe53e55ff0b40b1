use http_metrics_util::SharedString;
use hyper::Method;
use quanta::Instant;

/// Metadata of a single request/response exchange.
///
/// An `Exchange` is created when a request arrives and travels alongside it: the same value is
/// handed to [`on_request`][crate::HttpMetricsRegistry::on_request] and later to
/// [`on_response`][crate::HttpMetricsRegistry::on_response] or
/// [`on_failure`][crate::HttpMetricsRegistry::on_failure], which is how a response learns the
/// method and arrival time of the request it answers.
///
/// Every attribute is optional.  A missing attribute never causes an error: the dimension it
/// feeds falls back to a default value, and a missing timestamp skips the duration measurement.
#[derive(Clone, Debug, Default)]
pub struct Exchange {
    method: Option<Method>,
    path: Option<SharedString>,
    timestamp: Option<Instant>,
}

impl Exchange {
    /// Creates an `Exchange` with no attributes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the request method.
    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Sets the path label.
    ///
    /// The label is opaque: it is typically the route template matched by a routing layer, such
    /// as `/users/{id}`, rather than the raw request path.
    #[must_use]
    pub fn with_path<P>(mut self, path: P) -> Self
    where
        P: Into<SharedString>,
    {
        self.path = Some(path.into());
        self
    }

    /// Sets the instant at which the request arrived.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: Instant) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Request method, if known.
    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    /// Path label, if known.
    pub fn path(&self) -> Option<&SharedString> {
        self.path.as_ref()
    }

    /// Arrival instant of the request, if known.
    pub fn timestamp(&self) -> Option<Instant> {
        self.timestamp
    }
}
