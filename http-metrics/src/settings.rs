use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
};

use http_metrics_util::{Dimension, IntoDimensions};
use hyper::StatusCode;
use thiserror::Error;

use crate::dimensions::{METHOD, PATH, STATUS};

const DEFAULT_NAMESPACE: &str = "http";

type ErrorClassifier = Arc<dyn Fn(StatusCode) -> bool + Send + Sync>;

/// Errors that could occur while validating [`MetricSettings`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    /// A server dimension was configured with an empty key.
    #[error("server dimension with value '{value}' has an empty key")]
    EmptyDimensionKey {
        /// Value of the offending dimension.
        value: String,
    },

    /// Two server dimensions were configured with the same key.
    #[error("server dimension key '{key}' is configured more than once")]
    DuplicateDimensionKey {
        /// The repeated key.
        key: String,
    },

    /// A server dimension uses the key of an enabled built-in dimension.
    #[error("server dimension key '{key}' collides with an enabled built-in dimension")]
    ReservedDimensionKey {
        /// The colliding key.
        key: String,
    },

    /// A metric was configured with an empty name.
    #[error("metric '{metric}' has an empty name")]
    EmptyMetricName {
        /// Which metric was left unnamed.
        metric: &'static str,
    },

    /// Two metrics were configured with the same name.
    #[error("metrics '{first}' and '{second}' are both named '{name}'")]
    DuplicateMetricName {
        /// The shared name.
        name: String,
        /// The metric that claimed the name first.
        first: &'static str,
        /// The metric that repeated it.
        second: &'static str,
    },
}

/// Names of the metrics maintained by the registry.
///
/// Names are joined to the settings' namespace with an underscore when a snapshot is taken.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricNames {
    /// Counter of received requests.
    pub requests: String,
    /// Gauge of requests that have not yet been answered.
    pub requests_active: String,
    /// Counter of requests that ended without a response.
    pub requests_failures: String,
    /// Histogram of request body sizes, in bytes.
    pub requests_size: String,
    /// Counter of sent responses.
    pub responses: String,
    /// Counter of responses classified as errors.
    pub responses_errors: String,
    /// Histogram of response completion times, in seconds.
    pub responses_duration: String,
    /// Histogram of response body sizes, in bytes.
    pub responses_size: String,
    /// Counter of opened connections.
    pub connections: String,
    /// Gauge of currently open connections.
    pub connections_active: String,
}

impl MetricNames {
    fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("requests", self.requests.as_str()),
            ("requests_active", self.requests_active.as_str()),
            ("requests_failures", self.requests_failures.as_str()),
            ("requests_size", self.requests_size.as_str()),
            ("responses", self.responses.as_str()),
            ("responses_errors", self.responses_errors.as_str()),
            ("responses_duration", self.responses_duration.as_str()),
            ("responses_size", self.responses_size.as_str()),
            ("connections", self.connections.as_str()),
            ("connections_active", self.connections_active.as_str()),
        ]
        .into_iter()
    }
}

impl Default for MetricNames {
    fn default() -> Self {
        MetricNames {
            requests: "requests".to_string(),
            requests_active: "requests_active".to_string(),
            requests_failures: "requests_failures".to_string(),
            requests_size: "requests_size".to_string(),
            responses: "responses".to_string(),
            responses_errors: "responses_errors".to_string(),
            responses_duration: "responses_duration".to_string(),
            responses_size: "responses_size".to_string(),
            connections: "connections".to_string(),
            connections_active: "connections_active".to_string(),
        }
    }
}

/// Settings of an [`HttpMetricsRegistry`][crate::HttpMetricsRegistry].
///
/// Settings decide which optional dimensions are attached to each event, and so the shape of the
/// aggregation key of every metric.  They are fixed for the lifetime of a registry: derive a
/// modified copy with the `with_*` functions before building one.
#[derive(Clone)]
pub struct MetricSettings {
    namespace: String,
    names: MetricNames,
    include_method_dimension: bool,
    include_path_dimension: bool,
    include_status_dimension: bool,
    server_dimensions: Vec<Dimension>,
    error_classifier: ErrorClassifier,
}

impl MetricSettings {
    /// Sets the namespace prepended to every metric name.
    ///
    /// An empty namespace leaves the names untouched.
    ///
    /// Defaults to `http`.
    #[must_use]
    pub fn with_namespace<N>(mut self, namespace: N) -> Self
    where
        N: Into<String>,
    {
        self.namespace = namespace.into();
        self
    }

    /// Sets the names of the metrics.
    ///
    /// Defaults to [`MetricNames::default`].
    #[must_use]
    pub fn with_metric_names(mut self, names: MetricNames) -> Self {
        self.names = names;
        self
    }

    /// Sets whether or not request and response metrics carry a `method` dimension.
    ///
    /// Defaults to `false`.
    #[must_use]
    pub fn with_method_dimension(mut self, enabled: bool) -> Self {
        self.include_method_dimension = enabled;
        self
    }

    /// Sets whether or not request and response metrics carry a `path` dimension.
    ///
    /// The value is the path label of the exchange, as supplied by the routing layer, or
    /// `unlabelled` when the exchange has none.
    ///
    /// Defaults to `false`.
    #[must_use]
    pub fn with_path_dimension(mut self, enabled: bool) -> Self {
        self.include_path_dimension = enabled;
        self
    }

    /// Sets whether or not response metrics carry a `status` dimension.
    ///
    /// The value is the status group of the response: `2xx`, `4xx`, and so on.
    ///
    /// Defaults to `false`.
    #[must_use]
    pub fn with_status_dimension(mut self, enabled: bool) -> Self {
        self.include_status_dimension = enabled;
        self
    }

    /// Sets the server dimensions, replacing any previously configured.
    ///
    /// Server dimensions are attached to every connection, request and response metric.
    ///
    /// Defaults to none.
    #[must_use]
    pub fn with_server_dimensions<D>(mut self, dimensions: D) -> Self
    where
        D: IntoDimensions,
    {
        self.server_dimensions = dimensions.into_dimensions();
        self
    }

    /// Appends a single server dimension.
    #[must_use]
    pub fn with_server_dimension(mut self, dimension: Dimension) -> Self {
        self.server_dimensions.push(dimension);
        self
    }

    /// Sets the predicate deciding which responses count as errors.
    ///
    /// Defaults to server errors (`5xx`).
    #[must_use]
    pub fn with_error_classifier<F>(mut self, classifier: F) -> Self
    where
        F: Fn(StatusCode) -> bool + Send + Sync + 'static,
    {
        self.error_classifier = Arc::new(classifier);
        self
    }

    /// Namespace prepended to every metric name.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Names of the metrics.
    pub fn names(&self) -> &MetricNames {
        &self.names
    }

    /// Whether or not the `method` dimension is enabled.
    pub fn include_method_dimension(&self) -> bool {
        self.include_method_dimension
    }

    /// Whether or not the `path` dimension is enabled.
    pub fn include_path_dimension(&self) -> bool {
        self.include_path_dimension
    }

    /// Whether or not the `status` dimension is enabled.
    pub fn include_status_dimension(&self) -> bool {
        self.include_status_dimension
    }

    /// Configured server dimensions, in configuration order.
    pub fn server_dimensions(&self) -> &[Dimension] {
        &self.server_dimensions
    }

    /// Whether or not a response with the given status counts as an error.
    pub fn is_error(&self, status: StatusCode) -> bool {
        (self.error_classifier)(status)
    }

    /// Gets the full name of a metric: the namespace and `name` joined by an underscore.
    pub fn full_name(&self, name: &str) -> String {
        if self.namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}_{}", self.namespace, name)
        }
    }

    /// Checks these settings for configurations that would produce ambiguous dimension sets or
    /// metric names.
    ///
    /// # Errors
    ///
    /// Returns an error if a server dimension has an empty key, if two server dimensions share a
    /// key, if a server dimension uses the key of an enabled built-in dimension, if a metric name
    /// is empty, or if two metrics share a name.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let mut keys = HashSet::new();
        for dimension in &self.server_dimensions {
            let key = dimension.key();
            if key.is_empty() {
                let value = dimension.value().to_string();
                return Err(SettingsError::EmptyDimensionKey { value });
            }

            let reserved = (self.include_method_dimension && key == METHOD)
                || (self.include_path_dimension && key == PATH)
                || (self.include_status_dimension && key == STATUS);
            if reserved {
                return Err(SettingsError::ReservedDimensionKey { key: key.to_string() });
            }

            if !keys.insert(key) {
                return Err(SettingsError::DuplicateDimensionKey { key: key.to_string() });
            }
        }

        let mut names = HashMap::new();
        for (metric, name) in self.names.iter() {
            if name.is_empty() {
                return Err(SettingsError::EmptyMetricName { metric });
            }
            if let Some(first) = names.insert(name, metric) {
                let name = name.to_string();
                return Err(SettingsError::DuplicateMetricName { name, first, second: metric });
            }
        }

        Ok(())
    }
}

impl Default for MetricSettings {
    fn default() -> Self {
        MetricSettings {
            namespace: DEFAULT_NAMESPACE.to_string(),
            names: MetricNames::default(),
            include_method_dimension: false,
            include_path_dimension: false,
            include_status_dimension: false,
            server_dimensions: Vec::new(),
            error_classifier: Arc::new(|status: StatusCode| status.is_server_error()),
        }
    }
}

impl fmt::Debug for MetricSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricSettings")
            .field("namespace", &self.namespace)
            .field("names", &self.names)
            .field("include_method_dimension", &self.include_method_dimension)
            .field("include_path_dimension", &self.include_path_dimension)
            .field("include_status_dimension", &self.include_status_dimension)
            .field("server_dimensions", &self.server_dimensions)
            .finish_non_exhaustive()
    }
}
