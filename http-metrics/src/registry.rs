use std::sync::Arc;

use http_metrics_util::{Counter, DimensionSet, Gauge, Histogram, Snapshot};
use hyper::{Request, Response, Version};
use quanta::Clock;
use tracing::{debug, trace};

use crate::{dimensions, Entity, Exchange, Metered, MetricSettings, SettingsError};

struct Inner {
    settings: MetricSettings,
    server_dimensions: DimensionSet,
    clock: Clock,
    requests: Counter,
    requests_active: Gauge,
    requests_failures: Counter,
    requests_size: Histogram,
    responses: Counter,
    responses_errors: Counter,
    responses_duration: Histogram,
    responses_size: Histogram,
    connections: Counter,
    connections_active: Gauge,
}

/// A registry of HTTP metrics.
///
/// The host HTTP layer calls the `on_*` hooks as connections open and close and as requests and
/// responses pass through.  Each hook derives the dimensions of the event from the registry's
/// [`MetricSettings`] and the [`Exchange`] the message belongs to, updates the matching metrics,
/// and, for messages, hands back the same message with its body instrumented so that its size
/// (and, for responses, the time taken) is recorded once the body has been consumed.
///
/// Every metric belongs to exactly one registry: two registries built with the same settings
/// share nothing.  Cloning an `HttpMetricsRegistry` gives another handle to the same registry.
///
/// ## Metrics
///
/// | metric               | kind      | dimensions                                 |
/// |----------------------|-----------|--------------------------------------------|
/// | `requests`           | counter   | server, method, path                       |
/// | `requests_active`    | gauge     | server                                     |
/// | `requests_failures`  | counter   | server, method, path                       |
/// | `requests_size`      | histogram | server, method, path                       |
/// | `responses`          | counter   | server, method, path, status               |
/// | `responses_errors`   | counter   | server, method, path, status               |
/// | `responses_duration` | histogram | server, method, path, status               |
/// | `responses_size`     | histogram | server, method, path, status               |
/// | `connections`        | counter   | server                                     |
/// | `connections_active` | gauge     | server                                     |
///
/// Optional dimensions only appear when enabled in the settings.
#[derive(Clone)]
pub struct HttpMetricsRegistry {
    inner: Arc<Inner>,
}

impl HttpMetricsRegistry {
    /// Creates a new `HttpMetricsRegistry`.
    ///
    /// # Errors
    ///
    /// If the settings are invalid, an error is returned describing why.
    pub fn new(settings: MetricSettings) -> Result<Self, SettingsError> {
        Self::with_clock(settings, Clock::new())
    }

    /// Creates a new `HttpMetricsRegistry` which measures time with the given clock.
    ///
    /// # Errors
    ///
    /// If the settings are invalid, an error is returned describing why.
    pub fn with_clock(settings: MetricSettings, clock: Clock) -> Result<Self, SettingsError> {
        settings.validate()?;
        debug!(?settings, "creating HTTP metrics registry");

        let server_dimensions = dimensions::for_connection(&settings);
        let inner = Inner {
            settings,
            server_dimensions,
            clock,
            requests: Counter::new(),
            requests_active: Gauge::new(),
            requests_failures: Counter::new(),
            requests_size: Histogram::new(),
            responses: Counter::new(),
            responses_errors: Counter::new(),
            responses_duration: Histogram::new(),
            responses_size: Histogram::new(),
            connections: Counter::new(),
            connections_active: Gauge::new(),
        };

        Ok(HttpMetricsRegistry { inner: Arc::new(inner) })
    }

    /// Settings of this registry.
    pub fn settings(&self) -> &MetricSettings {
        &self.inner.settings
    }

    /// Clock used to timestamp exchanges and measure response durations.
    pub fn clock(&self) -> &Clock {
        &self.inner.clock
    }

    /// Creates the [`Exchange`] of a request that has just arrived.
    ///
    /// The exchange carries the method of the request and the current instant of the registry
    /// clock.  A path label can be attached afterwards with [`Exchange::with_path`].
    pub fn exchange<B>(&self, request: &Request<B>) -> Exchange {
        Exchange::new().with_method(request.method().clone()).with_timestamp(self.inner.clock.now())
    }

    /// Counter of received requests.
    pub fn requests(&self) -> &Counter {
        &self.inner.requests
    }

    /// Gauge of requests that have not yet been answered.
    pub fn requests_active(&self) -> &Gauge {
        &self.inner.requests_active
    }

    /// Counter of requests that ended without a response.
    pub fn requests_failures(&self) -> &Counter {
        &self.inner.requests_failures
    }

    /// Histogram of request body sizes, in bytes.
    pub fn requests_size(&self) -> &Histogram {
        &self.inner.requests_size
    }

    /// Counter of sent responses.
    pub fn responses(&self) -> &Counter {
        &self.inner.responses
    }

    /// Counter of responses classified as errors.
    pub fn responses_errors(&self) -> &Counter {
        &self.inner.responses_errors
    }

    /// Histogram of response completion times, in seconds.
    pub fn responses_duration(&self) -> &Histogram {
        &self.inner.responses_duration
    }

    /// Histogram of response body sizes, in bytes.
    pub fn responses_size(&self) -> &Histogram {
        &self.inner.responses_size
    }

    /// Counter of opened connections.
    pub fn connections(&self) -> &Counter {
        &self.inner.connections
    }

    /// Gauge of currently open connections.
    pub fn connections_active(&self) -> &Gauge {
        &self.inner.connections_active
    }

    /// Records the arrival of a request.
    ///
    /// `requests` and `requests_active` are updated before this returns.  The request is returned
    /// with its body instrumented: `requests_size` is recorded once the body has been consumed.
    pub fn on_request<B>(
        &self,
        request: Request<Entity<B>>,
        exchange: &Exchange,
    ) -> Request<Entity<Metered<B>>> {
        let inner = &self.inner;
        let dimensions = dimensions::for_request(&inner.settings, exchange, request.method());

        inner.requests.increment(&dimensions);
        inner.requests_active.increment(&inner.server_dimensions);

        let version = request.version();
        let (parts, entity) = request.into_parts();
        let recorder = Arc::clone(inner);
        let entity = instrument(entity, version, move |size| {
            trace!(size, %dimensions, "request body completed");
            recorder.requests_size.observe(size as f64, &dimensions);
        });

        Request::from_parts(parts, entity)
    }

    /// Records a response to a request previously passed to [`on_request`][Self::on_request].
    ///
    /// `requests_active`, `responses` and `responses_errors` are updated before this returns.
    /// The response is returned with its body instrumented: `responses_size` and
    /// `responses_duration` are recorded once the body has been consumed.  The duration runs from
    /// the timestamp of `exchange`, and is not recorded at all if the exchange has none.
    pub fn on_response<B>(
        &self,
        response: Response<Entity<B>>,
        exchange: &Exchange,
    ) -> Response<Entity<Metered<B>>> {
        let inner = &self.inner;
        inner.requests_active.decrement(&inner.server_dimensions);

        let status = response.status();
        let dimensions = dimensions::for_response(&inner.settings, exchange, status);
        inner.responses.increment(&dimensions);
        if inner.settings.is_error(status) {
            inner.responses_errors.increment(&dimensions);
        }

        let version = response.version();
        let (parts, entity) = response.into_parts();
        let recorder = Arc::clone(inner);
        let started = exchange.timestamp();
        let entity = instrument(entity, version, move |size| {
            trace!(size, %dimensions, "response body completed");
            recorder.responses_size.observe(size as f64, &dimensions);
            match started {
                Some(started) => {
                    let elapsed = recorder.clock.now().duration_since(started);
                    recorder.responses_duration.record_duration(elapsed, &dimensions);
                }
                None => {
                    debug!(%dimensions, "exchange has no timestamp, skipping response duration")
                }
            }
        });

        Response::from_parts(parts, entity)
    }

    /// Records a request that ended without a response, such as when the handler failed or the
    /// client went away before an answer was produced.
    pub fn on_failure(&self, exchange: &Exchange) {
        let inner = &self.inner;
        inner.requests_active.decrement(&inner.server_dimensions);

        let dimensions = dimensions::for_failure(&inner.settings, exchange);
        inner.requests_failures.increment(&dimensions);
    }

    /// Records a newly opened connection.
    pub fn on_connection(&self) {
        let inner = &self.inner;
        inner.connections.increment(&inner.server_dimensions);
        inner.connections_active.increment(&inner.server_dimensions);
    }

    /// Records a closed connection.
    pub fn on_disconnection(&self) {
        let inner = &self.inner;
        inner.connections_active.decrement(&inner.server_dimensions);
    }

    /// Takes a point-in-time snapshot of every metric in this registry.
    ///
    /// Metric names are prefixed with the configured namespace.  Histogram samples are copied and
    /// stay in the registry: a long-running exporter should use
    /// [`snapshot_and_clear`][Self::snapshot_and_clear] instead.
    pub fn snapshot(&self) -> Snapshot {
        self.collect(false)
    }

    /// Takes a snapshot of every metric in this registry, draining histogram samples.
    ///
    /// Counters and gauges are read as with [`snapshot`][Self::snapshot].  Histogram samples are
    /// moved into the snapshot, so each sample is reported by exactly one call and the memory held
    /// by the registry stays bounded by the traffic between two calls.
    pub fn snapshot_and_clear(&self) -> Snapshot {
        self.collect(true)
    }

    fn collect(&self, drain: bool) -> Snapshot {
        let inner = &self.inner;
        let settings = &inner.settings;
        let names = settings.names();
        let mut snapshot = Snapshot::new();

        let counters = [
            (&inner.requests, &names.requests),
            (&inner.requests_failures, &names.requests_failures),
            (&inner.responses, &names.responses),
            (&inner.responses_errors, &names.responses_errors),
            (&inner.connections, &names.connections),
        ];
        for (counter, name) in counters {
            counter.snapshot_into(&settings.full_name(name), &mut snapshot);
        }

        let gauges = [
            (&inner.requests_active, &names.requests_active),
            (&inner.connections_active, &names.connections_active),
        ];
        for (gauge, name) in gauges {
            gauge.snapshot_into(&settings.full_name(name), &mut snapshot);
        }

        let histograms = [
            (&inner.requests_size, &names.requests_size),
            (&inner.responses_duration, &names.responses_duration),
            (&inner.responses_size, &names.responses_size),
        ];
        for (histogram, name) in histograms {
            let name = settings.full_name(name);
            if drain {
                histogram.drain_into(&name, &mut snapshot);
            } else {
                histogram.snapshot_into(&name, &mut snapshot);
            }
        }

        trace!(entries = snapshot.len(), drain, "collected snapshot");
        snapshot
    }
}

/// Instruments `entity` so that `on_complete` is called exactly once with its size.
///
/// Strict entities are measured on the spot.  Streams are wrapped and measured as they are
/// consumed, except for declared-length streams on a protocol that cannot re-frame them: those are
/// left untouched and measured by their declared length.
fn instrument<B, F>(entity: Entity<B>, version: Version, on_complete: F) -> Entity<Metered<B>>
where
    F: FnOnce(u64) + Send + Sync + 'static,
{
    let reframing = entity.supports_reframing(version);
    match entity {
        Entity::Strict(data) => {
            on_complete(data.len() as u64);
            Entity::Strict(data)
        }
        Entity::Chunked(body) => Entity::Chunked(Metered::new(body, on_complete)),
        Entity::Default { content_length, body } if reframing => {
            Entity::Default { content_length, body: Metered::new(body, on_complete) }
        }
        Entity::Default { content_length, body } => {
            on_complete(content_length);
            Entity::Default { content_length, body: Metered::passthrough(body) }
        }
    }
}
