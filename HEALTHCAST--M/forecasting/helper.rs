use std::{
    fmt,
    path::PathBuf,
    sync::{mpsc, Arc},
    thread,
};

use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use shared_event_bus::{EventPublisher, EventRecord};
use shared_logging::{JsonLogger, LogLevel, LogRecord};
use tokio::runtime::Builder;

use crate::forecaster::{ForecastSequence, HORIZON};

/// Telemetry builder for forecasting components.
pub struct ForecastTelemetryBuilder {
    module: String,
    log_path: Option<PathBuf>,
    min_level: LogLevel,
    event_publisher: Option<Arc<dyn EventPublisher>>,
}

impl ForecastTelemetryBuilder {
    /// Creates a new builder scoped to a module label.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            log_path: None,
            min_level: LogLevel::Debug,
            event_publisher: None,
        }
    }

    /// Sets the JSON log path.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Drops log records below `level`.
    #[must_use]
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Sets the event publisher.
    #[must_use]
    pub fn event_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.event_publisher = Some(publisher);
        self
    }

    /// Builds telemetry.
    pub fn build(self) -> Result<ForecastTelemetry> {
        let logger = match self.log_path {
            Some(path) => Some(JsonLogger::with_min_level(path, self.min_level)?),
            None => None,
        };
        let events = self
            .event_publisher
            .map(EventDispatcher::spawn)
            .transpose()?;
        Ok(ForecastTelemetry {
            inner: Arc::new(TelemetryInner {
                module: self.module,
                logger,
                events,
            }),
        })
    }
}

/// Telemetry handle shared by the forecaster, ranker, and engine.
#[derive(Clone)]
pub struct ForecastTelemetry {
    inner: Arc<TelemetryInner>,
}

impl fmt::Debug for ForecastTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForecastTelemetry")
            .field("module", &self.inner.module)
            .finish()
    }
}

struct TelemetryInner {
    module: String,
    logger: Option<JsonLogger>,
    events: Option<EventDispatcher>,
}

type Delivery = (EventRecord, mpsc::Sender<Result<()>>);

/// Dedicated thread owning the only runtime used for publishing.
///
/// Callers wait on a plain reply channel, never on a runtime. The thread
/// exits once the last telemetry handle is dropped.
struct EventDispatcher {
    queue: mpsc::Sender<Delivery>,
}

impl EventDispatcher {
    fn spawn(publisher: Arc<dyn EventPublisher>) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let (queue, deliveries) = mpsc::channel::<Delivery>();
        thread::Builder::new()
            .name("healthcast-events".into())
            .spawn(move || {
                for (record, reply) in deliveries {
                    let outcome = runtime.block_on(publisher.publish(record));
                    let _ = reply.send(outcome);
                }
            })?;
        Ok(Self { queue })
    }

    fn publish(&self, record: EventRecord) -> Result<()> {
        let (reply, outcome) = mpsc::channel();
        self.queue
            .send((record, reply))
            .map_err(|_| anyhow!("event dispatcher stopped"))?;
        outcome
            .recv()
            .map_err(|_| anyhow!("event dispatcher stopped"))?
    }
}

impl ForecastTelemetry {
    /// Returns a builder.
    #[must_use]
    pub fn builder(module: impl Into<String>) -> ForecastTelemetryBuilder {
        ForecastTelemetryBuilder::new(module)
    }

    /// Module label stamped on records.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.inner.module
    }

    /// Writes a structured log line.
    pub fn log(&self, level: LogLevel, message: &str, metadata: Value) -> Result<()> {
        if let Some(logger) = &self.inner.logger {
            let record = LogRecord::new(&self.inner.module, level, message).with_metadata(metadata);
            logger.log(&record)?;
        }
        Ok(())
    }

    /// Publishes an event and waits until the publisher has handled it.
    pub fn event(&self, event_type: &str, payload: Value) -> Result<()> {
        let Some(events) = &self.inner.events else {
            return Ok(());
        };
        events.publish(EventRecord::new(&self.inner.module, event_type, payload))
    }
}

/// Logs through optional telemetry, ignoring sink failures.
pub(crate) fn log(
    telemetry: Option<&ForecastTelemetry>,
    level: LogLevel,
    message: &str,
    metadata: Value,
) {
    if let Some(tel) = telemetry {
        let _ = tel.log(level, message, metadata);
    }
}

/// Emits through optional telemetry, ignoring sink failures.
pub(crate) fn event(telemetry: Option<&ForecastTelemetry>, event_type: &str, payload: Value) {
    if let Some(tel) = telemetry {
        let _ = tel.event(event_type, payload);
    }
}

/// Emits `forecast.completed` with its one payload shape.
pub(crate) fn forecast_completed(
    telemetry: Option<&ForecastTelemetry>,
    region: &str,
    forecast: &ForecastSequence,
) {
    event(
        telemetry,
        "forecast.completed",
        json!({
            "region": region,
            "horizon": HORIZON,
            "final_value": forecast.final_value(),
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_event_bus::{FileEventPublisher, MemoryEventBus};
    use tempfile::tempdir;

    #[test]
    fn telemetry_writes_log_and_event() {
        let tmp = tempdir().unwrap();
        let bus = Arc::new(MemoryEventBus::new(4));
        let log_path = tmp.path().join("forecast.log");
        let telemetry = ForecastTelemetry::builder("forecasting")
            .log_path(&log_path)
            .event_publisher(bus.clone())
            .build()
            .unwrap();
        telemetry
            .log(LogLevel::Info, "forecast.start", json!({ "region": "TN" }))
            .unwrap();
        telemetry
            .event("forecast.completed", json!({ "region": "TN" }))
            .unwrap();
        assert!(std::fs::read_to_string(&log_path)
            .unwrap()
            .contains("forecast.start"));
        let events = bus.snapshot();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source, "forecasting");
    }

    #[test]
    fn min_level_filters_debug_lines() {
        let tmp = tempdir().unwrap();
        let log_path = tmp.path().join("forecast.log");
        let telemetry = ForecastTelemetry::builder("forecasting")
            .log_path(&log_path)
            .min_level(LogLevel::Info)
            .build()
            .unwrap();
        telemetry
            .log(LogLevel::Debug, "forecast.step", json!({ "step": 1 }))
            .unwrap();
        telemetry
            .log(LogLevel::Info, "forecast.completed", json!({}))
            .unwrap();
        let content = std::fs::read_to_string(&log_path).unwrap();
        assert!(!content.contains("forecast.step"));
        assert!(content.contains("forecast.completed"));
    }

    #[tokio::test]
    async fn events_reach_the_file_from_inside_a_runtime() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("events.jsonl");
        let telemetry = ForecastTelemetry::builder("forecasting")
            .event_publisher(Arc::new(FileEventPublisher::new(&path).unwrap()))
            .build()
            .unwrap();
        for region in ["TN", "KA"] {
            telemetry
                .event("forecast.failed", json!({ "region": region }))
                .unwrap();
        }
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn completed_payload_has_fixed_shape() {
        let bus = Arc::new(MemoryEventBus::new(4));
        let telemetry = ForecastTelemetry::builder("forecasting")
            .event_publisher(bus.clone())
            .build()
            .unwrap();
        let forecast = ForecastSequence::new([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.5]);
        forecast_completed(Some(&telemetry), "KL", &forecast);
        let events = bus.of_type("forecast.completed");
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].payload,
            json!({ "region": "KL", "horizon": 7, "final_value": 7.5 })
        );
    }
}
