//! Log forwarding between workers and the coordinator.
//!
//! Each worker replaces its logging state with a single sink that serializes
//! every event onto its channel as a [`Message::Log`]. The coordinator
//! re-emits received records through its own subscriber, so level rules and
//! formatting configured in the coordinator apply uniformly no matter which
//! worker produced a record.

use std::fmt::Write as _;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::filter::LevelFilter;

use crate::ipc::LineWriter;
use crate::protocol::{LogRecord, Message};

/// Shared handle to a worker's channel writer.
///
/// The task loop and the logging sink both write to the one channel; the lock
/// is process-local and the worker is single-threaded, so it only serializes
/// interleaving, never blocks.
pub type SharedWriter<W> = Arc<Mutex<LineWriter<W>>>;

/// Write one message line through a shared writer, ignoring poisoning.
pub fn send_line<W: Write>(writer: &SharedWriter<W>, line: &str) -> std::io::Result<()> {
    let mut guard = writer.lock().unwrap_or_else(PoisonError::into_inner);
    guard.write_line(line)
}

/// A `tracing` layer that ships every event over the worker's channel.
pub struct ForwardLayer<W: Write> {
    writer: SharedWriter<W>,
}

impl<W: Write> ForwardLayer<W> {
    pub fn new(writer: SharedWriter<W>) -> Self {
        Self { writer }
    }
}

impl<S, W> Layer<S> for ForwardLayer<W>
where
    S: Subscriber,
    W: Write + Send + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut collector = FieldCollector::default();
        event.record(&mut collector);

        let record = LogRecord {
            target: event.metadata().target().to_string(),
            level: event.metadata().level().to_string(),
            message: collector.into_message(),
        };

        // A record that cannot be shipped is dropped; failing the task loop
        // over a log line would invert the priorities.
        if let Ok(line) = (Message::<()>::Log { record }).to_line() {
            let _ = send_line(&self.writer, &line);
        }
    }
}

/// Collects an event's fields into a single rendered message.
#[derive(Default)]
struct FieldCollector {
    message: String,
    fields: String,
}

impl FieldCollector {
    fn into_message(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else {
            format!("{}{}", self.message, self.fields)
        }
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

/// Install the forwarding subscriber inside a worker process.
///
/// The worker is freshly spawned, so this must be the process's one and only
/// subscriber; the level ceiling comes from the coordinator via the
/// assignment. Returns `false` when a subscriber was already installed —
/// that means the host initialized logging before `run_if_worker`, and the
/// worker's records will not reach the coordinator. The warning goes to
/// stderr, which the worker inherits, so the mis-ordering is visible.
pub fn install_in_worker<W>(writer: SharedWriter<W>, level: &str) -> bool
where
    W: Write + Send + 'static,
{
    let filter = level.parse::<LevelFilter>().unwrap_or(LevelFilter::INFO);
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(ForwardLayer::new(writer));
    match tracing::subscriber::set_global_default(subscriber) {
        Ok(()) => true,
        Err(_) => {
            eprintln!(
                "prefork worker: a logging subscriber was installed before run_if_worker; \
                 worker log records will not be forwarded"
            );
            false
        }
    }
}

/// Re-emit a forwarded record through the coordinator's subscriber.
///
/// `tracing` targets are static, so the worker-side target travels as a
/// field; filtering on it works with the usual field matchers.
pub fn emit(record: &LogRecord) {
    let level = record.level.parse::<Level>().unwrap_or(Level::INFO);
    match level {
        Level::ERROR => {
            tracing::error!(worker_target = %record.target, "{}", record.message);
        }
        Level::WARN => {
            tracing::warn!(worker_target = %record.target, "{}", record.message);
        }
        Level::INFO => {
            tracing::info!(worker_target = %record.target, "{}", record.message);
        }
        Level::DEBUG => {
            tracing::debug!(worker_target = %record.target, "{}", record.message);
        }
        Level::TRACE => {
            tracing::trace!(worker_target = %record.target, "{}", record.message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A `Write` endpoint tests can read back.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn records(&self) -> Vec<LogRecord> {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .map(|line| match Message::<()>::from_line(line).unwrap() {
                    Message::Log { record } => record,
                    other => panic!("expected Log, got {other:?}"),
                })
                .collect()
        }
    }

    fn forwarding_subscriber(buf: &SharedBuf) -> impl Subscriber + Send + Sync + 'static {
        let writer = Arc::new(Mutex::new(LineWriter::new(buf.clone())));
        tracing_subscriber::registry().with(ForwardLayer::new(writer))
    }

    #[test]
    fn test_event_becomes_log_record() {
        let buf = SharedBuf::default();
        tracing::subscriber::with_default(forwarding_subscriber(&buf), || {
            tracing::warn!(target: "x.y", "disk almost full");
        });

        let records = buf.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target, "x.y");
        assert_eq!(records[0].level, "WARN");
        assert_eq!(records[0].message, "disk almost full");
    }

    #[test]
    fn test_structured_fields_are_rendered_into_the_message() {
        let buf = SharedBuf::default();
        tracing::subscriber::with_default(forwarding_subscriber(&buf), || {
            tracing::info!(target: "pipeline.ocr", pages = 3, "rendered");
        });

        let records = buf.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, "INFO");
        assert!(records[0].message.starts_with("rendered"));
        assert!(records[0].message.contains("pages=3"));
    }

    #[test]
    fn test_install_reports_an_already_installed_subscriber() {
        // Make sure some global subscriber exists, whoever wins the race.
        let _ = tracing::subscriber::set_global_default(tracing_subscriber::registry());

        let buf = SharedBuf::default();
        let writer = Arc::new(Mutex::new(LineWriter::new(buf)));
        assert!(!install_in_worker(writer, "info"));
    }

    #[test]
    fn test_emit_tolerates_unknown_level() {
        // No subscriber installed; must not panic either way.
        emit(&LogRecord {
            target: "x".into(),
            level: "LOUD".into(),
            message: "m".into(),
        });
    }
}
