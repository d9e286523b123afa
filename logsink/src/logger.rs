use ahash::AHashMap;
use anyhow::Result;
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use env_logger::Builder;
use log::kv::{Error, Key, Value, VisitSource};
use log::{Metadata, Record};
use std::sync::Arc;

use crate::config::Config;
use crate::level::Level;
use crate::registry::SinkRegistry;
use crate::sink::{FileOptions, SharedSink};

const FILTER_ENV: &str = "RUST_LOG";

/// Installs a [`Logger`] built from `config` as the `log` backend.
///
/// The returned registry owns every sink the logger writes to; keep it
/// alive for as long as logging is wanted and call
/// [`SinkRegistry::close_all`] on shutdown. Dropping it closes the sinks
/// and later records are discarded.
#[must_use = "dropping the registry closes every sink"]
pub fn init(config: Config) -> Result<SinkRegistry> {
    let options = FileOptions {
        window: config.window,
        offset: config.offset,
        ..FileOptions::default()
    };
    let mut registry = SinkRegistry::new(options);
    let filter = Builder::from_env(FILTER_ENV).build();
    let logger = Logger::new(filter, &config, &mut registry);
    log::set_max_level(logger.filter.filter());
    log::set_boxed_logger(Box::new(logger))?;
    Ok(registry)
}

/// `log` backend that formats records and hands them to a sink chosen by
/// target.
pub struct Logger {
    filter: env_logger::Logger,
    format: LineFormat,
    default: SharedSink,
    routes: AHashMap<String, SharedSink>,
}

impl Logger {
    pub fn new(
        filter: env_logger::Logger,
        config: &Config,
        registry: &mut SinkRegistry,
    ) -> Logger {
        let default = registry.get_or_open(&config.output);
        let routes = config
            .routes
            .iter()
            .map(|(target, descriptor)| (target.clone(), registry.get_or_open(descriptor)))
            .collect();
        let offset = if config.use_local_time {
            FixedOffset::east_opt(config.offset.whole_seconds())
        } else {
            None
        };
        Logger {
            filter,
            format: LineFormat { offset },
            default,
            routes,
        }
    }

    fn sink_for(&self, target: &str) -> &SharedSink {
        self.routes.get(target).unwrap_or(&self.default)
    }

    /// Every distinct sink this logger writes to.
    fn sinks(&self) -> Vec<&SharedSink> {
        let mut sinks = vec![&self.default];
        for sink in self.routes.values() {
            if !sinks.iter().any(|s| Arc::ptr_eq(s, sink)) {
                sinks.push(sink);
            }
        }
        sinks
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.filter.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if !self.filter.matches(record) {
            return;
        }
        let now = Utc::now();
        let line = self.format.format(record, &now);
        let level = Level::from(record.level()).code().unwrap_or_default();
        let timestamp = now.timestamp_nanos_opt().unwrap_or(i64::MAX);
        self.sink_for(record.target())
            .lock()
            .output_log(level, timestamp, line.as_bytes());
    }

    fn flush(&self) {
        for sink in self.sinks() {
            sink.lock().flush();
        }
    }
}

/// One LTSV line per record, or one JSON object with the `jsonl` feature.
#[derive(Clone, Copy, Debug, Default)]
pub struct LineFormat {
    /// `None` renders times in UTC.
    pub offset: Option<FixedOffset>,
}

impl LineFormat {
    pub fn format(&self, record: &Record, now: &DateTime<Utc>) -> String {
        let time = match self.offset {
            Some(offset) => now
                .with_timezone(&offset)
                .to_rfc3339_opts(SecondsFormat::Millis, false),
            None => now.to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        let mut visitor = KvBuf::default();
        let _ = record.key_values().visit(&mut visitor);
        let msg = record.args().to_string();
        #[cfg(not(feature = "jsonl"))]
        let line = if msg.is_empty() {
            format!(
                "time:{}\tlevel:{}\ttarget:{}{}\n",
                time,
                record.level(),
                record.target(),
                visitor.0,
            )
        } else {
            format!(
                "time:{}\tlevel:{}\ttarget:{}{}\tmsg:{}\n",
                time,
                record.level(),
                record.target(),
                visitor.0,
                msg,
            )
        };
        #[cfg(feature = "jsonl")]
        let line = if msg.is_empty() {
            format!(
                "{{\"time\":{:?}, \"level\":{:?}, \"target\":{:?}{}}}\n",
                time,
                record.level().as_str(),
                record.target(),
                visitor.0,
            )
        } else {
            format!(
                "{{\"time\":{:?}, \"level\":{:?}, \"target\":{:?}{}, \"msg\":{:?}}}\n",
                time,
                record.level().as_str(),
                record.target(),
                visitor.0,
                msg,
            )
        };
        line
    }
}

#[derive(Default)]
struct KvBuf(String);

impl<'kvs> VisitSource<'kvs> for KvBuf {
    fn visit_pair(&mut self, key: Key<'kvs>, value: Value<'kvs>) -> Result<(), Error> {
        let value = serde_json::to_string(&value).unwrap_or_default();
        #[cfg(not(feature = "jsonl"))]
        self.0.push_str(&format!("\t{}:{}", key, value));
        #[cfg(feature = "jsonl")]
        self.0.push_str(&format!(", {:?}:{}", key.as_str(), value));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{Sink, STDERR, STDOUT};
    use chrono::TimeZone;
    use log::{Level as LogLevel, Log};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flushes(Arc<AtomicUsize>);

    impl Sink for Flushes {
        fn output_log(&mut self, _level: i32, _timestamp: i64, _formatted: &[u8]) {}

        fn flush(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        fn close(&mut self) {}
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    #[cfg(not(feature = "jsonl"))]
    #[test]
    fn ltsv_line() {
        let kvs = [("user", 42)];
        let record = Record::builder()
            .level(LogLevel::Warn)
            .target("app::db")
            .args(format_args!("slow query"))
            .key_values(&kvs)
            .build();
        let line = LineFormat::default().format(&record, &at());
        assert_eq!(
            line,
            "time:2024-05-01T10:00:00.000Z\tlevel:WARN\ttarget:app::db\tuser:42\tmsg:slow query\n"
        );
    }

    #[cfg(not(feature = "jsonl"))]
    #[test]
    fn empty_message_is_omitted_and_offset_applied() {
        let record = Record::builder()
            .level(LogLevel::Info)
            .target("app")
            .args(format_args!(""))
            .build();
        let format = LineFormat {
            offset: FixedOffset::east_opt(9 * 3600),
        };
        assert_eq!(
            format.format(&record, &at()),
            "time:2024-05-01T19:00:00.000+09:00\tlevel:INFO\ttarget:app\n"
        );
    }

    #[cfg(feature = "jsonl")]
    #[test]
    fn jsonl_line() {
        let record = Record::builder()
            .level(LogLevel::Error)
            .target("app")
            .args(format_args!("boom"))
            .build();
        let line = LineFormat::default().format(&record, &at());
        assert_eq!(
            line,
            "{\"time\":\"2024-05-01T10:00:00.000Z\", \"level\":\"ERROR\", \"target\":\"app\", \"msg\":\"boom\"}\n"
        );
    }

    #[test]
    fn routes_records_by_target() {
        let dir = tempfile::tempdir().unwrap();
        let default_path = dir.path().join("app.log");
        let audit_path = dir.path().join("audit.log");
        let config = Config {
            output: default_path.to_str().unwrap().to_owned(),
            routes: vec![("audit".to_owned(), audit_path.to_str().unwrap().to_owned())],
            ..Config::default()
        };
        let mut registry = SinkRegistry::default();
        let filter = Builder::new().parse_filters("info").build();
        let logger = Logger::new(filter, &config, &mut registry);

        logger.log(
            &Record::builder()
                .level(LogLevel::Info)
                .target("audit")
                .args(format_args!("login"))
                .build(),
        );
        logger.log(
            &Record::builder()
                .level(LogLevel::Error)
                .target("app")
                .args(format_args!("failure"))
                .build(),
        );
        logger.log(
            &Record::builder()
                .level(LogLevel::Debug)
                .target("app")
                .args(format_args!("filtered"))
                .build(),
        );
        registry.close_all();

        let audit = std::fs::read_to_string(&audit_path).unwrap();
        let app = std::fs::read_to_string(&default_path).unwrap();
        assert_eq!(audit.lines().count(), 1);
        assert!(audit.contains("login"));
        assert_eq!(app.lines().count(), 1);
        assert!(app.contains("level:ERROR") || app.contains("\"ERROR\""));
        assert!(!app.contains("filtered"));
    }

    #[test]
    fn routes_sharing_a_destination_share_a_sink() {
        let config = Config {
            output: STDERR.to_owned(),
            routes: vec![("audit".to_owned(), STDERR.to_owned())],
            ..Config::default()
        };
        let mut registry = SinkRegistry::default();
        let filter = Builder::new().parse_filters("off").build();
        let logger = Logger::new(filter, &config, &mut registry);
        assert_eq!(registry.len(), 1);
        assert!(std::sync::Arc::ptr_eq(
            logger.sink_for("audit"),
            logger.sink_for("other")
        ));
        assert!(!logger.enabled(&Metadata::builder().level(LogLevel::Error).build()));
    }

    #[test]
    fn flush_reaches_each_sink_once() {
        let out = Arc::new(AtomicUsize::new(0));
        let err = Arc::new(AtomicUsize::new(0));
        let mut registry = SinkRegistry::default();
        registry.register(STDOUT, Box::new(Flushes(out.clone())));
        registry.register(STDERR, Box::new(Flushes(err.clone())));
        let config = Config {
            output: STDOUT.to_owned(),
            routes: vec![
                ("audit".to_owned(), STDERR.to_owned()),
                ("access".to_owned(), STDERR.to_owned()),
                ("app".to_owned(), STDOUT.to_owned()),
            ],
            ..Config::default()
        };
        let logger = Logger::new(Builder::new().build(), &config, &mut registry);
        logger.flush();
        assert_eq!(out.load(Ordering::SeqCst), 1);
        assert_eq!(err.load(Ordering::SeqCst), 1);
    }

    // Only this test installs the global logger.
    #[test]
    fn init_logs_until_the_registry_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("init.log");
        let config = Config {
            output: path.to_str().unwrap().to_owned(),
            ..Config::default()
        };
        let registry = init(config).unwrap();
        log::error!(target: "init", "kept while the registry lives");
        log::logger().flush();
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .contains("kept while the registry lives"));

        drop(registry);
        log::error!(target: "init", "discarded after drop");
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("kept while the registry lives"));
        assert!(!contents.contains("discarded after drop"));
    }
}
