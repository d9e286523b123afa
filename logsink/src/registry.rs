use ahash::AHashMap;

use crate::sink::{shared, Destination, FileOptions, SharedSink, Sink};

/// Owns one sink per destination.
///
/// Replaces process-wide default sinks: whoever builds the registry owns
/// the sinks and decides when they are closed. Descriptors naming the same
/// file through different spellings (`logs/app.log`, `logs/./app.log`,
/// `logs/x/../app.log`) share one sink.
#[must_use = "dropping the registry closes every sink"]
#[derive(Default)]
pub struct SinkRegistry {
    options: FileOptions,
    sinks: AHashMap<Destination, SharedSink>,
}

impl SinkRegistry {
    pub fn new(options: FileOptions) -> SinkRegistry {
        SinkRegistry {
            options,
            sinks: AHashMap::new(),
        }
    }

    pub fn get_or_open(&mut self, descriptor: &str) -> SharedSink {
        let destination = Destination::parse(descriptor).normalized();
        if let Some(sink) = self.sinks.get(&destination) {
            return sink.clone();
        }
        let sink = shared(destination.open(&self.options));
        self.sinks.insert(destination, sink.clone());
        sink
    }

    /// Puts a caller-built sink in place for `descriptor`, closing any sink
    /// it replaces.
    pub fn register(&mut self, descriptor: &str, sink: Box<dyn Sink>) -> SharedSink {
        let destination = Destination::parse(descriptor).normalized();
        let sink = shared(sink);
        if let Some(old) = self.sinks.insert(destination, sink.clone()) {
            old.lock().close();
        }
        sink
    }

    pub fn get(&self, descriptor: &str) -> Option<SharedSink> {
        let destination = Destination::parse(descriptor).normalized();
        self.sinks.get(&destination).cloned()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn flush_all(&self) {
        for sink in self.sinks.values() {
            sink.lock().flush();
        }
    }

    pub fn close_all(&mut self) {
        for (_, sink) in self.sinks.drain() {
            sink.lock().close();
        }
    }
}

impl std::fmt::Debug for SinkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkRegistry")
            .field("options", &self.options)
            .field("destinations", &self.sinks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Drop for SinkRegistry {
    fn drop(&mut self) {
        self.close_all();
    }
}
