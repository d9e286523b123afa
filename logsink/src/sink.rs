use parking_lot::Mutex;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use time::UtcOffset;

use crate::clock::{Clock, SystemClock};
use crate::console::ConsoleSink;
use crate::file::RotatingFileSink;

pub const STDOUT: &str = "STDOUT";
pub const STDERR: &str = "STDERR";

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60 * 60);

/// Terminal consumer of formatted records.
///
/// Implementations never report failures to the caller and are not
/// synchronized; callers serialize access to one instance.
pub trait Sink: Send {
    /// `timestamp` is in nanoseconds since the Unix epoch.
    fn output_log(&mut self, level: i32, timestamp: i64, formatted: &[u8]);

    /// Pushes buffered bytes to the destination without releasing it.
    fn flush(&mut self) {}

    fn close(&mut self);
}

pub type SharedSink = Arc<Mutex<Box<dyn Sink>>>;

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Destination {
    Stdout,
    Stderr,
    File(PathBuf),
}

impl Destination {
    pub fn parse(descriptor: &str) -> Destination {
        match descriptor {
            STDOUT => Destination::Stdout,
            STDERR => Destination::Stderr,
            path => Destination::File(PathBuf::from(path)),
        }
    }

    /// Same destination with file paths made absolute and free of `.` and
    /// `..`, so aliases of one file compare equal.
    pub fn normalized(self) -> Destination {
        match self {
            Destination::File(path) => Destination::File(clean_path(&path)),
            other => other,
        }
    }

    pub fn open(&self, options: &FileOptions) -> Box<dyn Sink> {
        match self {
            Destination::Stdout => Box::new(ConsoleSink::stdout()),
            Destination::Stderr => Box::new(ConsoleSink::stderr()),
            Destination::File(path) => Box::new(RotatingFileSink::open(path, options)),
        }
    }
}

fn clean_path(path: &Path) -> PathBuf {
    let path = std::path::absolute(path).unwrap_or_else(|_| path.to_owned());
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(
                    cleaned.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                ) {
                    cleaned.pop();
                }
            }
            other => cleaned.push(other),
        }
    }
    cleaned
}

#[derive(Clone)]
pub struct FileOptions {
    pub window: Duration,
    /// Calendar used for archive suffixes.
    pub offset: UtcOffset,
    pub clock: Arc<dyn Clock>,
}

impl Default for FileOptions {
    fn default() -> Self {
        FileOptions {
            window: DEFAULT_WINDOW,
            offset: UtcOffset::UTC,
            clock: Arc::new(SystemClock),
        }
    }
}

impl std::fmt::Debug for FileOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileOptions")
            .field("window", &self.window)
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

/// Picks a sink for `descriptor`. Never fails: file setup problems are
/// reported on stderr and the returned sink drops writes until a later
/// rotation manages to open the file.
pub fn open_destination(descriptor: &str, options: &FileOptions) -> Box<dyn Sink> {
    Destination::parse(descriptor).open(options)
}

pub(crate) fn shared(sink: Box<dyn Sink>) -> SharedSink {
    Arc::new(Mutex::new(sink))
}
