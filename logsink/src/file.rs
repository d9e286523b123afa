use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use crate::clock::Clock;
use crate::diagnostic::report;
use crate::sink::{FileOptions, Sink};

/// Appends records to one path and archives it once per window.
///
/// Rotation is checked only when a record arrives. A record whose
/// timestamp is past `rotate_after` closes the active file, renames it to
/// `<path>.<YYYYMMDDHHmm>` (the minute it was opened) and reopens `path`.
/// The next boundary is taken from the clock, not from the record, so a
/// burst of stale timestamps cannot cause a rotation storm and an idle
/// sink rotates once no matter how many windows it skipped.
pub struct RotatingFileSink {
    path: PathBuf,
    window: i64,
    rotate_after: i64,
    archive_to: PathBuf,
    file: Option<File>,
    offset: UtcOffset,
    clock: Arc<dyn Clock>,
    closed: bool,
}

impl RotatingFileSink {
    pub fn open(path: impl Into<PathBuf>, options: &FileOptions) -> RotatingFileSink {
        let path = path.into();
        let window = i64::try_from(options.window.as_nanos())
            .unwrap_or(i64::MAX)
            .max(1);
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            if let Err(err) = create_dir_all(dir) {
                report("failed to create dir for log file", dir.display(), err);
            }
        }
        let mut sink = RotatingFileSink {
            path,
            window,
            rotate_after: 0,
            archive_to: PathBuf::new(),
            file: None,
            offset: options.offset,
            clock: options.clock.clone(),
            closed: false,
        };
        sink.open_file();
        sink.rotate_after = next_boundary(sink.clock.now_nanos(), window);
        sink
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// End of the current window, in nanoseconds since the epoch.
    pub fn rotate_after(&self) -> i64 {
        self.rotate_after
    }

    /// Where the active file goes at the next rotation.
    pub fn archive_path(&self) -> &Path {
        &self.archive_to
    }

    /// Whether a file handle is open and writes are being kept.
    pub fn is_available(&self) -> bool {
        self.file.is_some()
    }

    fn open_file(&mut self) {
        match open_append(&self.path) {
            Ok(file) => self.file = Some(file),
            Err(err) => {
                self.file = None;
                report("failed to open log file", self.path.display(), err);
            }
        }
        self.archive_to = archive_path(&self.path, self.clock.now(), self.offset);
    }

    fn archive(&mut self) {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush();
        }
        let target = free_path(&self.archive_to);
        if let Err(err) = fs::rename(&self.path, &target) {
            report("failed to rename to archived log file", target.display(), err);
        }
    }

    fn rotate(&mut self) {
        self.rotate_after = next_boundary(self.clock.now_nanos(), self.window);
        self.archive();
        self.open_file();
    }
}

impl Sink for RotatingFileSink {
    fn output_log(&mut self, _level: i32, timestamp: i64, formatted: &[u8]) {
        if self.closed {
            return;
        }
        if timestamp > self.rotate_after {
            self.rotate();
        }
        if let Some(file) = self.file.as_mut() {
            let _ = file.write_all(formatted);
        }
    }

    fn flush(&mut self) {
        if let Some(file) = self.file.as_mut() {
            let _ = file.flush();
        }
    }

    fn close(&mut self) {
        self.closed = true;
        if let Some(mut file) = self.file.take() {
            let _ = file.flush();
        }
    }
}

impl std::fmt::Debug for RotatingFileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatingFileSink")
            .field("path", &self.path)
            .field("window", &self.window)
            .field("rotate_after", &self.rotate_after)
            .field("archive_to", &self.archive_to)
            .field("available", &self.file.is_some())
            .field("closed", &self.closed)
            .finish()
    }
}

/// Smallest multiple of `window` strictly greater than `now`.
pub(crate) fn next_boundary(now: i64, window: i64) -> i64 {
    now.div_euclid(window)
        .saturating_add(1)
        .saturating_mul(window)
}

pub(crate) fn archive_path(path: &Path, now: OffsetDateTime, offset: UtcOffset) -> PathBuf {
    let now = now.to_offset(offset);
    let suffix = now
        .format(format_description!("[year][month][day][hour][minute]"))
        .unwrap_or_else(|_| (now.unix_timestamp() / 60).to_string());
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// `base`, or `base.1`, `base.2`, ... whichever does not exist yet.
fn free_path(base: &Path) -> PathBuf {
    if !base.exists() {
        return base.to_owned();
    }
    let mut seq = 1u32;
    loop {
        let mut name = base.as_os_str().to_owned();
        name.push(format!(".{}", seq));
        let candidate = PathBuf::from(name);
        if !candidate.exists() {
            return candidate;
        }
        seq += 1;
    }
}

#[cfg(unix)]
fn create_dir_all(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o755).create(dir)
}

#[cfg(not(unix))]
fn create_dir_all(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

fn open_append(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.append(true).create(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }
    options.open(path)
}
