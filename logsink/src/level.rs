use bytes::{BufMut, BytesMut};

pub const LEVEL_TRACE: i32 = 10;
pub const LEVEL_DEBUG: i32 = 20;
pub const LEVEL_INFO: i32 = 30;
pub const LEVEL_WARN: i32 = 40;
pub const LEVEL_ERROR: i32 = 50;
pub const LEVEL_FATAL: i32 = 60;

pub const NO_COLOR: u8 = 0;
pub const RED: u8 = 31;
pub const GREEN: u8 = 32;
pub const YELLOW: u8 = 33;
pub const PURPLE: u8 = 35;
pub const CYAN: u8 = 36;
pub const GRAY: u8 = 37;

/// Severity of a record. Any code outside the known set is `Unknown`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Unknown,
}

impl Level {
    pub const ALL: [Level; 7] = [
        Level::Trace,
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::Fatal,
        Level::Unknown,
    ];

    pub fn from_code(code: i32) -> Level {
        match code {
            LEVEL_TRACE => Level::Trace,
            LEVEL_DEBUG => Level::Debug,
            LEVEL_INFO => Level::Info,
            LEVEL_WARN => Level::Warn,
            LEVEL_ERROR => Level::Error,
            LEVEL_FATAL => Level::Fatal,
            _ => Level::Unknown,
        }
    }

    /// Numeric code passed through the sink contract. `Unknown` has none.
    pub fn code(self) -> Option<i32> {
        match self {
            Level::Trace => Some(LEVEL_TRACE),
            Level::Debug => Some(LEVEL_DEBUG),
            Level::Info => Some(LEVEL_INFO),
            Level::Warn => Some(LEVEL_WARN),
            Level::Error => Some(LEVEL_ERROR),
            Level::Fatal => Some(LEVEL_FATAL),
            Level::Unknown => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
            Level::Unknown => "UNKNOWN",
        }
    }

    /// ANSI foreground color code.
    pub fn color(self) -> u8 {
        match self {
            Level::Trace => CYAN,
            Level::Debug => GRAY,
            Level::Info => GREEN,
            Level::Warn => YELLOW,
            Level::Error => RED,
            Level::Fatal => PURPLE,
            Level::Unknown => NO_COLOR,
        }
    }
}

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Level::Error,
            log::Level::Warn => Level::Warn,
            log::Level::Info => Level::Info,
            log::Level::Debug => Level::Debug,
            log::Level::Trace => Level::Trace,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

pub fn level_name(code: i32) -> &'static str {
    Level::from_code(code).name()
}

pub fn level_color(code: i32) -> u8 {
    Level::from_code(code).color()
}

/// `ESC[<color>;1m[<NAME>]ESC[0m` followed by `msg`.
pub fn colored_prefix(code: i32, msg: &[u8]) -> BytesMut {
    let level = Level::from_code(code);
    let tag = format!("\x1b[{};1m[{}]\x1b[0m", level.color(), level.name());
    let mut buf = BytesMut::with_capacity(tag.len() + msg.len());
    buf.put(tag.as_bytes());
    buf.put(msg);
    buf
}
