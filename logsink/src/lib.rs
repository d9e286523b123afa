pub mod clock;
pub mod config;
pub mod console;
pub mod diagnostic;
pub mod file;
pub mod level;
pub mod logger;
pub mod registry;
pub mod sink;

pub use crate::config::Config;
pub use crate::console::ConsoleSink;
pub use crate::file::RotatingFileSink;
pub use crate::level::{level_color, level_name, Level};
pub use crate::logger::{init, Logger};
pub use crate::registry::SinkRegistry;
pub use crate::sink::{
    open_destination, Destination, FileOptions, SharedSink, Sink, STDERR, STDOUT,
};
