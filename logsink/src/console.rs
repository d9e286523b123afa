use std::io::{self, Stderr, Stdout, Write};

use crate::level::colored_prefix;
use crate::sink::Sink;

/// Writes records to a standard stream behind a colored `[LEVEL]` tag.
#[derive(Debug)]
pub struct ConsoleSink<W> {
    stream: W,
}

impl ConsoleSink<Stdout> {
    pub fn stdout() -> Self {
        ConsoleSink::new(io::stdout())
    }
}

impl ConsoleSink<Stderr> {
    pub fn stderr() -> Self {
        ConsoleSink::new(io::stderr())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(stream: W) -> Self {
        ConsoleSink { stream }
    }

    pub fn get_ref(&self) -> &W {
        &self.stream
    }
}

impl<W: Write + Send> Sink for ConsoleSink<W> {
    fn output_log(&mut self, level: i32, _timestamp: i64, formatted: &[u8]) {
        let buf = colored_prefix(level, formatted);
        let _ = self.stream.write_all(&buf);
    }

    fn flush(&mut self) {
        let _ = self.stream.flush();
    }

    // The process owns the standard streams, so they are only flushed.
    fn close(&mut self) {
        let _ = self.stream.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::{LEVEL_DEBUG, LEVEL_ERROR, LEVEL_WARN};

    #[test]
    fn error_record_gets_red_prefix() {
        let mut sink = ConsoleSink::new(Vec::new());
        sink.output_log(LEVEL_ERROR, 123, b"disk full\n");
        assert_eq!(sink.get_ref(), b"\x1b[31;1m[ERROR]\x1b[0mdisk full\n");
    }

    #[test]
    fn records_are_appended_in_order() {
        let mut sink = ConsoleSink::new(Vec::new());
        sink.output_log(LEVEL_DEBUG, 0, b"a");
        sink.output_log(LEVEL_WARN, 0, b"b");
        sink.output_log(99, 0, b"c");
        sink.close();
        assert_eq!(
            sink.get_ref(),
            b"\x1b[37;1m[DEBUG]\x1b[0ma\x1b[33;1m[WARN]\x1b[0mb\x1b[0;1m[UNKNOWN]\x1b[0mc"
        );
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[derive(Default)]
    struct Tracked {
        written: Vec<u8>,
        flushes: usize,
    }

    impl Write for Tracked {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    #[test]
    fn flush_and_close_reach_the_stream() {
        let mut sink = ConsoleSink::new(Tracked::default());
        sink.output_log(LEVEL_WARN, 0, b"w");
        sink.flush();
        assert_eq!(sink.get_ref().flushes, 1);
        sink.close();
        assert_eq!(sink.get_ref().flushes, 2);
        assert_eq!(sink.get_ref().written, b"\x1b[33;1m[WARN]\x1b[0mw");
    }

    #[test]
    fn write_errors_are_swallowed() {
        let mut sink = ConsoleSink::new(Broken);
        sink.output_log(LEVEL_ERROR, 0, b"lost");
        sink.flush();
        sink.close();
    }
}
