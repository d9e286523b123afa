use std::fmt::Display;
use std::io::{self, Write};

/// Writes one line to the process error stream. Failures are ignored.
pub fn report(what: &str, subject: impl Display, err: impl Display) {
    report_to(&mut io::stderr().lock(), what, subject, err);
}

/// `<what>: <subject>, <err>` plus a newline, then a flush.
pub fn report_to<W: Write>(out: &mut W, what: &str, subject: impl Display, err: impl Display) {
    let line = format!("{}: {}, {}\n", what, subject, err);
    let _ = out.write_all(line.as_bytes());
    let _ = out.flush();
}
