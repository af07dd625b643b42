//! Serial console logging.
//!
//! Backend for the `log` facade. Each record is formatted into a bounded
//! buffer and printed as one line on the USB serial/JTAG console. Output
//! that does not fit the buffer is dropped rather than split.

use core::fmt::Write;

use crate::config::logging::MAX_LINE_LEN;
use heapless::String;
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Logger writing to the serial console
pub struct SerialLogger;

static LOGGER: SerialLogger = SerialLogger;

/// Install the serial logger.
///
/// Must be called once during startup, before the first log line.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER).map(|()| log::set_max_level(level))
}

/// Format a log line as `<LEVEL> <message>`.
pub fn format_line(level: Level, args: core::fmt::Arguments) -> String<MAX_LINE_LEN> {
    let mut line: String<MAX_LINE_LEN> = String::new();
    // Fragments that do not fit are dropped
    let _ = write!(line, "{:<5} ", level);
    let _ = line.write_fmt(args);
    line
}

impl Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            emit(&format_line(record.level(), *record.args()));
        }
    }

    fn flush(&self) {}
}

#[cfg(feature = "embedded")]
fn emit(line: &str) {
    esp_println::println!("{}", line);
}

#[cfg(not(feature = "embedded"))]
fn emit(_line: &str) {}
