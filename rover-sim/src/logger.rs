use std::{sync::OnceLock, time::Instant};

use log::{LevelFilter, Metadata, Record, SetLoggerError};

/// Writes records to stderr, stamped with seconds since startup.
struct StderrLogger {
    start: Instant,
}

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!(
                "{:>8.3} {:<5} {} - {}",
                self.start.elapsed().as_secs_f64(),
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    let logger = LOGGER.get_or_init(|| StderrLogger {
        start: Instant::now(),
    });
    log::set_logger(logger).map(|()| log::set_max_level(level))
}
