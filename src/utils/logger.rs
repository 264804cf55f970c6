use env_logger::Builder;
use log::LevelFilter;
use std::env;
use std::io::Write;

use crate::errors::prelude::*;

/// Default logger writing `level|target|file:line| message` lines to stderr.
pub struct IdmxDefaultLogger;

impl IdmxDefaultLogger {
    /// Installs the logger. The filter comes from `pattern`, falling back to `RUST_LOG`.
    ///
    /// Fails with `InvalidState` if a logger is already installed.
    pub fn init(pattern: Option<String>) -> UrsaCryptoResult<()> {
        let pattern = pattern.or_else(|| env::var("RUST_LOG").ok());

        Builder::new()
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{:>5}|{:<30}|{:>35}:{:<4}| {}",
                    record.level(),
                    record.target(),
                    record.file().unwrap_or(""),
                    record.line().unwrap_or(0),
                    record.args()
                )
            })
            .filter(None, LevelFilter::Off)
            .parse_filters(pattern.as_deref().unwrap_or(""))
            .try_init()?;

        Ok(())
    }
}

#[cfg(debug_assertions)]
#[macro_export]
macro_rules! secret {
    ($val:expr) => {{
        $val
    }};
}

#[cfg(not(debug_assertions))]
#[macro_export]
macro_rules! secret {
    ($val:expr) => {{
        "_"
    }};
}
