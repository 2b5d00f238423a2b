//! Application configuration.

use std::time::Duration;

use clap::Parser;
use presence_rs::SessionConfig;

/// How long to wait before re-arming after the session stops or fails to
/// start.
pub(crate) const REARM_INTERVAL: Duration = Duration::from_secs(2);

/// How often the event pump wakes up to check for shutdown.
pub(crate) const EVENT_PUMP_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Parser)]
#[command(author, version, about)]
pub(crate) struct Config {
    /// Reader to listen on, e.g. `ACS ACR122 0`. Defaults to the first
    /// reader attached.
    #[arg(long, env = "PRESENCE_READER", default_value = "")]
    pub(crate) reader: String,

    /// Milliseconds between reader polls.
    #[arg(long, env = "PRESENCE_POLL_INTERVAL_MS", default_value_t = 250)]
    pub(crate) poll_interval_ms: u64,

    /// Milliseconds to settle after a card is read or lost.
    #[arg(long, env = "PRESENCE_SETTLE_MS", default_value_t = 1500)]
    pub(crate) settle_ms: u64,

    /// Log level.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub(crate) log_level: tracing::Level,
}

impl Config {
    pub(crate) fn session_config(&self) -> SessionConfig {
        SessionConfig {
            reader_name: self.reader.clone(),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            settle_delay: Duration::from_millis(self.settle_ms),
            ..SessionConfig::default()
        }
    }
}
