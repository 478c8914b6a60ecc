//! `tracing` subscriber setup and the log subsystem.

use tracing_subscriber::EnvFilter;

use crate::context::Subsystem;

/// Install a formatted `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` is used, falling back
/// to `info` if it does not parse. Returns `false` if a global subscriber was
/// already installed, which makes repeated calls harmless.
pub fn init(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}

/// First subsystem in the bootstrap order, so startup and shutdown of every
/// other subsystem is logged.
#[derive(Debug)]
pub struct LogSubsystem {
    installed: bool,
}

impl LogSubsystem {
    /// Install the global subscriber with `default_filter`.
    pub fn new(default_filter: &str) -> Self {
        let installed = init(default_filter);
        tracing::debug!(installed, filter = default_filter, "logging initialised");
        Self { installed }
    }

    /// Whether this instance installed the global subscriber.
    pub fn installed_subscriber(&self) -> bool {
        self.installed
    }
}

impl Subsystem for LogSubsystem {
    fn name(&self) -> &'static str {
        "log"
    }

    fn shutdown(&mut self) {
        tracing::info!("logging shut down");
    }
}
