use tracing::{error, info};

/// Receives user-facing notifications raised by the data layer.
pub trait Notifier: Send + Sync {
    fn error(&self, message: &str);

    fn success(&self, message: &str) {
        let _ = message;
    }
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn error(&self, message: &str) {
        error!("{message}");
    }

    fn success(&self, message: &str) {
        info!("{message}");
    }
}
