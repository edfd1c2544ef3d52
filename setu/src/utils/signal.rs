//! Signal handling for graceful shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::Result;

/// Install a Ctrl-C handler that clears the returned running flag.
///
/// # Example
/// ```ignore
/// let running = setup_ctrl_c_handler()?;
/// while running.load(Ordering::Relaxed) {
///     // ... do work ...
/// }
/// ```
pub fn setup_ctrl_c_handler() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })?;
    Ok(running)
}

#[cfg(test)]
mod tests {
    use crate::error::Error;

    #[test]
    fn test_handler_failure_is_signal_error() {
        let err = Error::from(ctrlc::Error::MultipleHandlers);
        assert!(matches!(err, Error::Signal(_)));
        assert!(err.to_string().starts_with("Signal handler error"));
    }
}
