//! Logging utilities and structured logging support

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system
///
/// Reads `RUST_LOG` like any `env_logger` setup. Calling it twice is harmless.
pub fn init() {
    let _ = env_logger::builder().is_test(cfg!(test)).try_init();
}

/// Warn once per latch.
///
/// Returns `true` when the message was emitted; the latch stays set until the
/// owner clears it (usually at the next frame boundary).
pub fn warn_once(latch: &mut bool, message: std::fmt::Arguments<'_>) -> bool {
    if *latch {
        return false;
    }
    *latch = true;
    log::warn!("{message}");
    true
}
