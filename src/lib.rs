pub mod cache;
pub mod config;
pub mod display;
pub mod errors;
pub mod executor;
pub mod perception;
pub mod session;
pub mod wait;

pub use cache::LocationCache;
pub use config::{load_config, save_config, PilotConfig};
pub use errors::{PilotError, PilotResult};
pub use executor::click_engine::{
    ClickFallbackEngine, ClickMethod, ClickOptions, ClickOutcome, FallbackReason,
};
pub use session::{AutomationSession, SessionBuilder};
pub use wait::{new_cancel_flag, wait_until, CancelFlag, WaitConfig, WaitOutcome, WaitReason};

/// Installs a fmt subscriber honoring `RUST_LOG`, defaulting to `info`.
/// Call once from the embedding application; libraries that already set up
/// their own subscriber should skip this.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
