//! Ambient logging setup. The teacher logs operational events straight to
//! stderr (`eprintln!` in `MasterBus`'s stream error callback); this crate
//! upgrades that to structured `tracing` spans/events so embedding
//! applications can route pipeline diagnostics through their own
//! subscriber, while still defaulting to something useful on its own.

use tracing_subscriber::EnvFilter;

/// Install a `tracing-subscriber` `fmt` layer reading its filter from
/// `RUST_LOG` (defaulting to `info`). Safe to call more than once; only
/// the first call takes effect.
///
/// Intended for binaries embedding this crate (the demo binary calls it);
/// library code never installs a subscriber itself.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
