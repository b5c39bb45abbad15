//! Development runtime: preview server, live reload and the change watcher.

#[cfg(feature = "server")]
pub(crate) mod http;
#[cfg(feature = "live")]
pub mod reload;
#[cfg(feature = "live")]
pub mod watch;
