//! Health probes for external dependencies.
//!
//! Each [`probe::Probe`] answers "is this dependency usable right now?" as a
//! [`probe::ProbeResult`]. Two probes ship with the crate: a signed HTTP API
//! check and a long-lived connection check. The runner modules schedule them,
//! keep recent reports and serve those over HTTP.

pub mod api;
pub mod config;
pub mod deadline;
pub mod error;
pub mod history;
pub mod probe;
pub mod registry;
pub mod scheduler;
pub mod signer;

pub use config::Config;
pub use error::{ConfigError, ProbeError};
pub use probe::{CheckContext, HealthStatus, Probe, ProbeResult};
