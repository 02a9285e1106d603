//! Configuration schema types for babel.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod participant;
mod service;
mod system;

pub use participant::*;
pub use service::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BabelConfig {
    pub service: ServiceConfig,
    pub participant: ParticipantConfig,
    pub timeouts: TimeoutConfig,
    pub logging: LoggingConfig,
}
