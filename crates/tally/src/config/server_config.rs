use crate::config::{default_bind_address, default_port};

use serde::{Deserialize, Serialize};

/// HTTP control surface configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the control surface binds to. Loopback unless overridden.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Port for the control surface.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}
