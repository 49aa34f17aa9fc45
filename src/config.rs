//! Server configuration from environment variables.

use std::net::SocketAddr;

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let port = std::env::var("UNDERCOVER_PORT")
            .ok()
            .and_then(|raw| match raw.parse() {
                Ok(port) => Some(port),
                Err(_) => {
                    tracing::warn!("ignoring invalid UNDERCOVER_PORT value {:?}", raw);
                    None
                }
            })
            .unwrap_or(4000);

        Self { port }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}
