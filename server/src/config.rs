use shared::DEFAULT_PORT;

/// Runtime settings for a [`crate::network::Server`]
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Connections beyond this are refused with a `rejected` notice
    pub max_clients: usize,
    /// Tell the sender why an event was dropped instead of ignoring it silently
    pub notify_rejections: bool,
    /// Send the current `userList` to a connection right after it joins
    pub sync_on_join: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            max_clients: 64,
            notify_rejections: false,
            sync_on_join: true,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
