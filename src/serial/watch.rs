//! Device presence polling and auto-reconnect

/// What the control thread should do after a poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchAction {
    Idle,
    /// The open port is gone from the enumeration; close it
    DeviceVanished(String),
    /// The last used port is back; open it again
    Reconnect(String),
}

/// Compares the enumerated ports with the link state once per poll
#[derive(Debug, Clone, Default)]
pub struct ConnectionWatch {
    auto_reconnect: bool,
    manual_disconnect: bool,
    last_port: Option<String>,
}

impl ConnectionWatch {
    pub fn new(auto_reconnect: bool) -> Self {
        Self {
            auto_reconnect,
            ..Self::default()
        }
    }

    pub fn auto_reconnect(&self) -> bool {
        self.auto_reconnect
    }

    pub fn set_auto_reconnect(&mut self, enabled: bool) {
        self.auto_reconnect = enabled;
    }

    pub fn last_port(&self) -> Option<&str> {
        self.last_port.as_deref()
    }

    pub fn is_manually_disconnected(&self) -> bool {
        self.manual_disconnect
    }

    /// Record a successful open
    pub fn connected(&mut self, port: &str) {
        self.last_port = Some(port.to_string());
        self.manual_disconnect = false;
    }

    /// Record a user-initiated disconnect, which suppresses reconnects
    pub fn manual_disconnect(&mut self) {
        self.manual_disconnect = true;
    }

    pub fn check(&self, open_port: Option<&str>, available: &[String]) -> WatchAction {
        let present = |name: &str| available.iter().any(|p| p == name);

        if let Some(port) = open_port {
            if present(port) {
                return WatchAction::Idle;
            }
            return WatchAction::DeviceVanished(port.to_string());
        }

        if !self.auto_reconnect || self.manual_disconnect {
            return WatchAction::Idle;
        }
        match &self.last_port {
            Some(port) if present(port) => WatchAction::Reconnect(port.clone()),
            _ => WatchAction::Idle,
        }
    }
}
