//! Connection state shared by publishers and subscribers.

use std::fmt;
use std::time::Duration;

/// Connectivity of a long-lived link to the transport channel or the
/// fan-out hub.
///
/// Owners publish every transition as a discrete event; listeners never
/// mutate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Waiting `delay` before the next connection attempt.
    BackingOff { delay: Duration },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Returns a short label for display.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::BackingOff { .. } => "backing-off",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::BackingOff { delay } => {
                write!(f, "{} ({}ms)", self.label(), delay.as_millis())
            }
            _ => f.write_str(self.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_disconnected() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert!(!ConnectionState::default().is_connected());
    }

    #[test]
    fn backing_off_displays_its_delay() {
        let state = ConnectionState::BackingOff {
            delay: Duration::from_millis(2000),
        };
        assert_eq!(state.to_string(), "backing-off (2000ms)");
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
    }
}
