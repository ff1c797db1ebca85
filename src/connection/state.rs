//! Connection lifecycle.

/// Ready state of a connection.
///
/// `NotYetConnected -> Connecting -> Open -> Closing -> Closed`. A server
/// goes straight from `NotYetConnected` to `Open` once a draft accepts the
/// request; `Connecting` marks a client whose request is on its way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReadyState {
    /// No handshake bytes exchanged yet.
    #[default]
    NotYetConnected,
    /// Client handshake sent, waiting for the response.
    Connecting,
    /// Handshake complete, data may flow.
    Open,
    /// Close started, waiting for the transport to drain or the peer to answer.
    Closing,
    /// Terminal.
    Closed,
}

impl ReadyState {
    /// Returns `true` until the connection reaches `Closed`.
    #[must_use]
    #[inline]
    pub const fn is_active(&self) -> bool {
        !matches!(self, ReadyState::Closed)
    }

    /// Application data may only be sent while `Open`.
    #[must_use]
    #[inline]
    pub const fn can_send(&self) -> bool {
        matches!(self, ReadyState::Open)
    }

    /// Frames are decoded while `Open` and while waiting for a close echo.
    #[must_use]
    #[inline]
    pub const fn can_receive(&self) -> bool {
        matches!(self, ReadyState::Open | ReadyState::Closing)
    }

    /// The handshake has not finished yet.
    #[must_use]
    #[inline]
    pub const fn is_handshaking(&self) -> bool {
        matches!(self, ReadyState::NotYetConnected | ReadyState::Connecting)
    }
}

impl std::fmt::Display for ReadyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadyState::NotYetConnected => write!(f, "NotYetConnected"),
            ReadyState::Connecting => write!(f, "Connecting"),
            ReadyState::Open => write!(f, "Open"),
            ReadyState::Closing => write!(f, "Closing"),
            ReadyState::Closed => write!(f, "Closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        assert_eq!(ReadyState::default(), ReadyState::NotYetConnected);
    }

    #[test]
    fn test_can_send_in_each_state() {
        assert!(!ReadyState::NotYetConnected.can_send());
        assert!(!ReadyState::Connecting.can_send());
        assert!(ReadyState::Open.can_send());
        assert!(!ReadyState::Closing.can_send());
        assert!(!ReadyState::Closed.can_send());
    }

    #[test]
    fn test_can_receive_in_each_state() {
        assert!(!ReadyState::Connecting.can_receive());
        assert!(ReadyState::Open.can_receive());
        assert!(ReadyState::Closing.can_receive());
        assert!(!ReadyState::Closed.can_receive());
    }

    #[test]
    fn test_handshaking_and_active() {
        assert!(ReadyState::NotYetConnected.is_handshaking());
        assert!(ReadyState::Connecting.is_handshaking());
        assert!(!ReadyState::Open.is_handshaking());
        assert!(ReadyState::Closing.is_active());
        assert!(!ReadyState::Closed.is_active());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ReadyState::NotYetConnected.to_string(), "NotYetConnected");
        assert_eq!(ReadyState::Closing.to_string(), "Closing");
    }
}
