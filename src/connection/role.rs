//! Which end of the connection this endpoint is.

/// Endpoint role.
///
/// Decides masking direction and which side of the handshake is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Sends the upgrade request and masks every frame.
    Client,
    /// Answers the upgrade request and never masks.
    Server,
}

impl Role {
    /// Clients mask all frames sent to servers.
    #[inline]
    #[must_use]
    pub const fn must_mask(&self) -> bool {
        matches!(self, Role::Client)
    }

    /// Servers expect masked frames from clients.
    #[inline]
    #[must_use]
    pub const fn expects_masked(&self) -> bool {
        matches!(self, Role::Server)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Client => write!(f, "Client"),
            Role::Server => write!(f, "Server"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masking_direction() {
        assert!(Role::Client.must_mask());
        assert!(!Role::Server.must_mask());
        assert!(Role::Server.expects_masked());
        assert!(!Role::Client.expects_masked());
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::Client.to_string(), "Client");
        assert_eq!(Role::Server.to_string(), "Server");
    }
}
