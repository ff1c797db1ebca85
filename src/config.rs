//! Configuration and limits for WebSocket connections.

use crate::draft::Draft;

/// Configuration limits for WebSocket connections.
///
/// These limits prevent resource exhaustion attacks and ensure
/// bounded memory usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum size of a single frame in bytes.
    ///
    /// Default: 16 MB (16 * 1024 * 1024)
    pub max_frame_size: usize,

    /// Maximum size of a complete message in bytes.
    ///
    /// This applies to the total size after reassembling all fragments.
    ///
    /// Default: 64 MB (64 * 1024 * 1024)
    pub max_message_size: usize,

    /// Maximum number of fragments in a single message.
    ///
    /// Peers may split a message at any byte, so the default leaves room
    /// for every fragment of a message made of one-byte frames.
    ///
    /// Default: 65536
    pub max_fragment_count: usize,

    /// Maximum size of handshake data in bytes, trailing key material included.
    ///
    /// Default: 8 KB (8192)
    pub max_handshake_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_frame_size: 16 * 1024 * 1024,   // 16 MB
            max_message_size: 64 * 1024 * 1024, // 64 MB
            max_fragment_count: 65536,
            max_handshake_size: 8192,
        }
    }
}

impl Limits {
    /// Create new limits with custom values.
    #[must_use]
    pub const fn new(
        max_frame_size: usize,
        max_message_size: usize,
        max_fragment_count: usize,
        max_handshake_size: usize,
    ) -> Self {
        Self {
            max_frame_size,
            max_message_size,
            max_fragment_count,
            max_handshake_size,
        }
    }

    /// Create limits suitable for small embedded systems.
    ///
    /// - Max frame: 64 KB
    /// - Max message: 256 KB
    /// - Max fragments: 16
    /// - Max handshake: 4 KB
    #[must_use]
    pub const fn embedded() -> Self {
        Self {
            max_frame_size: 64 * 1024,
            max_message_size: 256 * 1024,
            max_fragment_count: 16,
            max_handshake_size: 4096,
        }
    }

    /// Create limits for trusted peers.
    ///
    /// On 32-bit platforms frame and message limits are `usize::MAX`.
    #[cfg(target_pointer_width = "64")]
    #[must_use]
    pub const fn unrestricted() -> Self {
        Self {
            max_frame_size: 1024 * 1024 * 1024,       // 1 GB
            max_message_size: 4 * 1024 * 1024 * 1024, // 4 GB
            max_fragment_count: usize::MAX,
            max_handshake_size: 64 * 1024,
        }
    }

    /// Create limits for trusted peers (32-bit platforms).
    #[cfg(target_pointer_width = "32")]
    #[must_use]
    pub const fn unrestricted() -> Self {
        Self {
            max_frame_size: usize::MAX,
            max_message_size: usize::MAX,
            max_fragment_count: usize::MAX,
            max_handshake_size: 64 * 1024,
        }
    }

    /// Validate that message size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageTooLarge`](crate::Error::MessageTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_message_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_message_size {
            Err(crate::Error::MessageTooLarge {
                size,
                max: self.max_message_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that frame size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooLarge`](crate::Error::FrameTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_frame_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_frame_size {
            Err(crate::Error::FrameTooLarge {
                size,
                max: self.max_frame_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that fragment count is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TooManyFragments`](crate::Error::TooManyFragments) if `count` exceeds the configured maximum.
    pub const fn check_fragment_count(&self, count: usize) -> Result<(), crate::Error> {
        if count > self.max_fragment_count {
            Err(crate::Error::TooManyFragments {
                count,
                max: self.max_fragment_count,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that handshake size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HandshakeTooLarge`](crate::Error::HandshakeTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_handshake_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_handshake_size {
            Err(crate::Error::HandshakeTooLarge {
                size,
                max: self.max_handshake_size,
            })
        } else {
            Ok(())
        }
    }
}

/// WebSocket connection configuration.
///
/// A `Config` is a template: drafts listed here are never bound to a
/// connection directly, each connection receives fresh copies.
#[derive(Debug, Clone)]
pub struct Config {
    /// Resource limits.
    pub limits: Limits,

    /// Fragment size for outgoing messages (in bytes).
    ///
    /// Messages larger than this are split into continuation frames on drafts
    /// that support fragmentation.
    ///
    /// Default: 16 KB (16 * 1024)
    pub fragment_size: usize,

    /// Accept unmasked frames from clients (server only).
    ///
    /// Default: false
    pub accept_unmasked_frames: bool,

    /// Read buffer size used by the transport pumps (in bytes).
    ///
    /// Default: 8 KB (8192)
    pub read_buffer_size: usize,

    /// Answer `<policy-file-request/>` probes before draft negotiation.
    ///
    /// Default: true
    pub flash_policy: bool,

    /// Allowed origins for CSWSH protection (server only).
    ///
    /// If `None`, origin validation is disabled.
    /// Default: None
    pub allowed_origins: Option<Vec<String>>,

    /// Drafts a server accepts, tried in order.
    ///
    /// Default: RFC 6455, HyBi-10, Hixie-76, Hixie-75
    pub drafts: Vec<Draft>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            fragment_size: 16 * 1024,
            accept_unmasked_frames: false,
            read_buffer_size: 8192,
            flash_policy: true,
            allowed_origins: None,
            drafts: Draft::all(),
        }
    }
}

impl Config {
    /// Create a new configuration with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom limits.
    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set fragment size for outgoing messages.
    #[must_use]
    pub fn with_fragment_size(mut self, size: usize) -> Self {
        self.fragment_size = size;
        self
    }

    /// Set read buffer size.
    #[must_use]
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Accept unmasked frames from clients.
    #[must_use]
    pub fn with_accept_unmasked_frames(mut self, accept: bool) -> Self {
        self.accept_unmasked_frames = accept;
        self
    }

    /// Enable or disable flash policy probe handling.
    #[must_use]
    pub fn with_flash_policy(mut self, enabled: bool) -> Self {
        self.flash_policy = enabled;
        self
    }

    /// Set allowed origins for CSWSH protection.
    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = Some(origins);
        self
    }

    /// Replace the ordered list of drafts a server accepts.
    #[must_use]
    pub fn with_drafts(mut self, drafts: Vec<Draft>) -> Self {
        self.drafts = drafts;
        self
    }

    /// Configure for server role (every known draft, strict masking).
    #[must_use]
    pub fn server() -> Self {
        Self {
            accept_unmasked_frames: false,
            ..Default::default()
        }
    }

    /// Configure for client role (RFC 6455 only, no flash policy).
    #[must_use]
    pub fn client() -> Self {
        Self {
            flash_policy: false,
            drafts: vec![Draft::rfc6455()],
            ..Default::default()
        }
    }
}
