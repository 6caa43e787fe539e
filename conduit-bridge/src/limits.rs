//! Request size limits.
//!
//! The default limit of 4 MB matches the frame size limit used by readers.

/// Default maximum request body size (4 MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Configuration for request body size limits.
///
/// # Example
///
/// ```rust
/// use conduit_bridge::MessageLimits;
///
/// let limits = MessageLimits::default();
/// assert_eq!(limits.max_message_size(), Some(4 * 1024 * 1024));
///
/// let limits = MessageLimits::new(16 * 1024);
/// assert!(limits.check_size(16 * 1024 + 1).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageLimits {
    /// `None` means unlimited.
    max_message_size: Option<usize>,
}

impl Default for MessageLimits {
    fn default() -> Self {
        Self {
            max_message_size: Some(DEFAULT_MAX_MESSAGE_SIZE),
        }
    }
}

impl MessageLimits {
    /// Create limits with the given maximum request size in bytes.
    pub fn new(max_message_size: usize) -> Self {
        Self {
            max_message_size: Some(max_message_size),
        }
    }

    /// Create limits with no maximum.
    ///
    /// Only use this for trusted callers; request bodies are read fully into
    /// memory before decoding.
    pub fn unlimited() -> Self {
        Self {
            max_message_size: None,
        }
    }

    /// Returns the maximum request size, or `None` if unlimited.
    pub fn max_message_size(&self) -> Option<usize> {
        self.max_message_size
    }

    /// Check a size against the limit.
    pub fn check_size(&self, size: usize) -> Result<(), String> {
        match self.max_message_size {
            Some(max) if size > max => Err(format!(
                "message size {} bytes exceeds maximum allowed size of {} bytes",
                size, max
            )),
            _ => Ok(()),
        }
    }
}
