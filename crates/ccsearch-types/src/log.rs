//! Commit log entry type.
//!
//! A log entry is one immutable row of the append-only commit log. The
//! sync pipeline only ever reads these.

use serde::{Deserialize, Serialize};

/// A single row of the commit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Monotonically increasing position in the log (gaps allowed)
    pub sequence: u64,

    /// Raw serialized document, exactly as it was signed. Not guaranteed
    /// to be UTF-8 or JSON; parsing decides.
    pub document: Vec<u8>,
}

impl LogEntry {
    /// Create a new log entry.
    pub fn new(sequence: u64, document: impl Into<Vec<u8>>) -> Self {
        Self {
            sequence,
            document: document.into(),
        }
    }

    /// Raw payload bytes used for content addressing.
    pub fn payload(&self) -> &[u8] {
        &self.document
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_entry_payload() {
        let entry = LogEntry::new(7, "{\"type\":\"message\"}");
        assert_eq!(entry.sequence, 7);
        assert_eq!(entry.payload(), b"{\"type\":\"message\"}");
    }

    #[test]
    fn test_log_entry_keeps_invalid_utf8() {
        let entry = LogEntry::new(8, vec![0xff, 0xfe, b'{']);
        assert_eq!(entry.payload(), &[0xff, 0xfe, b'{']);
    }
}
