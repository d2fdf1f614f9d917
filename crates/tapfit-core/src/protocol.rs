//! Puck BLE wire contract
//!
//! The wearable exposes a single UART-style service with one
//! write+notify characteristic. The host writes single-byte commands;
//! the firmware pushes rep events as notifications.

use uuid::Uuid;

// ----------------------------------------------------------------------------
// Service and Characteristic UUIDs
// ----------------------------------------------------------------------------

/// Puck rep-counting service UUID
pub const PUCK_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000FFE0_0000_1000_8000_00805F9B34FB);

/// Puck command/notification characteristic UUID
pub const PUCK_CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x0000FFE1_0000_1000_8000_00805F9B34FB);

// ----------------------------------------------------------------------------
// Commands
// ----------------------------------------------------------------------------

/// Reset command written at the start of every set
pub const CMD_RESET: u8 = 0x00;

/// Op-code prefixing an absolute rep-count report
pub const OP_REP_COUNT: u8 = 0x01;

// ----------------------------------------------------------------------------
// Notifications
// ----------------------------------------------------------------------------

/// Decoded notification pushed by the Puck firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PuckNotification {
    /// One qualifying rep motion detected (G-force threshold crossed)
    Rep,
    /// Absolute rep count report, as produced by the test harness
    RepCount(u8),
}

impl PuckNotification {
    /// Decode a raw notification frame.
    ///
    /// Decoding is lenient: frames that do not match the contract yield
    /// `None` and are dropped by the caller rather than treated as errors,
    /// since firmware revisions in the field emit extra debug frames.
    pub fn decode(frame: &[u8]) -> Option<Self> {
        match frame {
            [OP_REP_COUNT] => Some(PuckNotification::Rep),
            [OP_REP_COUNT, count] => Some(PuckNotification::RepCount(*count)),
            _ => None,
        }
    }

    /// Encode this notification as a wire frame (used by the simulator)
    pub fn encode(&self) -> Vec<u8> {
        match self {
            PuckNotification::Rep => vec![OP_REP_COUNT],
            PuckNotification::RepCount(count) => vec![OP_REP_COUNT, *count],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rep_pulse() {
        assert_eq!(
            PuckNotification::decode(&[OP_REP_COUNT]),
            Some(PuckNotification::Rep)
        );
    }

    #[test]
    fn test_decode_count_report() {
        assert_eq!(
            PuckNotification::decode(&[OP_REP_COUNT, 7]),
            Some(PuckNotification::RepCount(7))
        );
    }

    #[test]
    fn test_unknown_frames_dropped() {
        assert_eq!(PuckNotification::decode(&[]), None);
        assert_eq!(PuckNotification::decode(&[0x02]), None);
        assert_eq!(PuckNotification::decode(&[CMD_RESET]), None);
        assert_eq!(PuckNotification::decode(&[OP_REP_COUNT, 3, 9]), None);
    }

    #[test]
    fn test_encode_matches_decode() {
        let frame = PuckNotification::RepCount(10).encode();
        assert_eq!(frame, vec![0x01, 10]);
        assert_eq!(
            PuckNotification::decode(&frame),
            Some(PuckNotification::RepCount(10))
        );
    }

    #[test]
    fn test_service_uuids() {
        assert_eq!(
            PUCK_SERVICE_UUID.to_string(),
            "0000ffe0-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            PUCK_CHARACTERISTIC_UUID.to_string(),
            "0000ffe1-0000-1000-8000-00805f9b34fb"
        );
    }
}
