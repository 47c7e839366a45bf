//! Persisted RMS snapshot record.
//!
//! Layout: `[version u8][sequence u32 LE][payload RMS_PAYLOAD_LEN bytes]`.
//! Flash I/O lives in the firmware; this module only encodes records.

use crate::config::RMS_PAYLOAD_LEN;
use crate::error::Error;
use crate::rms::MonitorVector;

const RECORD_VERSION: u8 = 1;

/// Serialized size of a [`SnapshotRecord`].
pub const SNAPSHOT_RECORD_LEN: usize = 1 + 4 + RMS_PAYLOAD_LEN;

/// One saved snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SnapshotRecord {
    /// Increases by one with every save, so the newest record wins.
    pub sequence: u32,
    pub payload: [u8; RMS_PAYLOAD_LEN],
}

impl SnapshotRecord {
    pub fn new(sequence: u32, vector: &MonitorVector) -> Self {
        Self {
            sequence,
            payload: vector.to_payload(),
        }
    }

    /// The record that follows this one.
    pub fn next(&self, vector: &MonitorVector) -> Self {
        Self::new(self.sequence.wrapping_add(1), vector)
    }

    pub fn serialize(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let out = buf
            .get_mut(..SNAPSHOT_RECORD_LEN)
            .ok_or(Error::BufferOverflow)?;
        out[0] = RECORD_VERSION;
        out[1..5].copy_from_slice(&self.sequence.to_le_bytes());
        out[5..].copy_from_slice(&self.payload);
        Ok(SNAPSHOT_RECORD_LEN)
    }

    /// Decode a record. Unknown versions and short buffers are rejected.
    pub fn deserialize(data: &[u8]) -> Option<Self> {
        if data.len() < SNAPSHOT_RECORD_LEN || data[0] != RECORD_VERSION {
            return None;
        }
        let mut seq = [0u8; 4];
        seq.copy_from_slice(&data[1..5]);
        let mut payload = [0u8; RMS_PAYLOAD_LEN];
        payload.copy_from_slice(&data[5..SNAPSHOT_RECORD_LEN]);
        Some(Self {
            sequence: u32::from_le_bytes(seq),
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CHANNELS, SUB_WINDOWS};

    fn vector() -> MonitorVector {
        let mut values = [[0u16; SUB_WINDOWS]; CHANNELS];
        values[0][0] = 0x0102;
        values[1][SUB_WINDOWS - 1] = 0xA0B0;
        MonitorVector::from_channels(values)
    }

    #[test]
    fn record_layout() {
        let rec = SnapshotRecord::new(0x0A0B0C0D, &vector());
        let mut buf = [0u8; 64];
        let len = rec.serialize(&mut buf).unwrap();
        assert_eq!(len, SNAPSHOT_RECORD_LEN);
        assert_eq!(&buf[..7], &[1, 0x0D, 0x0C, 0x0B, 0x0A, 0x02, 0x01]);
        assert_eq!(&buf[len - 2..len], &[0xB0, 0xA0]);
        assert_eq!(SnapshotRecord::deserialize(&buf[..len]), Some(rec));
    }

    #[test]
    fn short_buffer_is_an_error() {
        let rec = SnapshotRecord::new(1, &vector());
        let mut buf = [0u8; SNAPSHOT_RECORD_LEN - 1];
        assert_eq!(rec.serialize(&mut buf), Err(Error::BufferOverflow));
        assert_eq!(SnapshotRecord::deserialize(&buf), None);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut buf = [0u8; SNAPSHOT_RECORD_LEN];
        SnapshotRecord::new(5, &vector()).serialize(&mut buf).unwrap();
        buf[0] = 9;
        assert_eq!(SnapshotRecord::deserialize(&buf), None);
    }

    #[test]
    fn sequence_advances_and_wraps() {
        let first = SnapshotRecord::new(u32::MAX, &vector());
        assert_eq!(first.next(&vector()).sequence, 0);
        assert_eq!(SnapshotRecord::new(7, &vector()).next(&vector()).sequence, 8);
    }
}
