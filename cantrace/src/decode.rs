//! # Event Decoding
//!
//! Turns raw ring buffer samples into typed events. Both record kinds have a
//! fixed width (see [`cantrace_common`]); a buffer of any other length is
//! rejected before a single field is read. Fields are read positionally in
//! native byte order, as written by the probes.

use cantrace_common::{
    ARRIVAL_DEVICE_OFFSET, ARRIVAL_RECORD_SIZE, ARRIVAL_TIMESTAMP_OFFSET, NAME_LEN,
    STAGE_DEVICE_OFFSET, STAGE_FLOW_ID_OFFSET, STAGE_MARKER_OFFSET, STAGE_OWNER_ID_OFFSET,
    STAGE_RECORD_SIZE, STAGE_TIMESTAMP_OFFSET,
};

use crate::domain::{DecodeError, FlowId, OwnerId, RecordKind};

/// A decoded pipeline-stage boundary event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineEvent {
    /// Monotonic timestamp in nanoseconds
    pub timestamp: u64,
    pub flow_id: FlowId,
    pub owner_id: OwnerId,
    /// Stage marker name with the NUL padding removed
    pub stage_marker: String,
    /// Device name with the NUL padding removed
    pub device: String,
}

/// A decoded receive timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrivalEvent {
    pub timestamp: u64,
    pub device: String,
}

/// Decode one `events_can_avtp` sample.
///
/// # Errors
/// Returns [`DecodeError::SizeMismatch`] unless `bytes` is exactly
/// [`STAGE_RECORD_SIZE`] long.
pub fn decode_pipeline_event(bytes: &[u8]) -> Result<PipelineEvent, DecodeError> {
    ensure_len(bytes, STAGE_RECORD_SIZE, RecordKind::Stage)?;

    Ok(PipelineEvent {
        timestamp: read_u64(bytes, STAGE_TIMESTAMP_OFFSET),
        flow_id: FlowId(read_u32(bytes, STAGE_FLOW_ID_OFFSET)),
        owner_id: OwnerId(read_u32(bytes, STAGE_OWNER_ID_OFFSET)),
        stage_marker: read_name(bytes, STAGE_MARKER_OFFSET),
        device: read_name(bytes, STAGE_DEVICE_OFFSET),
    })
}

/// Decode one `events_recv_ts` sample.
///
/// # Errors
/// Returns [`DecodeError::SizeMismatch`] unless `bytes` is exactly
/// [`ARRIVAL_RECORD_SIZE`] long.
pub fn decode_arrival_event(bytes: &[u8]) -> Result<ArrivalEvent, DecodeError> {
    ensure_len(bytes, ARRIVAL_RECORD_SIZE, RecordKind::Arrival)?;

    Ok(ArrivalEvent {
        timestamp: read_u64(bytes, ARRIVAL_TIMESTAMP_OFFSET),
        device: read_name(bytes, ARRIVAL_DEVICE_OFFSET),
    })
}

fn ensure_len(bytes: &[u8], expected: usize, record: RecordKind) -> Result<(), DecodeError> {
    if bytes.len() == expected {
        Ok(())
    } else {
        Err(DecodeError::SizeMismatch { record, expected, actual: bytes.len() })
    }
}

// ---------------------------------------------------------------------------
// Fixed-offset readers. Callers check the total length first, so every
// offset + width below is in bounds.
// ---------------------------------------------------------------------------

fn read_fixed<const N: usize>(bytes: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[offset..offset + N]);
    out
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_ne_bytes(read_fixed::<4>(bytes, offset))
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    u64::from_ne_bytes(read_fixed::<8>(bytes, offset))
}

/// Read a NUL-padded name field, stopping at the first NUL.
fn read_name(bytes: &[u8], offset: usize) -> String {
    let field = &bytes[offset..offset + NAME_LEN];
    let end = field.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Encode helpers shared by unit and integration tests.
///
/// Mirrors what the probes write so tests can build realistic samples.
#[doc(hidden)]
pub mod testing {
    use cantrace_common::{
        ARRIVAL_DEVICE_OFFSET, ARRIVAL_RECORD_SIZE, ARRIVAL_TIMESTAMP_OFFSET, NAME_LEN,
        STAGE_DEVICE_OFFSET, STAGE_FLOW_ID_OFFSET, STAGE_MARKER_OFFSET, STAGE_OWNER_ID_OFFSET,
        STAGE_RECORD_SIZE, STAGE_TIMESTAMP_OFFSET,
    };

    /// Build a stage sample the way `SUBMIT_EVENT` fills it.
    #[must_use]
    pub fn stage_bytes(
        timestamp: u64,
        flow_id: u32,
        owner_id: u32,
        marker: &str,
        device: &str,
    ) -> Vec<u8> {
        let mut buf = vec![0u8; STAGE_RECORD_SIZE];
        buf[STAGE_TIMESTAMP_OFFSET..STAGE_TIMESTAMP_OFFSET + 8]
            .copy_from_slice(&timestamp.to_ne_bytes());
        buf[STAGE_FLOW_ID_OFFSET..STAGE_FLOW_ID_OFFSET + 4].copy_from_slice(&flow_id.to_ne_bytes());
        buf[STAGE_OWNER_ID_OFFSET..STAGE_OWNER_ID_OFFSET + 4]
            .copy_from_slice(&owner_id.to_ne_bytes());
        write_name(&mut buf, STAGE_MARKER_OFFSET, marker);
        write_name(&mut buf, STAGE_DEVICE_OFFSET, device);
        buf
    }

    /// Build an arrival sample.
    #[must_use]
    pub fn arrival_bytes(timestamp: u64, device: &str) -> Vec<u8> {
        let mut buf = vec![0u8; ARRIVAL_RECORD_SIZE];
        buf[ARRIVAL_TIMESTAMP_OFFSET..ARRIVAL_TIMESTAMP_OFFSET + 8]
            .copy_from_slice(&timestamp.to_ne_bytes());
        write_name(&mut buf, ARRIVAL_DEVICE_OFFSET, device);
        buf
    }

    // Like the probes, keep the last byte as a terminator.
    fn write_name(buf: &mut [u8], offset: usize, name: &str) {
        let bytes = name.as_bytes();
        let len = bytes.len().min(NAME_LEN - 1);
        buf[offset..offset + len].copy_from_slice(&bytes[..len]);
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{arrival_bytes, stage_bytes};
    use super::*;

    #[test]
    fn test_decode_pipeline_event_fields() {
        let bytes = stage_bytes(1_000, 4242, 7, "sys_enter_read", "can0");
        let event = decode_pipeline_event(&bytes).unwrap();

        assert_eq!(event.timestamp, 1_000);
        assert_eq!(event.flow_id, FlowId(4242));
        assert_eq!(event.owner_id, OwnerId(7));
        assert_eq!(event.stage_marker, "sys_enter_read");
        assert_eq!(event.device, "can0");
    }

    #[test]
    fn test_decode_is_deterministic() {
        let bytes = stage_bytes(u64::MAX, u32::MAX, 1, "avtp_to_can_exit", "listener");
        assert_eq!(decode_pipeline_event(&bytes), decode_pipeline_event(&bytes));
    }

    #[test]
    fn test_decode_full_width_name_without_terminator() {
        let mut bytes = stage_bytes(1, 1, 1, "", "");
        bytes[STAGE_DEVICE_OFFSET..STAGE_DEVICE_OFFSET + NAME_LEN].fill(b'x');
        let event = decode_pipeline_event(&bytes).unwrap();
        assert_eq!(event.device.len(), NAME_LEN);
        assert_eq!(event.stage_marker, "");
    }

    #[test]
    fn test_decode_pipeline_rejects_wrong_length() {
        let mut bytes = stage_bytes(1, 1, 1, "sys_enter_read", "can0");
        bytes.push(0);
        assert_eq!(
            decode_pipeline_event(&bytes),
            Err(DecodeError::SizeMismatch {
                record: RecordKind::Stage,
                expected: STAGE_RECORD_SIZE,
                actual: STAGE_RECORD_SIZE + 1,
            })
        );
        assert!(decode_pipeline_event(&[]).is_err());
    }

    #[test]
    fn test_decode_arrival_event() {
        let event = decode_arrival_event(&arrival_bytes(99, "ecu2")).unwrap();
        assert_eq!(event, ArrivalEvent { timestamp: 99, device: "ecu2".to_string() });
    }

    #[test]
    fn test_decode_arrival_rejects_stage_sized_buffer() {
        let bytes = stage_bytes(1, 1, 1, "sys_enter_read", "can0");
        let err = decode_arrival_event(&bytes).unwrap_err();
        assert!(matches!(err, DecodeError::SizeMismatch { record: RecordKind::Arrival, .. }));
    }
}
