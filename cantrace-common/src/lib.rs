//! # Shared Record Layouts (probe ↔ userspace)
//!
//! Defines the fixed binary layouts written by the probe program into its two
//! ring buffers, the configuration global rewritten at load time, and the
//! stage-marker vocabulary the probes emit. All types use `#[repr(C)]` so the
//! layout matches the C structs on the kernel side byte for byte.
//!
//! ## Key Types
//!
//! - [`StageRecord`] - Pipeline-stage boundary event (`events_can_avtp` ring buffer)
//! - [`ArrivalRecord`] - Receive timestamp (`events_recv_ts` ring buffer)
//! - [`ProbeConfig`] - Filter configuration stored in the `CONFIG` global

#![no_std]

use core::mem::{offset_of, size_of};

// ============================================================================
// Map and Global Names
// ============================================================================

/// Ring buffer carrying [`StageRecord`]s
pub const STAGE_RING_BUF: &str = "events_can_avtp";

/// Ring buffer carrying [`ArrivalRecord`]s
pub const ARRIVAL_RING_BUF: &str = "events_recv_ts";

/// Read-only global holding the [`ProbeConfig`]
pub const CONFIG_GLOBAL: &str = "CONFIG";

/// Width of every fixed-size, NUL-padded name field
pub const NAME_LEN: usize = 32;

// ============================================================================
// Stage Markers
// ============================================================================

/// Syscall tracepoint: `read(2)` entered on the CAN socket
pub const MARKER_SYS_ENTER_READ: &str = "sys_enter_read";
/// Syscall tracepoint: `read(2)` returned
pub const MARKER_SYS_EXIT_READ: &str = "sys_exit_read";
/// Syscall tracepoint: `sendto(2)` entered on the transport socket
pub const MARKER_SYS_ENTER_SENDTO: &str = "sys_enter_sendto";
/// Syscall tracepoint: `sendto(2)` returned
pub const MARKER_SYS_EXIT_SENDTO: &str = "sys_exit_sendto";
/// Kernel module: frame handed to the ACF-CAN network device
pub const MARKER_ACFCAN_TX: &str = "acfcan_tx";
/// Kernel module: frame forwarding started (ends the read, starts the send)
pub const MARKER_ENTER_FORWARD_CAN_FRAME: &str = "enter_forward_can_frame";
/// Kernel module: frame forwarding finished
pub const MARKER_EXIT_FORWARD_CAN_FRAME: &str = "exit_forward_can_frame";
/// Talker uprobe: CAN → AVTP translation entered
pub const MARKER_CAN_TO_AVTP_ENTER: &str = "can_to_avtp_enter";
/// Talker uretprobe: CAN → AVTP translation returned
pub const MARKER_CAN_TO_AVTP_EXIT: &str = "can_to_avtp_exit";
/// Listener uprobe: AVTP → CAN translation entered
pub const MARKER_AVTP_TO_CAN_ENTER: &str = "avtp_to_can_enter";
/// Listener uretprobe: AVTP → CAN translation returned
pub const MARKER_AVTP_TO_CAN_EXIT: &str = "avtp_to_can_exit";

// ============================================================================
// Shared Data Structures
// ============================================================================

/// Pipeline-stage event sent from the probes via the `events_can_avtp` ring buffer
///
/// **Memory Layout**: `#[repr(C)]`, no implicit padding (80 bytes)
#[repr(C)]
#[derive(Clone, Copy)]
pub struct StageRecord {
    /// Timestamp in nanoseconds (from `bpf_ktime_get_ns()`)
    ///
    /// Monotonic clock, relative to system boot (not wall-clock time).
    pub timestamp: u64,

    /// Process ID (TGID) of the traced program, 0 for kernel-side probes
    pub flow_id: u32,

    /// Per-direction sequence number assigned by the probes
    ///
    /// Incremented each time a new frame enters the pipeline; every boundary
    /// event of the same frame carries the same value.
    pub owner_id: u32,

    /// Stage marker name, NUL-padded (see the `MARKER_*` constants)
    pub marker: [u8; NAME_LEN],

    /// Device name (`talker`, `listener`, `ecu1`, ...), NUL-padded
    pub device: [u8; NAME_LEN],
}

/// Receive timestamp sent via the `events_recv_ts` ring buffer
///
/// **Memory Layout**: `#[repr(C)]`, no implicit padding (40 bytes)
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ArrivalRecord {
    /// Timestamp in nanoseconds (from `bpf_ktime_get_ns()`)
    pub timestamp: u64,

    /// Device name, NUL-padded
    pub device: [u8; NAME_LEN],
}

/// Filter configuration rewritten into the probe object's `CONFIG` global
///
/// Matches the packed C struct: no padding anywhere, 29 bytes. Addresses are
/// stored in network byte order.
#[repr(C, packed)]
#[derive(Clone, Copy, Default)]
pub struct ProbeConfig {
    pub pid_talker: u32,
    pub pid_listener: u32,
    pub pid_cangen: u32,
    pub src_ip: [u8; 4],
    pub dest_ip: [u8; 4],
    pub src_port: u32,
    pub dest_port: u32,
    /// 1 when the kernel-module variant is traced, 0 for the user-space one
    pub is_kernel_space: u8,
}

// ============================================================================
// Layout Constants
// ============================================================================

/// Exact byte width of a [`StageRecord`]
pub const STAGE_RECORD_SIZE: usize = size_of::<StageRecord>();

/// Exact byte width of an [`ArrivalRecord`]
pub const ARRIVAL_RECORD_SIZE: usize = size_of::<ArrivalRecord>();

pub const STAGE_TIMESTAMP_OFFSET: usize = offset_of!(StageRecord, timestamp);
pub const STAGE_FLOW_ID_OFFSET: usize = offset_of!(StageRecord, flow_id);
pub const STAGE_OWNER_ID_OFFSET: usize = offset_of!(StageRecord, owner_id);
pub const STAGE_MARKER_OFFSET: usize = offset_of!(StageRecord, marker);
pub const STAGE_DEVICE_OFFSET: usize = offset_of!(StageRecord, device);

pub const ARRIVAL_TIMESTAMP_OFFSET: usize = offset_of!(ArrivalRecord, timestamp);
pub const ARRIVAL_DEVICE_OFFSET: usize = offset_of!(ArrivalRecord, device);

const _: () = assert!(STAGE_RECORD_SIZE == 80);
const _: () = assert!(ARRIVAL_RECORD_SIZE == 40);
const _: () = assert!(size_of::<ProbeConfig>() == 29);

// Pod impls are required for reading maps and rewriting globals from userspace
#[cfg(feature = "user")]
use aya::Pod;

#[cfg(feature = "user")]
#[allow(unsafe_code)]
unsafe impl Pod for StageRecord {}

#[cfg(feature = "user")]
#[allow(unsafe_code)]
unsafe impl Pod for ArrivalRecord {}

#[cfg(feature = "user")]
#[allow(unsafe_code)]
unsafe impl Pod for ProbeConfig {}
