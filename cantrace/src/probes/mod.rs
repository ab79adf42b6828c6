//! Probe management
//!
//! Everything that touches the kernel side:
//! - Loading the probe object and attaching its hooks
//! - Reading the two ring buffers and forwarding samples to the aggregator

pub mod ebpf_setup;
pub mod ring_reader;

pub use ebpf_setup::{attach_probes, init_ebpf_logger, load_probes, AttachStats, ProbeTargets};
pub use ring_reader::pump_ring_buf;
