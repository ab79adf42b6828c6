//! # cantrace - eBPF latency tracer for CAN-over-AVTP bridges
//!
//! cantrace measures how long each stage of a CAN ↔ AVTP bridge
//! (`acf-can-talker` / `acf-can-listener`, or the `acf-can` kernel module)
//! takes to handle a frame. Probes timestamp the entry and exit of every
//! stage; this crate pairs those boundaries per flow, computes the stage
//! durations, and derives interarrival times and jitter on the receive side.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 eBPF Programs (Kernel, bpf.o)                   │
//! │  • Tracepoints: sys_{enter,exit}_{read,sendto}, recvfrom        │
//! │  • Uprobes: can_to_avtp, avtp_to_can                            │
//! │  • Kprobes: acfcan_tx, forward_can_frame, packet handler        │
//! └──────────────┬──────────────────────────────┬───────────────────┘
//!                │ events_can_avtp              │ events_recv_ts
//!                ▼                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     cantrace (This Crate)                       │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │    Probes    │──▶│    Decode    │──▶│ Aggregation  │         │
//! │  │ (ring pumps) │   │  (records)   │   │   (actor)    │         │
//! │  └──────────────┘   └──────────────┘   └──────┬───────┘         │
//! │                                               │ drain           │
//! │                     ┌──────────────┐   ┌──────▼───────┐         │
//! │                     │   Arrival    │◀──│    Report    │         │
//! │                     │  (jitter)    │   │ (csv, json)  │         │
//! │                     └──────────────┘   └──────────────┘         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`probes`]: load the probe object, attach its programs, pump ring buffers
//! - [`decode`]: fixed-width ring buffer records → typed events
//! - [`correlation`]: stage marker classification and the per-flow store
//! - [`aggregation`]: the single-writer task that owns all collected state
//! - [`arrival`]: interarrival and jitter reduction
//! - [`report`]: CSV, JSON summary, and text histograms
//! - [`cli`]: command-line arguments
//! - [`preflight`]: privilege and environment checks
//! - [`domain`]: identifier newtypes and error types
//!
//! ## Typical Usage
//!
//! ```bash
//! # Trace the user-space bridge
//! sudo ./cantrace --talker-file ./acf-can-talker --listener-file ./acf-can-listener
//!
//! # Trace the kernel module for one minute
//! sudo ./cantrace --is-kernel --duration 60
//! ```

pub mod aggregation;
pub mod arrival;
pub mod cli;
pub mod correlation;
pub mod decode;
pub mod domain;
pub mod preflight;
pub mod probes;
pub mod report;
