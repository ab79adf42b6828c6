//! # Probe Loading and Attachment
//!
//! Loads the compiled probe object and attaches its programs to kernel and
//! user-space hook points.
//!
//! ## Functions
//!
//! - [`load_probes()`] - Load the object, rewriting its `CONFIG` global
//! - [`init_ebpf_logger()`] - Forward probe-side log records to `log`
//! - [`attach_probes()`] - Attach the programs for the traced variant
//!
//! ## Attachment Points
//!
//! User-space variant (`acf-can-talker` / `acf-can-listener`):
//! - **Tracepoints**: `syscalls/sys_{enter,exit}_{read,sendto}`, `syscalls/sys_enter_recvfrom`
//! - **Uprobes**: `can_to_avtp` (talker), `avtp_to_can` (listener), entry and return
//!
//! Kernel-module variant:
//! - **Kprobes**: `acfcan_tx`, `forward_can_frame` (entry and return),
//!   `ieee1722_packet_handdler` (receive timestamps)
//!
//! A hook that fails to attach is logged and skipped; the remaining stages
//! are still measured.

use anyhow::{Context, Result};
use aya::programs::{KProbe, TracePoint, UProbe};
use aya::{Ebpf, EbpfLoader};
use aya_log::EbpfLogger;
use cantrace_common::{ProbeConfig, CONFIG_GLOBAL};
use log::{info, warn};
use std::path::{Path, PathBuf};

/// Syscall tracepoints attached in user-space mode: (program, tracepoint)
const SYSCALL_TRACEPOINTS: &[(&str, &str)] = &[
    ("tp_enter_read", "sys_enter_read"),
    ("tp_exit_read", "sys_exit_read"),
    ("tp_enter_sendto", "sys_enter_sendto"),
    ("tp_exit_sendto", "sys_exit_sendto"),
    ("tp_enter_recvfrom", "sys_enter_recvfrom"),
];

/// Kernel functions probed in kernel mode: (program, function)
const KERNEL_PROBES: &[(&str, &str)] = &[
    ("kprobe_acfcan_tx", "acfcan_tx"),
    ("kretprobe_acfcan_tx", "acfcan_tx"),
    ("kprobe_entry_forward_can_frame", "forward_can_frame"),
    ("kretprobe_exit_forward_can_frame", "forward_can_frame"),
    ("kprobe_ieee1722_packet_handdler", "ieee1722_packet_handdler"),
];

/// Talker translation hooks: (program, symbol)
const TALKER_UPROBES: &[(&str, &str)] =
    &[("uprobe_can_to_avtp", "can_to_avtp"), ("uprobe_ret_can_to_avtp", "can_to_avtp")];

/// Listener translation hooks: (program, symbol)
const LISTENER_UPROBES: &[(&str, &str)] =
    &[("uprobe_avtp_to_can", "avtp_to_can"), ("uprobe_ret_avtp_to_can", "avtp_to_can")];

/// Which variant of the bridge is traced, and where its binaries live
#[derive(Debug, Clone, Default)]
pub struct ProbeTargets {
    /// Trace the kernel module instead of the user-space programs
    pub is_kernel: bool,
    pub talker_file: Option<PathBuf>,
    pub listener_file: Option<PathBuf>,
}

/// Attachment counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttachStats {
    pub attached: u32,
    pub failed: u32,
}

impl AttachStats {
    fn record(&mut self, what: &str, result: Result<()>) {
        match result {
            Ok(()) => {
                self.attached += 1;
                info!("✓ Attached {what}");
            }
            Err(e) => {
                self.failed += 1;
                warn!("⚠️  Could not attach {what}: {e:#}");
            }
        }
    }
}

/// Load the probe object from disk with `config` written into its `CONFIG` global.
///
/// # Errors
/// Returns an error if the object cannot be read, parsed, or loaded
pub fn load_probes(object_path: &Path, config: &ProbeConfig) -> Result<Ebpf> {
    let bpf = EbpfLoader::new()
        .set_global(CONFIG_GLOBAL, config, true)
        .load_file(object_path)
        .with_context(|| format!("Failed to load probe object {}", object_path.display()))?;
    Ok(bpf)
}

/// Initialize eBPF logger
pub fn init_ebpf_logger(bpf: &mut Ebpf) {
    if let Err(e) = EbpfLogger::init(bpf) {
        warn!("Failed to initialize eBPF logger: {e}");
    }
}

/// Attach every hook for the traced variant.
///
/// Individual failures are counted in the returned stats, not propagated.
pub fn attach_probes(bpf: &mut Ebpf, targets: &ProbeTargets) -> AttachStats {
    let mut stats = AttachStats::default();

    if targets.is_kernel {
        info!("Tracing the kernel-module variant of acf-can");
        for &(program, function) in KERNEL_PROBES {
            let what = format!("{program} → {function}");
            stats.record(&what, attach_kprobe(bpf, program, function));
        }
        return stats;
    }

    info!("Tracing the user-space variant of acf-can");
    for &(program, tracepoint) in SYSCALL_TRACEPOINTS {
        let what = format!("tracepoint syscalls/{tracepoint}");
        stats.record(&what, attach_tracepoint(bpf, program, "syscalls", tracepoint));
    }

    for (binary, hooks) in
        [(&targets.talker_file, TALKER_UPROBES), (&targets.listener_file, LISTENER_UPROBES)]
    {
        let Some(binary) = binary else { continue };
        for &(program, symbol) in hooks {
            let what = format!("{program} → {}:{symbol}", binary.display());
            stats.record(&what, attach_uprobe(bpf, program, symbol, binary));
        }
    }

    stats
}

fn attach_tracepoint(bpf: &mut Ebpf, program: &str, category: &str, name: &str) -> Result<()> {
    let program: &mut TracePoint = bpf
        .program_mut(program)
        .with_context(|| format!("{program} program not found"))?
        .try_into()?;
    program.load()?;
    program.attach(category, name)?;
    Ok(())
}

fn attach_kprobe(bpf: &mut Ebpf, program: &str, function: &str) -> Result<()> {
    let program: &mut KProbe = bpf
        .program_mut(program)
        .with_context(|| format!("{program} program not found"))?
        .try_into()?;
    program.load()?;
    program.attach(function, 0)?;
    Ok(())
}

fn attach_uprobe(bpf: &mut Ebpf, program: &str, symbol: &str, binary: &Path) -> Result<()> {
    let program: &mut UProbe = bpf
        .program_mut(program)
        .with_context(|| format!("{program} program not found"))?
        .try_into()?;
    program.load()?;
    program.attach(Some(symbol), 0, binary, None)?;
    Ok(())
}
