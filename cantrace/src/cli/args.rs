//! CLI argument definitions

use cantrace_common::ProbeConfig;
use clap::Parser;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use crate::aggregation::DEFAULT_CHANNEL_CAPACITY;
use crate::probes::ProbeTargets;

#[derive(Parser, Debug)]
#[command(
    name = "cantrace",
    about = "Measure per-stage latency of a CAN-over-AVTP bridge with eBPF",
    after_help = "\
EXAMPLES:
    sudo cantrace --talker-file ./acf-can-talker --listener-file ./acf-can-listener
    sudo cantrace --is-kernel --duration 60
    sudo cantrace --pid-talker 1234 --dest-ip 192.168.1.20 --dst-port 17220"
)]
pub struct Args {
    /// Destination IP of the AVTP stream
    #[arg(long, default_value = "127.0.0.1")]
    pub dest_ip: Ipv4Addr,

    /// Source IP of the AVTP stream
    #[arg(long, default_value = "127.0.0.1")]
    pub src_ip: Ipv4Addr,

    /// Source port (0 = any)
    #[arg(long, default_value = "0")]
    pub src_port: u32,

    /// Destination port (0 = any)
    #[arg(long, default_value = "0")]
    pub dst_port: u32,

    /// Listener process to filter on
    #[arg(long, default_value = "0")]
    pub pid_listener: u32,

    /// Talker process to filter on
    #[arg(long, default_value = "0")]
    pub pid_talker: u32,

    /// CAN frame generator process to filter on
    #[arg(long, default_value = "0")]
    pub pid_cangen: u32,

    /// Trace the kernel-module variant instead of the user-space programs
    #[arg(long)]
    pub is_kernel: bool,

    /// Talker binary to attach the CAN → AVTP uprobes to
    #[arg(long, value_name = "FILE")]
    pub talker_file: Option<PathBuf>,

    /// Listener binary to attach the AVTP → CAN uprobes to
    #[arg(long, value_name = "FILE")]
    pub listener_file: Option<PathBuf>,

    /// Compiled probe object
    #[arg(long, value_name = "FILE", default_value = "bpf.o")]
    pub object: PathBuf,

    /// Directory the reports are written to
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Stop after N seconds (0 = until Ctrl-C)
    #[arg(long, default_value = "0")]
    pub duration: u64,

    /// Log ingest statistics every N seconds (0 = never)
    #[arg(long, default_value = "10")]
    pub stats_interval: u64,

    /// Capacity of each producer channel
    #[arg(long, default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    pub channel_capacity: usize,

    /// Skip the text histograms
    #[arg(long)]
    pub no_histograms: bool,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Filter configuration written into the probe object
    #[must_use]
    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            pid_talker: self.pid_talker,
            pid_listener: self.pid_listener,
            pid_cangen: self.pid_cangen,
            src_ip: self.src_ip.octets(),
            dest_ip: self.dest_ip.octets(),
            src_port: self.src_port,
            dest_port: self.dst_port,
            is_kernel_space: u8::from(self.is_kernel),
        }
    }

    #[must_use]
    pub fn probe_targets(&self) -> ProbeTargets {
        ProbeTargets {
            is_kernel: self.is_kernel,
            talker_file: self.talker_file.clone(),
            listener_file: self.listener_file.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["cantrace"]).unwrap();
        let config = args.probe_config();
        assert_eq!({ config.src_ip }, [127, 0, 0, 1]);
        assert_eq!({ config.dest_ip }, [127, 0, 0, 1]);
        assert_eq!({ config.dest_port }, 0);
        assert_eq!(config.is_kernel_space, 0);
        assert_eq!(args.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert!(args.probe_targets().talker_file.is_none());
    }

    #[test]
    fn test_probe_config_from_flags() {
        let args = Args::try_parse_from([
            "cantrace",
            "--dest-ip",
            "192.168.1.20",
            "--dst-port",
            "17220",
            "--pid-talker",
            "1234",
            "--is-kernel",
        ])
        .unwrap();
        let config = args.probe_config();
        assert_eq!({ config.dest_ip }, [192, 168, 1, 20]);
        assert_eq!({ config.dest_port }, 17220);
        assert_eq!({ config.pid_talker }, 1234);
        assert_eq!(config.is_kernel_space, 1);
        assert!(args.probe_targets().is_kernel);
    }

    #[test]
    fn test_rejects_bad_address() {
        assert!(Args::try_parse_from(["cantrace", "--src-ip", "not-an-ip"]).is_err());
    }
}
