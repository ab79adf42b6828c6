//! Stage marker classification.
//!
//! Probes tag every boundary event with a short marker name. This module maps
//! those names onto a closed set of [`StageTransition`]s once, at the
//! boundary, so the store never deals with strings.
//!
//! # Classification Strategy
//!
//! Markers are matched by substring against a fixed vocabulary, checked in a
//! fixed priority order (read, send, CAN → AVTP, AVTP → CAN; enter before
//! exit). [`classify`] returns the first hit. Some markers sit on the seam
//! between two stages (`enter_forward_can_frame` ends the read and starts
//! the send); [`classify_all`] yields every hit so both are applied.

use cantrace_common::{
    MARKER_ACFCAN_TX, MARKER_AVTP_TO_CAN_ENTER, MARKER_AVTP_TO_CAN_EXIT, MARKER_CAN_TO_AVTP_ENTER,
    MARKER_CAN_TO_AVTP_EXIT, MARKER_ENTER_FORWARD_CAN_FRAME, MARKER_EXIT_FORWARD_CAN_FRAME,
    MARKER_SYS_ENTER_READ, MARKER_SYS_ENTER_SENDTO, MARKER_SYS_EXIT_READ, MARKER_SYS_EXIT_SENDTO,
};
use serde::Serialize;
use std::fmt;

/// One timed segment of the forwarding pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Reading the frame from the CAN bus
    Read,
    /// Writing the encapsulated frame to the transport socket
    Send,
    /// CAN → AVTP translation in the talker
    CanToAvtp,
    /// AVTP → CAN translation in the listener
    AvtpToCan,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Read, Stage::Send, Stage::CanToAvtp, Stage::AvtpToCan];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Read => "read",
            Stage::Send => "send",
            Stage::CanToAvtp => "can_to_avtp",
            Stage::AvtpToCan => "avtp_to_can",
        }
    }

    /// Human-readable title used in histograms
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Stage::Read => "CAN bus reading time",
            Stage::Send => "Sending time",
            Stage::CanToAvtp => "CAN to AVTP time",
            Stage::AvtpToCan => "AVTP to CAN time",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of a stage a marker stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Enter,
    Exit,
}

/// A classified stage marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageTransition {
    ReadEnter,
    ReadExit,
    SendEnter,
    SendExit,
    CanToAvtpEnter,
    CanToAvtpExit,
    AvtpToCanEnter,
    AvtpToCanExit,
    /// Marker outside the vocabulary
    Unknown,
}

impl StageTransition {
    /// Split into stage and boundary; `None` for [`StageTransition::Unknown`].
    #[must_use]
    pub fn parts(self) -> Option<(Stage, Boundary)> {
        let parts = match self {
            StageTransition::ReadEnter => (Stage::Read, Boundary::Enter),
            StageTransition::ReadExit => (Stage::Read, Boundary::Exit),
            StageTransition::SendEnter => (Stage::Send, Boundary::Enter),
            StageTransition::SendExit => (Stage::Send, Boundary::Exit),
            StageTransition::CanToAvtpEnter => (Stage::CanToAvtp, Boundary::Enter),
            StageTransition::CanToAvtpExit => (Stage::CanToAvtp, Boundary::Exit),
            StageTransition::AvtpToCanEnter => (Stage::AvtpToCan, Boundary::Enter),
            StageTransition::AvtpToCanExit => (Stage::AvtpToCan, Boundary::Exit),
            StageTransition::Unknown => return None,
        };
        Some(parts)
    }
}

// =============================================================================
// CLASSIFICATION TABLE
// =============================================================================

/// Marker vocabulary in priority order
const VOCABULARY: &[(StageTransition, &[&str])] = &[
    (StageTransition::ReadEnter, &[MARKER_SYS_ENTER_READ, MARKER_ACFCAN_TX]),
    (StageTransition::ReadExit, &[MARKER_SYS_EXIT_READ, MARKER_ENTER_FORWARD_CAN_FRAME]),
    (StageTransition::SendEnter, &[MARKER_SYS_ENTER_SENDTO, MARKER_ENTER_FORWARD_CAN_FRAME]),
    (StageTransition::SendExit, &[MARKER_SYS_EXIT_SENDTO, MARKER_EXIT_FORWARD_CAN_FRAME]),
    (StageTransition::CanToAvtpEnter, &[MARKER_CAN_TO_AVTP_ENTER]),
    (StageTransition::CanToAvtpExit, &[MARKER_CAN_TO_AVTP_EXIT]),
    (StageTransition::AvtpToCanEnter, &[MARKER_AVTP_TO_CAN_ENTER]),
    (StageTransition::AvtpToCanExit, &[MARKER_AVTP_TO_CAN_EXIT]),
];

/// Classify a marker, first match in priority order wins.
///
/// # Examples
///
/// ```
/// use cantrace::correlation::{classify, StageTransition};
///
/// assert_eq!(classify("sys_exit_sendto"), StageTransition::SendExit);
/// assert_eq!(classify("enter_forward_can_frame"), StageTransition::ReadExit);
/// assert_eq!(classify("sched_switch"), StageTransition::Unknown);
/// ```
#[must_use]
pub fn classify(marker: &str) -> StageTransition {
    classify_all(marker).next().unwrap_or(StageTransition::Unknown)
}

/// Every transition a marker stands for, in priority order.
///
/// Yields nothing for markers outside the vocabulary.
pub fn classify_all(marker: &str) -> impl Iterator<Item = StageTransition> + '_ {
    VOCABULARY
        .iter()
        .filter(move |(_, patterns)| patterns.iter().any(|p| marker.contains(p)))
        .map(|(transition, _)| *transition)
}
