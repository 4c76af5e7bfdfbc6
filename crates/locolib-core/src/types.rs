//! Core types used throughout locolib.
//!
//! These types provide a bus-agnostic abstraction layer over the various
//! command-station protocols (LocoNet, XpressNet/Z21, etc.).

use std::fmt;
use std::str::FromStr;

/// Travel direction of a locomotive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Forward relative to the locomotive's cab orientation.
    Forward,
    /// Reverse relative to the locomotive's cab orientation.
    Reverse,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Reverse => write!(f, "reverse"),
        }
    }
}

/// Error returned when a string cannot be parsed into a [`Direction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDirectionError(String);

impl fmt::Display for ParseDirectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown direction: {}", self.0)
    }
}

impl std::error::Error for ParseDirectionError {}

impl FromStr for Direction {
    type Err = ParseDirectionError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "forward" | "fwd" => Ok(Direction::Forward),
            "reverse" | "rev" => Ok(Direction::Reverse),
            _ => Err(ParseDirectionError(s.to_string())),
        }
    }
}

/// Position of a turnout (switch/accessory) output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwitchDirection {
    /// Straight / closed route (green).
    Closed,
    /// Diverging / thrown route (red).
    Thrown,
}

impl fmt::Display for SwitchDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwitchDirection::Closed => write!(f, "closed"),
            SwitchDirection::Thrown => write!(f, "thrown"),
        }
    }
}

/// Decoder speed-step mode reported in a locomotive slot.
///
/// The "advanced" variants enable advanced consist addressing on decoders
/// that support it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpeedSteps {
    /// 14 speed steps.
    Steps14,
    /// 28 speed steps.
    Steps28,
    /// 128 speed steps.
    Steps128,
    /// 28 speed steps with advanced consisting.
    Steps28Advanced,
    /// 128 speed steps with advanced consisting.
    Steps128Advanced,
}

impl fmt::Display for SpeedSteps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SpeedSteps::Steps14 => "14",
            SpeedSteps::Steps28 => "28",
            SpeedSteps::Steps128 => "128",
            SpeedSteps::Steps28Advanced => "28-advanced",
            SpeedSteps::Steps128Advanced => "128-advanced",
        };
        write!(f, "{s}")
    }
}

/// The wire protocol family a command station speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlBus {
    /// LocoNet multi-drop bus (Digitrax, Uhlenbrock, ...).
    LocoNet,
    /// XpressNet / Z21 framed request-reply protocol (Lenz, Roco).
    XpressNet,
}

impl fmt::Display for ControlBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlBus::LocoNet => write!(f, "LocoNet"),
            ControlBus::XpressNet => write!(f, "XpressNet"),
        }
    }
}

/// Static information about a connected command station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationInfo {
    /// The wire protocol family in use.
    pub bus: ControlBus,
    /// Human-readable description of the backend.
    pub description: String,
}

impl fmt::Display for StationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description, self.bus)
    }
}
