//! Asynchronous station event types.
//!
//! Events are emitted by backend drivers through a [`tokio::sync::broadcast`]
//! channel whenever the bus reports a state change -- whether or not this
//! controller caused it. Layout control panels and feedback displays
//! subscribe to these events for real-time updates without polling.

use crate::types::{Direction, SwitchDirection};

/// An event emitted by a command-station driver when layout state changes.
///
/// Subscribe via [`crate::station::CommandStation::subscribe()`]. Events are
/// delivered on a best-effort basis through a bounded broadcast channel;
/// slow consumers may miss events under heavy bus traffic.
#[derive(Debug, Clone)]
pub enum StationEvent {
    /// Track power was switched on or off.
    PowerChanged {
        /// `true` if track power is on.
        on: bool,
    },

    /// A locomotive's running state changed (speed, direction, or functions).
    ///
    /// Emitted both for changes caused by this controller and for changes
    /// observed from other throttles on the bus.
    LocomotiveChanged {
        /// Decoder address of the locomotive.
        address: u16,
        /// Speed 0-127 (0 = stop, 1 = emergency stop, 2-127 = running).
        speed: u8,
        /// Travel direction.
        direction: Direction,
        /// Function states F0-F8; index 0 is F0 (lights).
        functions: [bool; 9],
    },

    /// A turnout changed position or had an output switched.
    TurnoutChanged {
        /// 1-based user address of the turnout.
        address: u16,
        /// New position.
        direction: SwitchDirection,
        /// `true` while the drive output is energized.
        on: bool,
    },

    /// An occupancy sensor changed state.
    SensorChanged {
        /// 1-based user address of the sensor input.
        address: u16,
        /// `true` if the section is occupied / the input is active.
        active: bool,
    },

    /// A transponder entered or left a detection zone.
    TransponderChanged {
        /// Detection zone / section number.
        zone: u16,
        /// Decoder address of the transponder.
        address: u16,
        /// `true` if the transponder entered the zone, `false` if it left.
        present: bool,
    },

    /// A LISSY / RailCom detector reported a passing locomotive.
    LissyReport {
        /// Reporting detector unit number.
        unit: u8,
        /// Decoder address of the detected locomotive.
        address: u16,
        /// Travel direction past the detector.
        direction: Direction,
    },

    /// An LNCV-capable device answered a discovery broadcast.
    LncvDeviceFound {
        /// Article (product) number of the device.
        article: u16,
        /// Configured module address.
        module_address: u16,
    },

    /// Successfully connected to the command station.
    Connected,

    /// Connection to the command station was lost or shut down.
    Disconnected,

    /// A syntactically valid message arrived with no semantic mapping.
    ///
    /// Carries the raw frame bytes so diagnostics can log unknown traffic;
    /// such messages are never silently dropped.
    UnsupportedMessage {
        /// The complete raw frame, checksum included.
        raw: Vec<u8>,
    },
}
