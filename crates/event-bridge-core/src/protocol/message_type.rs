//! Catalogue of the protocol messages the tap attaches hooks to.
//!
//! Every message type produces two event names: `<Name>Request` when the
//! request is observed and `<Name>Response` when the matching response
//! arrives.  The catalogue covers both directions of traffic:
//!
//! - **Device-originated**: the field device sends the request, the central
//!   system answers (e.g. `BootNotification`, `Heartbeat`).
//! - **Server-originated**: the central system sends the request, the device
//!   answers (e.g. `Reset`, `RemoteStartTransaction`).
//!
//! `DataTransfer` is the only message that flows in both directions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which side of the connection initiates a message exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Device → central system.
    DeviceOriginated,
    /// Central system → device.
    ServerOriginated,
}

/// Returned when a message name is not part of the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown message type: {0}")]
pub struct UnknownMessageType(pub String);

/// A protocol message type supported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    // Device-originated
    Authorize,
    BootNotification,
    DiagnosticsStatusNotification,
    FirmwareStatusNotification,
    Heartbeat,
    MeterValues,
    StartTransaction,
    StatusNotification,
    StopTransaction,

    // Both
    DataTransfer,

    // Server-originated
    CancelReservation,
    ChangeAvailability,
    ChangeConfiguration,
    ClearCache,
    ClearChargingProfile,
    GetCompositeSchedule,
    GetConfiguration,
    GetDiagnostics,
    GetLocalListVersion,
    RemoteStartTransaction,
    RemoteStopTransaction,
    ReserveNow,
    Reset,
    SendLocalList,
    SetChargingProfile,
    TriggerMessage,
    UnlockConnector,
    UpdateFirmware,
}

impl MessageType {
    /// Every supported message type, in declaration order.
    pub const ALL: &'static [MessageType] = &[
        MessageType::Authorize,
        MessageType::BootNotification,
        MessageType::DiagnosticsStatusNotification,
        MessageType::FirmwareStatusNotification,
        MessageType::Heartbeat,
        MessageType::MeterValues,
        MessageType::StartTransaction,
        MessageType::StatusNotification,
        MessageType::StopTransaction,
        MessageType::DataTransfer,
        MessageType::CancelReservation,
        MessageType::ChangeAvailability,
        MessageType::ChangeConfiguration,
        MessageType::ClearCache,
        MessageType::ClearChargingProfile,
        MessageType::GetCompositeSchedule,
        MessageType::GetConfiguration,
        MessageType::GetDiagnostics,
        MessageType::GetLocalListVersion,
        MessageType::RemoteStartTransaction,
        MessageType::RemoteStopTransaction,
        MessageType::ReserveNow,
        MessageType::Reset,
        MessageType::SendLocalList,
        MessageType::SetChargingProfile,
        MessageType::TriggerMessage,
        MessageType::UnlockConnector,
        MessageType::UpdateFirmware,
    ];

    /// The bare message name, e.g. `"Heartbeat"`.
    pub fn name(self) -> &'static str {
        match self {
            MessageType::Authorize => "Authorize",
            MessageType::BootNotification => "BootNotification",
            MessageType::DiagnosticsStatusNotification => "DiagnosticsStatusNotification",
            MessageType::FirmwareStatusNotification => "FirmwareStatusNotification",
            MessageType::Heartbeat => "Heartbeat",
            MessageType::MeterValues => "MeterValues",
            MessageType::StartTransaction => "StartTransaction",
            MessageType::StatusNotification => "StatusNotification",
            MessageType::StopTransaction => "StopTransaction",
            MessageType::DataTransfer => "DataTransfer",
            MessageType::CancelReservation => "CancelReservation",
            MessageType::ChangeAvailability => "ChangeAvailability",
            MessageType::ChangeConfiguration => "ChangeConfiguration",
            MessageType::ClearCache => "ClearCache",
            MessageType::ClearChargingProfile => "ClearChargingProfile",
            MessageType::GetCompositeSchedule => "GetCompositeSchedule",
            MessageType::GetConfiguration => "GetConfiguration",
            MessageType::GetDiagnostics => "GetDiagnostics",
            MessageType::GetLocalListVersion => "GetLocalListVersion",
            MessageType::RemoteStartTransaction => "RemoteStartTransaction",
            MessageType::RemoteStopTransaction => "RemoteStopTransaction",
            MessageType::ReserveNow => "ReserveNow",
            MessageType::Reset => "Reset",
            MessageType::SendLocalList => "SendLocalList",
            MessageType::SetChargingProfile => "SetChargingProfile",
            MessageType::TriggerMessage => "TriggerMessage",
            MessageType::UnlockConnector => "UnlockConnector",
            MessageType::UpdateFirmware => "UpdateFirmware",
        }
    }

    /// The directions in which this message may be exchanged.
    pub fn directions(self) -> &'static [Direction] {
        match self {
            MessageType::DataTransfer => &[Direction::DeviceOriginated, Direction::ServerOriginated],
            MessageType::Authorize
            | MessageType::BootNotification
            | MessageType::DiagnosticsStatusNotification
            | MessageType::FirmwareStatusNotification
            | MessageType::Heartbeat
            | MessageType::MeterValues
            | MessageType::StartTransaction
            | MessageType::StatusNotification
            | MessageType::StopTransaction => &[Direction::DeviceOriginated],
            _ => &[Direction::ServerOriginated],
        }
    }
}

impl FromStr for MessageType {
    type Err = UnknownMessageType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MessageType::ALL
            .iter()
            .copied()
            .find(|m| m.name() == s)
            .ok_or_else(|| UnknownMessageType(s.to_string()))
    }
}

impl MessageType {
    /// Event name used for the request hook, e.g. `"ResetRequest"`.
    pub fn request_event_name(self) -> String {
        format!("{}Request", self.name())
    }

    /// Event name used for the response hook, e.g. `"ResetResponse"`.
    pub fn response_event_name(self) -> String {
        format!("{}Response", self.name())
    }

    /// Returns `true` if the message may be sent in `direction`.
    pub fn flows(self, direction: Direction) -> bool {
        self.directions().contains(&direction)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
