//! BGP messages and the pieces of an UPDATE the extractor consumes.
mod aspath;
mod attributes;

pub use aspath::*;
pub use attributes::*;

use crate::models::NetworkPrefix;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt::{Display, Formatter};

#[derive(Debug, PartialEq, Eq, Clone, Copy, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum BgpMessageType {
    OPEN = 1,
    UPDATE = 2,
    NOTIFICATION = 3,
    KEEPALIVE = 4,
}

/// BGP finite state machine states as recorded in BGP4MP state change records.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u16)]
pub enum BgpState {
    Idle = 1,
    Connect = 2,
    Active = 3,
    OpenSent = 4,
    OpenConfirm = 5,
    Established = 6,
}

impl Display for BgpState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A BGP message. Only UPDATE bodies are decoded; the other types are recognized and dropped.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum BgpMessage {
    Open,
    Update(BgpUpdateMessage),
    Notification { error_code: u8, error_subcode: u8 },
    KeepAlive,
}

impl BgpMessage {
    pub fn msg_type(&self) -> BgpMessageType {
        match self {
            BgpMessage::Open => BgpMessageType::OPEN,
            BgpMessage::Update(_) => BgpMessageType::UPDATE,
            BgpMessage::Notification { .. } => BgpMessageType::NOTIFICATION,
            BgpMessage::KeepAlive => BgpMessageType::KEEPALIVE,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct BgpUpdateMessage {
    /// IPv4 prefixes from the withdrawn routes field.
    pub withdrawn_prefixes: Vec<NetworkPrefix>,
    pub attributes: Attributes,
    /// IPv4 prefixes from the NLRI field.
    pub announced_prefixes: Vec<NetworkPrefix>,
}
