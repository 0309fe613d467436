//! Telling IPizza and Nordea callbacks apart.

use crate::codec::fields::{B02K_MAC, VK_MAC};
use crate::codec::FieldMap;
use crate::error::{BanklinkError, Result};
use crate::registry::Protocol;

/// A callback payload tagged with the protocol that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolMessage {
    IPizza(FieldMap),
    Nordea(FieldMap),
}

impl ProtocolMessage {
    /// `VK_MAC` means IPizza, `B02K_MAC` means Nordea. A payload with both
    /// is treated as IPizza.
    pub fn detect(fields: FieldMap) -> Result<Self> {
        if fields.contains_key(VK_MAC) {
            Ok(ProtocolMessage::IPizza(fields))
        } else if fields.contains_key(B02K_MAC) {
            Ok(ProtocolMessage::Nordea(fields))
        } else {
            Err(BanklinkError::Protocol(
                "invalid request (unknown protocol)".into(),
            ))
        }
    }

    pub fn protocol(&self) -> Protocol {
        match self {
            ProtocolMessage::IPizza(_) => Protocol::IPizza,
            ProtocolMessage::Nordea(_) => Protocol::Nordea,
        }
    }

    pub fn fields(&self) -> &FieldMap {
        match self {
            ProtocolMessage::IPizza(fields) | ProtocolMessage::Nordea(fields) => fields,
        }
    }
}
