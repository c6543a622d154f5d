use derive_more::Display;
use serde::{Deserialize, Serialize};

use super::error::BookingError;

/// Gateway payment-intent identifier (`pi_xxx`).
#[derive(Debug, Clone, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntentId(String);

impl IntentId {
    pub fn new(id: impl Into<String>) -> Result<Self, BookingError> {
        let id = id.into();
        if !id.starts_with("pi_") {
            return Err(BookingError::Validation(format!(
                "IntentId must start with pi_, got: {id}"
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Gateway webhook-event identifier (`evt_xxx`). Primary dedup key for
/// duplicate deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GatewayEventId(String);

impl GatewayEventId {
    pub fn new(id: impl Into<String>) -> Result<Self, BookingError> {
        let id = id.into();
        if !id.starts_with("evt_") {
            return Err(BookingError::Validation(format!(
                "GatewayEventId must start with evt_, got: {id}"
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}
