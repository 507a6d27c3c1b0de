//! Response slots: the latest value of each response category.

use crate::protocol::messages::{
    BreakdownResponse, HabitatResponse, InitializeResponse, ThroughputResponse,
};

/// Latest known response of each category.
///
/// Each slot is replaced wholesale when a matching payload arrives; fields
/// are never merged across responses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseSlots {
    pub initialize: Option<InitializeResponse>,
    pub throughput: Option<ThroughputResponse>,
    pub breakdown: Option<BreakdownResponse>,
    pub habitat: Option<HabitatResponse>,
}

impl ResponseSlots {
    /// True when no slot holds a value.
    pub fn is_empty(&self) -> bool {
        self.initialize.is_none()
            && self.throughput.is_none()
            && self.breakdown.is_none()
            && self.habitat.is_none()
    }

    /// Drop every slot.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
