//! Input output module.
//!
//! Records exchanged with clients and the on-disk layout of the engine state.
use crate::types::{Load, Timestamp};
use crate::utils::finite;
use crate::{GridError, Result};

use serde::{Deserialize, Serialize};

pub mod fs;


/// One consumption measurement of the history store.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct HistoricalDataPoint {
    pub timestamp: Timestamp,
    #[serde(alias = "consumo")]
    pub consumption: Load,
}

impl HistoricalDataPoint {
    /// Checks that the point can be stored and written back as JSON: a positive timestamp and
    /// a finite consumption.
    pub fn validate(&self) -> Result<()> {
        if self.timestamp <= 0 {
            return Err(GridError::InvalidValue {
                field: "timestamp",
                value: self.timestamp as f64,
            });
        }
        finite("consumption", self.consumption)?;
        Ok(())
    }
}

/// A batch of events as found in event files: either a bare list or `{"events": [...]}`.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum EventBatch {
    List(Vec<crate::events::Event>),
    Wrapped { events: Vec<crate::events::Event> },
}

impl EventBatch {
    pub fn into_events(self) -> Vec<crate::events::Event> {
        match self {
            EventBatch::List(events) => events,
            EventBatch::Wrapped { events } => events,
        }
    }
}
