use chrono::FixedOffset;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::series::fields::{FieldAliases, InferenceError, ONS_ALIASES, parse_value};
use crate::series::grid::{SLOTS_PER_DAY, grid};
use crate::series::timestamp::slot_of;
use crate::series::{SeriesPoint, absent_points};

/// Why a batch produced no usable data
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildNotice {
    #[error("no data available yet")]
    NoData,
    #[error("format error: payload is not a list of records")]
    InvalidPayload,
    #[error("format error: {0}")]
    Inference(#[from] InferenceError),
}

/// Result of building one series: always a full grid
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub points: Vec<SeriesPoint>,
    pub notice: Option<BuildNotice>,
    /// Records dropped for a missing field, a bad value or a bad timestamp
    pub skipped: usize,
}

impl BuildOutcome {
    fn absent(notice: BuildNotice) -> Self {
        Self {
            points: absent_points(),
            notice: Some(notice),
            skipped: 0,
        }
    }
}

/// Maps raw API records onto the intraday grid
#[derive(Debug, Clone)]
pub struct SeriesBuilder {
    aliases: FieldAliases,
    offset: FixedOffset,
}

impl SeriesBuilder {
    pub fn new(offset: FixedOffset) -> Self {
        Self {
            aliases: ONS_ALIASES,
            offset,
        }
    }

    /// Build a 48-point series from a payload.
    ///
    /// Never fails: bad payloads give an all-absent series with a notice, bad
    /// records are skipped. Two records in the same slot: the later one wins.
    pub fn build(&self, payload: &Value) -> BuildOutcome {
        let Some(records) = payload.as_array() else {
            warn!("payload is not an array, building empty series");
            return BuildOutcome::absent(BuildNotice::InvalidPayload);
        };

        let Some(sample) = records.iter().find(|r| !r.is_null()) else {
            return BuildOutcome::absent(BuildNotice::NoData);
        };

        let mapping = match self.aliases.infer(sample) {
            Ok(mapping) => mapping,
            Err(e) => {
                warn!("field inference failed: {}", e);
                return BuildOutcome::absent(e.into());
            }
        };

        let mut slots: [Option<f64>; SLOTS_PER_DAY] = [None; SLOTS_PER_DAY];
        let mut skipped = 0;

        for record in records {
            let fields = record
                .get(mapping.value_field)
                .zip(record.get(mapping.timestamp_field));

            let Some((raw_value, raw_time)) = fields else {
                skipped += 1;
                continue;
            };

            let Some(value) = parse_value(raw_value) else {
                debug!("skipping record with non-numeric value: {}", raw_value);
                skipped += 1;
                continue;
            };

            match slot_of(raw_time, &self.offset) {
                Ok(slot) => slots[slot.index()] = Some(value),
                Err(e) => {
                    debug!("skipping record: {}", e);
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            debug!("{} of {} records skipped", skipped, records.len());
        }

        let points = grid()
            .iter()
            .zip(slots)
            .map(|(&slot, value)| SeriesPoint { slot, value })
            .collect();

        BuildOutcome {
            points,
            notice: None,
            skipped,
        }
    }
}
