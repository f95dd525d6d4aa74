pub(crate) mod builder;
pub(crate) mod fields;
pub(crate) mod grid;
pub(crate) mod timestamp;

use serde::Serialize;
use std::fmt;

use crate::series::grid::{TimeSlot, grid};

/// Source-type tag of a series; doubles as display label and lookup key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SeriesTag {
    Hydro,
    Thermal,
    Wind,
    Solar,
    Nuclear,
    Total,
    Load,
    Interchange,
    StoredEnergy,
    UsefulVolume,
}

/// Tags that contribute to the derived total
pub const GENERATION_TAGS: [SeriesTag; 5] = [
    SeriesTag::Hydro,
    SeriesTag::Thermal,
    SeriesTag::Wind,
    SeriesTag::Solar,
    SeriesTag::Nuclear,
];

impl SeriesTag {
    pub fn label(&self) -> &'static str {
        match self {
            SeriesTag::Hydro => "Hydro",
            SeriesTag::Thermal => "Thermal",
            SeriesTag::Wind => "Wind",
            SeriesTag::Solar => "Solar",
            SeriesTag::Nuclear => "Nuclear",
            SeriesTag::Total => "Total",
            SeriesTag::Load => "Load",
            SeriesTag::Interchange => "Interchange",
            SeriesTag::StoredEnergy => "Stored Energy",
            SeriesTag::UsefulVolume => "Useful Volume",
        }
    }

    pub fn is_generation(&self) -> bool {
        GENERATION_TAGS.contains(self)
    }
}

impl fmt::Display for SeriesTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for SeriesTag {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// One grid slot and its measurement; `None` means no data, not zero
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub slot: TimeSlot,
    pub value: Option<f64>,
}

/// A full-grid series of points, always one per slot in grid order
pub fn absent_points() -> Vec<SeriesPoint> {
    grid()
        .iter()
        .map(|&slot| SeriesPoint { slot, value: None })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedSeries {
    #[serde(rename = "label")]
    pub tag: SeriesTag,
    pub points: Vec<SeriesPoint>,
}

/// Summary of the present values of a series
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub present: usize,
}

impl NamedSeries {
    pub fn new(tag: SeriesTag, points: Vec<SeriesPoint>) -> Self {
        Self { tag, points }
    }

    /// Min, max and mean over present points; `None` if every point is absent
    pub fn stats(&self) -> Option<SeriesStats> {
        let values: Vec<f64> = self.points.iter().filter_map(|p| p.value).collect();

        if values.is_empty() {
            return None;
        }

        Some(SeriesStats {
            min: values.iter().cloned().fold(f64::INFINITY, f64::min),
            max: values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            mean: values.iter().sum::<f64>() / values.len() as f64,
            present: values.len(),
        })
    }
}
