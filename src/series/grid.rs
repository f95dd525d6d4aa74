use chrono::{NaiveTime, Timelike};
use once_cell::sync::Lazy;
use serde::{Serialize, Serializer};
use std::fmt;

/// Width of one grid slot in minutes
pub const SLOT_MINUTES: u32 = 30;

/// Number of slots in a day (24h / 30min)
pub const SLOTS_PER_DAY: usize = (24 * 60 / SLOT_MINUTES) as usize;

/// One fixed point on the 30-minute intraday grid, rendered as "HH:MM"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeSlot {
    hour: u8,
    minute: u8,
}

static GRID: Lazy<Vec<TimeSlot>> = Lazy::new(|| {
    (0..SLOTS_PER_DAY)
        .map(|i| {
            let minutes = i as u32 * SLOT_MINUTES;
            TimeSlot {
                hour: (minutes / 60) as u8,
                minute: (minutes % 60) as u8,
            }
        })
        .collect()
});

/// The canonical intraday grid: "00:00", "00:30", ..., "23:30"
pub fn grid() -> &'static [TimeSlot] {
    &GRID
}

impl TimeSlot {
    /// Slot whose half hour contains the given wall-clock time
    pub fn containing(time: NaiveTime) -> Self {
        let minute = time.minute() - time.minute() % SLOT_MINUTES;
        Self {
            hour: time.hour() as u8,
            minute: minute as u8,
        }
    }

    /// Position of this slot in [`grid`]
    pub fn index(&self) -> usize {
        (self.hour as usize * 60 + self.minute as usize) / SLOT_MINUTES as usize
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl Serialize for TimeSlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
