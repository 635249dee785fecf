use serde::{Deserialize, Serialize};

/// Day of the week, Monday-indexed like the derived `order_dayofweek` column.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
pub enum DayOfWeek {
    #[default]
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl DayOfWeek {
    /// Returns the Monday-indexed day number (0-6).
    #[must_use]
    pub const fn index(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for DayOfWeek {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Mon),
            1 => Ok(Self::Tue),
            2 => Ok(Self::Wed),
            3 => Ok(Self::Thu),
            4 => Ok(Self::Fri),
            5 => Ok(Self::Sat),
            6 => Ok(Self::Sun),
            other => Err(other),
        }
    }
}
