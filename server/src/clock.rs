//! Wall-clock formatting in the configured reference offset.

use chrono::{DateTime, FixedOffset, Utc};

/// Chat lines are stamped `YYYY.MM.DD HH:MM:SS`.
pub const TIMESTAMP_FORMAT: &str = "%Y.%m.%d %H:%M:%S";

/// Status entries are dated `YYYY.MM.DD`.
pub const DATE_FORMAT: &str = "%Y.%m.%d";

/// Formats the current time in one fixed offset, independent of the host zone.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceClock {
    offset: FixedOffset,
}

impl ReferenceClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn timestamp(&self) -> String {
        self.timestamp_at(Utc::now())
    }

    pub fn timestamp_at(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.offset).format(TIMESTAMP_FORMAT).to_string()
    }

    pub fn today(&self) -> String {
        self.date_at(Utc::now())
    }

    pub fn date_at(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.offset).format(DATE_FORMAT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn kst() -> ReferenceClock {
        ReferenceClock::new(FixedOffset::east_opt(9 * 3600).unwrap())
    }

    #[test]
    fn formats_in_reference_offset_not_utc() {
        let at = Utc.with_ymd_and_hms(2024, 12, 31, 16, 5, 9).unwrap();
        assert_eq!(kst().timestamp_at(at), "2025.01.01 01:05:09");
        assert_eq!(kst().date_at(at), "2025.01.01");
    }

    #[test]
    fn zero_pads_every_field() {
        let utc = ReferenceClock::new(FixedOffset::east_opt(0).unwrap());
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(utc.timestamp_at(at), "2024.03.04 05:06:07");
    }
}
