//! CP56Time2a, the seven-byte binary time used by time-tagged objects and
//! by clock synchronization.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::error::{Iec104Error, Result};

/// Encoded size of a CP56Time2a time tag.
pub const CP56_TIME_LENGTH: usize = 7;

/// CP56Time2a timestamp (7 bytes).
///
/// ```text
/// byte 0-1  milliseconds within the minute, little-endian (0-59999)
/// byte 2    IV | res | minutes (6 bits)
/// byte 3    SU | res | res | hours (5 bits)
/// byte 4    day of week (3 bits) | day of month (5 bits)
/// byte 5    month (4 bits)
/// byte 6    year (7 bits, years since 2000)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cp56Time2a {
    /// Milliseconds (0-59999)
    pub milliseconds: u16,
    /// Minutes (0-59)
    pub minutes: u8,
    /// Hours (0-23)
    pub hours: u8,
    /// Day of month (1-31)
    pub day: u8,
    /// Day of week (1-7, 1=Monday, 0 if unused)
    pub day_of_week: u8,
    /// Month (1-12)
    pub month: u8,
    /// Year (0-99, years since 2000)
    pub year: u8,
    /// Invalid flag
    pub invalid: bool,
    /// Summer time flag
    pub summer_time: bool,
}

impl Cp56Time2a {
    /// Parse from 7 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < CP56_TIME_LENGTH {
            return Err(Iec104Error::invalid_asdu("CP56Time2a too short"));
        }

        Ok(Self {
            milliseconds: u16::from_le_bytes([bytes[0], bytes[1]]),
            minutes: bytes[2] & 0x3F,
            invalid: (bytes[2] & 0x80) != 0,
            hours: bytes[3] & 0x1F,
            summer_time: (bytes[3] & 0x80) != 0,
            day: bytes[4] & 0x1F,
            day_of_week: (bytes[4] >> 5) & 0x07,
            month: bytes[5] & 0x0F,
            year: bytes[6] & 0x7F,
        })
    }

    /// Encode to 7 bytes.
    pub fn to_bytes(&self) -> [u8; CP56_TIME_LENGTH] {
        let [ms_lo, ms_hi] = self.milliseconds.to_le_bytes();
        [
            ms_lo,
            ms_hi,
            (self.minutes & 0x3F) | if self.invalid { 0x80 } else { 0 },
            (self.hours & 0x1F) | if self.summer_time { 0x80 } else { 0 },
            (self.day & 0x1F) | ((self.day_of_week & 0x07) << 5),
            self.month & 0x0F,
            self.year & 0x7F,
        ]
    }

    /// Build a time tag from a calendar time.
    ///
    /// Years outside 2000-2099 wrap into the 7-bit field.
    pub fn from_datetime(dt: NaiveDateTime) -> Self {
        let millis = dt.second() * 1000 + (dt.nanosecond() / 1_000_000).min(999);
        Self {
            milliseconds: millis as u16,
            minutes: dt.minute() as u8,
            hours: dt.hour() as u8,
            day: dt.day() as u8,
            day_of_week: dt.weekday().number_from_monday() as u8,
            month: dt.month() as u8,
            year: (dt.year() - 2000).rem_euclid(100) as u8,
            invalid: false,
            summer_time: false,
        }
    }

    /// Convert to a calendar time, or `None` if the fields do not form a date.
    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        let date = NaiveDate::from_ymd_opt(
            2000 + self.year as i32,
            self.month as u32,
            self.day as u32,
        )?;
        let seconds = (self.milliseconds / 1000) as u32;
        let millis = (self.milliseconds % 1000) as u32;
        date.and_hms_milli_opt(self.hours as u32, self.minutes as u32, seconds, millis)
    }
}

impl std::fmt::Display for Cp56Time2a {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "20{:02}-{:02}-{:02} {:02}:{:02}:{:02}.{:03}",
            self.year,
            self.month,
            self.day,
            self.hours,
            self.minutes,
            self.milliseconds / 1000,
            self.milliseconds % 1000
        )?;
        if self.summer_time {
            f.write_str(" SU")?;
        }
        if self.invalid {
            f.write_str(" IV")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cp56time2a_bytes() {
        let time = Cp56Time2a {
            milliseconds: 30000,
            minutes: 30,
            hours: 12,
            day: 15,
            day_of_week: 3,
            month: 6,
            year: 24,
            invalid: false,
            summer_time: true,
        };

        let bytes = time.to_bytes();
        assert_eq!(bytes, [0x30, 0x75, 30, 0x80 | 12, (3 << 5) | 15, 6, 24]);
        assert_eq!(Cp56Time2a::from_bytes(&bytes).unwrap(), time);
    }

    #[test]
    fn test_cp56time2a_masks_reserved_bits() {
        let parsed = Cp56Time2a::from_bytes(&[0, 0, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]).unwrap();
        assert_eq!(parsed.minutes, 0x3F);
        assert!(parsed.invalid);
        assert_eq!(parsed.hours, 0x1F);
        assert!(parsed.summer_time);
        assert_eq!(parsed.day, 0x1F);
        assert_eq!(parsed.day_of_week, 7);
        assert_eq!(parsed.month, 0x0F);
        assert_eq!(parsed.year, 0x7F);
        assert!(parsed.to_datetime().is_none());
    }

    #[test]
    fn test_cp56time2a_too_short() {
        assert!(Cp56Time2a::from_bytes(&[0; 6]).is_err());
    }

    #[test]
    fn test_cp56time2a_datetime() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 17)
            .unwrap()
            .and_hms_milli_opt(23, 59, 58, 250)
            .unwrap();

        let time = Cp56Time2a::from_datetime(dt);
        assert_eq!(time.milliseconds, 58_250);
        assert_eq!(time.minutes, 59);
        assert_eq!(time.hours, 23);
        assert_eq!(time.day, 17);
        // 2024-03-17 was a Sunday
        assert_eq!(time.day_of_week, 7);
        assert_eq!(time.month, 3);
        assert_eq!(time.year, 24);

        assert_eq!(time.to_datetime(), Some(dt));
    }

    #[test]
    fn test_cp56time2a_display() {
        let time = Cp56Time2a {
            milliseconds: 5_007,
            minutes: 4,
            hours: 3,
            day: 2,
            day_of_week: 0,
            month: 1,
            year: 25,
            invalid: true,
            summer_time: false,
        };
        assert_eq!(time.to_string(), "2025-01-02 03:04:05.007 IV");
    }
}
