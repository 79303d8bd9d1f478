//! Implementation of `DateTime`, a 64-bit count of 100 nanosecond ticks
//! since 1601-01-01 UTC.

use std::{
    fmt,
    io::{Read, Write},
};

use chrono::{TimeZone, Utc};

use crate::encoding::{
    read_i64, write_i64, BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult,
};

const TICKS_PER_SECOND: i64 = 10_000_000;
const NANOS_PER_TICK: i64 = 100;

/// Seconds between 1601-01-01 and the Unix epoch.
const EPOCH_DELTA_SECONDS: i64 = 11_644_473_600;

/// A UTC timestamp. Tick value 0 is the null date; `i64::MAX` means
/// "no value / end of time".
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct DateTime {
    ticks: i64,
}

impl fmt::Debug for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "[null]")
        } else if self.ticks == i64::MAX {
            write!(f, "[end-of-time]")
        } else {
            write!(f, "{}", self.as_chrono().to_rfc3339())
        }
    }
}

impl Default for DateTime {
    fn default() -> Self {
        DateTime::null()
    }
}

impl BinaryEncodable for DateTime {
    fn byte_len(&self) -> usize {
        8
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_i64(stream, self.ticks)
    }
}

impl BinaryDecodable for DateTime {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        // Negative tick counts are invalid and decode as the null date.
        let ticks = read_i64(stream)?.max(0);
        Ok(DateTime { ticks })
    }
}

impl From<chrono::DateTime<Utc>> for DateTime {
    fn from(value: chrono::DateTime<Utc>) -> Self {
        let seconds = value.timestamp() + EPOCH_DELTA_SECONDS;
        if seconds < 0 {
            return DateTime::null();
        }
        let ticks = seconds
            .saturating_mul(TICKS_PER_SECOND)
            .saturating_add(value.timestamp_subsec_nanos() as i64 / NANOS_PER_TICK);
        DateTime { ticks }
    }
}

impl DateTime {
    /// The current time.
    pub fn now() -> DateTime {
        Utc::now().into()
    }

    /// The null date.
    pub fn null() -> DateTime {
        DateTime { ticks: 0 }
    }

    /// The "no value" sentinel, the largest representable timestamp.
    pub fn endtimes() -> DateTime {
        DateTime { ticks: i64::MAX }
    }

    /// Construct from a raw tick count.
    pub fn from_ticks(ticks: i64) -> DateTime {
        DateTime {
            ticks: ticks.max(0),
        }
    }

    /// The raw tick count.
    pub fn ticks(&self) -> i64 {
        self.ticks
    }

    /// Test if this is the null date.
    pub fn is_null(&self) -> bool {
        self.ticks == 0
    }

    /// Convert to a chrono timestamp. The null date maps to the 1601 epoch.
    pub fn as_chrono(&self) -> chrono::DateTime<Utc> {
        let seconds = self.ticks / TICKS_PER_SECOND - EPOCH_DELTA_SECONDS;
        let nanos = (self.ticks % TICKS_PER_SECOND) * NANOS_PER_TICK;
        match Utc.timestamp_opt(seconds, nanos as u32) {
            chrono::LocalResult::Single(t) => t,
            // Out of chrono's range, clamp to the maximum it can hold.
            _ => chrono::DateTime::<Utc>::MAX_UTC,
        }
    }

    /// Milliseconds between this and an earlier timestamp.
    pub fn ms_since(&self, earlier: &DateTime) -> i64 {
        (self.ticks - earlier.ticks) / (TICKS_PER_SECOND / 1000)
    }
}

#[cfg(test)]
mod tests {
    use super::DateTime;
    use crate::encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions};

    #[test]
    fn null_is_zero_ticks() {
        let null = DateTime::null();
        assert!(null.is_null());
        assert_eq!(null.encode_to_vec(), vec![0u8; 8]);
    }

    #[test]
    fn round_trip_now() {
        let now = DateTime::now();
        let mut s = std::io::Cursor::new(now.encode_to_vec());
        let decoded = DateTime::decode(&mut s, &DecodingOptions::default()).unwrap();
        assert_eq!(decoded, now);
        // Chrono conversion loses nothing at tick granularity.
        let via_chrono: DateTime = now.as_chrono().into();
        assert_eq!(via_chrono.ticks(), now.ticks());
    }

    #[test]
    fn negative_ticks_decode_as_null() {
        let mut s = std::io::Cursor::new(vec![0xFFu8; 8]);
        let decoded = DateTime::decode(&mut s, &DecodingOptions::default()).unwrap();
        assert!(decoded.is_null());
    }

    #[test]
    fn ms_since() {
        let a = DateTime::from_ticks(10_000);
        let b = DateTime::from_ticks(30_000);
        assert_eq!(b.ms_since(&a), 2);
    }
}
