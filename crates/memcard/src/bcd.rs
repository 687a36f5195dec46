//! Packed-decimal timestamps.
//!
//! Eight bytes: century, year, month, day, hour, minute, second, weekday. Writers disagree on which
//! weekday is zero, so the polarity is a parameter when encoding and ignored when decoding.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::error::{Error, Result};

pub const TIMESTAMP_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayOfWeekPolarity {
    SundayZero,
    MondayZero,
}

impl DayOfWeekPolarity {
    pub fn weekday_byte(self, date: &NaiveDateTime) -> u8 {
        let weekday = date.weekday();
        match self {
            DayOfWeekPolarity::SundayZero => weekday.num_days_from_sunday() as u8,
            DayOfWeekPolarity::MondayZero => weekday.num_days_from_monday() as u8,
        }
    }
}

pub fn to_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

/// `None` when either nibble is not a decimal digit.
pub fn from_bcd(byte: u8) -> Option<u8> {
    let (high, low) = (byte >> 4, byte & 0x0F);
    (high < 10 && low < 10).then_some(high * 10 + low)
}

pub fn encode_timestamp(date: &NaiveDateTime, polarity: DayOfWeekPolarity) -> [u8; TIMESTAMP_LEN] {
    let year = date.year().rem_euclid(10_000) as u32;
    [
        to_bcd((year / 100) as u8),
        to_bcd((year % 100) as u8),
        to_bcd(date.month() as u8),
        to_bcd(date.day() as u8),
        to_bcd(date.hour() as u8),
        to_bcd(date.minute() as u8),
        to_bcd(date.second() as u8),
        polarity.weekday_byte(date),
    ]
}

pub fn decode_timestamp(bytes: &[u8]) -> Result<NaiveDateTime> {
    if bytes.len() < TIMESTAMP_LEN {
        return Err(Error::SizeMismatch {
            what: "BCD timestamp",
            expected: TIMESTAMP_LEN,
            actual: bytes.len(),
        });
    }
    let mut digits = [0u8; 7];
    for (digit, &byte) in digits.iter_mut().zip(bytes) {
        *digit = from_bcd(byte).ok_or(Error::UnsupportedField {
            field: "BCD timestamp digit",
            value: byte as u64,
        })?;
    }
    let [century, year, month, day, hour, minute, second] = digits;
    let year = century as i32 * 100 + year as i32;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
        .and_then(|d| d.and_hms_opt(hour as u32, minute as u32, second as u32))
        .ok_or(Error::UnsupportedField {
            field: "BCD timestamp",
            value: u64::from_be_bytes([0, bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6]]),
        })
}

/// Whether the weekday byte agrees with the date under either polarity.
pub fn weekday_consistent(bytes: &[u8]) -> bool {
    let Ok(date) = decode_timestamp(bytes) else {
        return false;
    };
    let stored = bytes[7];
    [DayOfWeekPolarity::SundayZero, DayOfWeekPolarity::MondayZero]
        .iter()
        .any(|polarity| polarity.weekday_byte(&date) == stored)
}
