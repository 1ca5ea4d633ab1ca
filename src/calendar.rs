//! Calendar ↔ epoch conversion.
//!
//! Epoch seconds count from 2000-01-01T00:00:00 (no time zone, no leap
//! seconds).  Conversion walks whole years, then whole months, using a
//! fixed month-length table with February at 29 days in leap years.
//!
//! ```text
//!   "2024-03-01T12:30:00Z" ──parse_iso8601──▶ DateTime ──to_epoch──▶ u32
//!                                               ▲                     │
//!                                               └────to_calendar──────┘
//! ```
//!
//! The persisted clock only carries a two-digit year offset, so text input
//! is limited to 2000–2099.  [`to_calendar`] itself is total over `u32`.

use core::fmt;

/// First calendar year representable by the epoch.
pub const EPOCH_YEAR: u16 = 2000;

/// Last calendar year accepted by [`parse_iso8601`].
pub const LAST_ISO_YEAR: u16 = 2099;

const SECS_PER_DAY: u32 = 86_400;

/// Days per month, non-leap year.
const MONTH_DAYS: [u8; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

// ---------------------------------------------------------------------------
// DateTime
// ---------------------------------------------------------------------------

/// Broken-down UTC calendar time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DateTime {
    pub const fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    /// Seconds since the epoch for this calendar time.
    pub fn epoch(&self) -> u32 {
        to_epoch(self)
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a piece of ISO-8601 text was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarError {
    /// Year is not four digits or lies outside 2000–2099.
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    /// A `-`, `T`/space or `:` separator is missing.
    Separator,
}

impl fmt::Display for CalendarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Year => write!(f, "bad year"),
            Self::Month => write!(f, "bad month"),
            Self::Day => write!(f, "bad day"),
            Self::Hour => write!(f, "bad hour"),
            Self::Minute => write!(f, "bad minute"),
            Self::Second => write!(f, "bad second"),
            Self::Separator => write!(f, "bad separator"),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// Gregorian leap-year rule.
pub const fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in `month` (1–12) of `year`.  Returns 0 for an invalid month.
pub const fn days_in_month(year: u16, month: u8) -> u8 {
    if month == 0 || month > 12 {
        return 0;
    }
    if month == 2 && is_leap_year(year) {
        29
    } else {
        MONTH_DAYS[month as usize - 1]
    }
}

const fn days_in_year(year: u16) -> u32 {
    if is_leap_year(year) { 366 } else { 365 }
}

/// Convert a calendar time to epoch seconds.
///
/// Years before 2000 contribute nothing; results past `u32::MAX` saturate.
pub fn to_epoch(dt: &DateTime) -> u32 {
    let mut days: u64 = 0;
    for year in EPOCH_YEAR..dt.year {
        days += u64::from(days_in_year(year));
    }
    for month in 1..dt.month.min(13) {
        days += u64::from(days_in_month(dt.year, month));
    }
    days += u64::from(dt.day.saturating_sub(1));

    let secs = days * u64::from(SECS_PER_DAY)
        + u64::from(dt.hour) * 3600
        + u64::from(dt.minute) * 60
        + u64::from(dt.second);

    u32::try_from(secs).unwrap_or(u32::MAX)
}

/// Convert epoch seconds back to a calendar time.
pub fn to_calendar(epoch: u32) -> DateTime {
    let mut days = epoch / SECS_PER_DAY;
    let rem = epoch % SECS_PER_DAY;

    let mut year = EPOCH_YEAR;
    while days >= days_in_year(year) {
        days -= days_in_year(year);
        year += 1;
    }

    let mut month = 1u8;
    while days >= u32::from(days_in_month(year, month)) {
        days -= u32::from(days_in_month(year, month));
        month += 1;
    }

    DateTime {
        year,
        month,
        day: days as u8 + 1,
        hour: (rem / 3600) as u8,
        minute: ((rem % 3600) / 60) as u8,
        second: (rem % 60) as u8,
    }
}

// ---------------------------------------------------------------------------
// ISO-8601 parsing
// ---------------------------------------------------------------------------

/// Parse `YYYY-MM-DDTHH:MM:SS[Z]` (the `T` may also be a space).
///
/// Day is range-checked to 1–31 without per-month validation.  Anything
/// after the seconds field is ignored.
pub fn parse_iso8601(text: &str) -> Result<DateTime, CalendarError> {
    let b = text.as_bytes();

    let year = digits(b, 0, 4).ok_or(CalendarError::Year)?;
    if !(u32::from(EPOCH_YEAR)..=u32::from(LAST_ISO_YEAR)).contains(&year) {
        return Err(CalendarError::Year);
    }
    expect(b, 4, b'-')?;
    let month = digits(b, 5, 2).ok_or(CalendarError::Month)?;
    if !(1..=12).contains(&month) {
        return Err(CalendarError::Month);
    }
    expect(b, 7, b'-')?;
    let day = digits(b, 8, 2).ok_or(CalendarError::Day)?;
    if !(1..=31).contains(&day) {
        return Err(CalendarError::Day);
    }
    match b.get(10) {
        Some(b'T' | b' ') => {}
        _ => return Err(CalendarError::Separator),
    }
    let hour = digits(b, 11, 2).ok_or(CalendarError::Hour)?;
    if hour > 23 {
        return Err(CalendarError::Hour);
    }
    expect(b, 13, b':')?;
    let minute = digits(b, 14, 2).ok_or(CalendarError::Minute)?;
    if minute > 59 {
        return Err(CalendarError::Minute);
    }
    expect(b, 16, b':')?;
    let second = digits(b, 17, 2).ok_or(CalendarError::Second)?;
    if second > 59 {
        return Err(CalendarError::Second);
    }

    Ok(DateTime::new(
        year as u16,
        month as u8,
        day as u8,
        hour as u8,
        minute as u8,
        second as u8,
    ))
}

/// Exactly `len` ASCII digits starting at `at`.
fn digits(b: &[u8], at: usize, len: usize) -> Option<u32> {
    let field = b.get(at..at + len)?;
    field.iter().try_fold(0u32, |acc, &c| {
        c.is_ascii_digit().then(|| acc * 10 + u32::from(c - b'0'))
    })
}

fn expect(b: &[u8], at: usize, sep: u8) -> Result<(), CalendarError> {
    if b.get(at) == Some(&sep) {
        Ok(())
    } else {
        Err(CalendarError::Separator)
    }
}
