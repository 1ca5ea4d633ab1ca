//! Argument parsing for command verbs.

use crate::calendar::{self, CalendarError};

/// How a time argument failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeArgError {
    /// Neither `epoch=` nor `iso=`.
    UnknownForm,
    /// `iso=` text was rejected by the calendar parser.
    BadIso(CalendarError),
}

/// Retrieval filter carried by GETLOG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFilter {
    All,
    Since(u32),
    Between { from: u32, to: u32 },
}

impl LogFilter {
    /// Whether a record stamped `epoch` is selected.  Bounds are inclusive.
    pub fn matches(self, epoch: u32) -> bool {
        match self {
            Self::All => true,
            Self::Since(since) => epoch >= since,
            Self::Between { from, to } => (from..=to).contains(&epoch),
        }
    }
}

/// `BETWEEN=` with a zero bound or `from > to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadRange;

/// Read leading decimal digits the way the C library's `strtoul` does:
/// optional leading blanks and `+`, digits up to the first non-digit,
/// 0 when there are none, saturation on overflow.  Returns the value and
/// the unconsumed rest.
pub fn parse_u32_lenient(text: &str) -> (u32, &str) {
    let t = text.trim_start_matches([' ', '\t']);
    let t = t.strip_prefix('+').unwrap_or(t);
    let end = t.bytes().take_while(u8::is_ascii_digit).count();
    if end == 0 {
        return (0, text);
    }
    let value = t[..end].bytes().fold(0u32, |acc, c| {
        acc.saturating_mul(10).saturating_add(u32::from(c - b'0'))
    });
    (value, &t[end..])
}

/// `epoch=<sec>` or `iso=<YYYY-MM-DDTHH:MM:SS[Z]>`.  Prefixes are
/// case-sensitive.
pub fn parse_time_arg(arg: &str) -> Result<u32, TimeArgError> {
    if let Some(rest) = arg.strip_prefix("epoch=") {
        return Ok(parse_u32_lenient(rest).0);
    }
    if let Some(rest) = arg.strip_prefix("iso=") {
        return calendar::parse_iso8601(rest)
            .map(|dt| dt.epoch())
            .map_err(TimeArgError::BadIso);
    }
    Err(TimeArgError::UnknownForm)
}

/// GETLOG argument: none, `SINCE=<sec>` or `BETWEEN=<a>,<b>` (`;` also
/// separates).  Keywords are case-insensitive; anything else means "all".
pub fn parse_log_filter(arg: Option<&str>) -> Result<LogFilter, BadRange> {
    let Some(arg) = arg.filter(|a| !a.is_empty()) else {
        return Ok(LogFilter::All);
    };

    if let Some(rest) = strip_prefix_ignore_case(arg, "SINCE=") {
        return Ok(LogFilter::Since(parse_u32_lenient(rest).0));
    }

    if let Some(rest) = strip_prefix_ignore_case(arg, "BETWEEN=") {
        let (from, rest) = parse_u32_lenient(rest);
        let to = match rest.as_bytes().first() {
            Some(b',' | b';') => parse_u32_lenient(&rest[1..]).0,
            _ => 0,
        };
        return if from != 0 && to != 0 && from <= to {
            Ok(LogFilter::Between { from, to })
        } else {
            Err(BadRange)
        };
    }

    Ok(LogFilter::All)
}

pub(crate) fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &text[prefix.len()..])
}
