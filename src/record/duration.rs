//! `HH:MM:SS.mmm` offsets
//!
//! Every component has a fixed width: two digits for hours, minutes and
//! seconds, three for milliseconds. Minutes and seconds stop at 59; hours are
//! bounded only by their width.

use std::time::Duration;

use crate::error::DurationError;

/// Parse an `HH:MM:SS.mmm` offset
pub fn parse_offset(raw: &str) -> Result<Duration, DurationError> {
    let (units, fraction) = raw
        .split_once('.')
        .ok_or_else(|| DurationError::MissingFraction(raw.to_string()))?;

    let parts: Vec<&str> = units.split(':').collect();
    if parts.len() != 3 || fraction.contains('.') {
        return Err(DurationError::Units(units.to_string()));
    }
    for (position, part) in parts.iter().enumerate() {
        if part.len() != 2 {
            return Err(DurationError::UnitDigits {
                position,
                found: part.len(),
            });
        }
    }
    if fraction.len() != 3 {
        return Err(DurationError::MillisDigits(fraction.len()));
    }

    let hours = number(parts[0])?;
    let minutes = number(parts[1])?;
    let seconds = number(parts[2])?;
    let millis = number(fraction)?;

    if minutes > 59 {
        return Err(DurationError::Minutes(minutes));
    }
    if seconds > 59 {
        return Err(DurationError::Seconds(seconds));
    }

    Ok(Duration::from_secs(hours * 3600 + minutes * 60 + seconds) + Duration::from_millis(millis))
}

fn number(digits: &str) -> Result<u64, DurationError> {
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DurationError::NotNumeric(digits.to_string()));
    }
    digits
        .parse()
        .map_err(|_| DurationError::NotNumeric(digits.to_string()))
}
