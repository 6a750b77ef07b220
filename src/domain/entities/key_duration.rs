use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, TimeZone};
use thiserror::Error;

/// Fixed validity periods offered for paid keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationPreset {
    OneHour,
    SixHours,
    TwelveHours,
    OneDay,
    TwoDays,
    SevenDays,
    ThirtyDays,
}

impl DurationPreset {
    pub const ALL: [DurationPreset; 7] = [
        DurationPreset::OneHour,
        DurationPreset::SixHours,
        DurationPreset::TwelveHours,
        DurationPreset::OneDay,
        DurationPreset::TwoDays,
        DurationPreset::SevenDays,
        DurationPreset::ThirtyDays,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            DurationPreset::OneHour => "1h",
            DurationPreset::SixHours => "6h",
            DurationPreset::TwelveHours => "12h",
            DurationPreset::OneDay => "1d",
            DurationPreset::TwoDays => "2d",
            DurationPreset::SevenDays => "7d",
            DurationPreset::ThirtyDays => "30d",
        }
    }

    pub fn secs(&self) -> i64 {
        const HOUR: i64 = 3_600;
        const DAY: i64 = 86_400;
        match self {
            DurationPreset::OneHour => HOUR,
            DurationPreset::SixHours => 6 * HOUR,
            DurationPreset::TwelveHours => 12 * HOUR,
            DurationPreset::OneDay => DAY,
            DurationPreset::TwoDays => 2 * DAY,
            DurationPreset::SevenDays => 7 * DAY,
            DurationPreset::ThirtyDays => 30 * DAY,
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.code().eq_ignore_ascii_case(code))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("Unrecognised duration '{0}'. Use 1h, 6h, 12h, 1d, 2d, 7d, 30d, seconds, or DD.MM.YYYY")]
    Unrecognised(String),

    #[error("Duration must be positive")]
    NotPositive,

    #[error("Date {0} is not in the future")]
    NotInFuture(String),

    #[error("Duration is too long. The longest key lasts 100 years")]
    TooLong,
}

/// How long a paid key should live, validated once where it enters the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDuration {
    Preset(DurationPreset),
    Seconds(i64),
    /// Valid until 23:59:59 local time on this day.
    Until(NaiveDate),
}

pub const DATE_FORMAT: &str = "%d.%m.%Y";

/// Upper bound for any resolved duration: 100 years.
pub const MAX_KEY_DURATION_SECS: i64 = 100 * 365 * 86_400;

impl FromStr for KeyDuration {
    type Err = DurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(preset) = DurationPreset::from_code(trimmed) {
            return Ok(KeyDuration::Preset(preset));
        }
        if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            let secs: i64 = trimmed
                .parse()
                .map_err(|_| DurationError::Unrecognised(trimmed.to_string()))?;
            if secs == 0 {
                return Err(DurationError::NotPositive);
            }
            return Ok(KeyDuration::Seconds(secs));
        }
        NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
            .map(KeyDuration::Until)
            .map_err(|_| DurationError::Unrecognised(trimmed.to_string()))
    }
}

impl KeyDuration {
    /// Seconds from `now` until the key should expire.
    pub fn resolve_secs<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<i64, DurationError> {
        let secs = self.unbounded_secs(now)?;
        if secs > MAX_KEY_DURATION_SECS {
            return Err(DurationError::TooLong);
        }
        Ok(secs)
    }

    fn unbounded_secs<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<i64, DurationError> {
        match self {
            KeyDuration::Preset(preset) => Ok(preset.secs()),
            KeyDuration::Seconds(secs) if *secs > 0 => Ok(*secs),
            KeyDuration::Seconds(_) => Err(DurationError::NotPositive),
            KeyDuration::Until(date) => {
                let not_future = || DurationError::NotInFuture(date.format(DATE_FORMAT).to_string());
                let end_of_day = date.and_hms_opt(23, 59, 59).ok_or_else(not_future)?;
                let target = now
                    .timezone()
                    .from_local_datetime(&end_of_day)
                    .earliest()
                    .ok_or_else(not_future)?;
                let secs = target.timestamp() - now.timestamp();
                if secs <= 0 {
                    return Err(not_future());
                }
                Ok(secs)
            }
        }
    }
}

impl fmt::Display for KeyDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyDuration::Preset(preset) => f.write_str(&format_duration(preset.secs())),
            KeyDuration::Seconds(secs) => f.write_str(&format_duration(*secs)),
            KeyDuration::Until(date) => write!(f, "until {}", date.format(DATE_FORMAT)),
        }
    }
}

/// Human label for a number of seconds: `45 min`, `6 h`, `7 d`, `1 d 12 h`.
pub fn format_duration(secs: i64) -> String {
    let secs = secs.max(0);
    if secs < 3_600 {
        format!("{} min", secs / 60)
    } else if secs < 86_400 {
        format!("{} h", secs / 3_600)
    } else {
        let (days, hours) = (secs / 86_400, (secs % 86_400) / 3_600);
        if hours > 0 {
            format!("{days} d {hours} h")
        } else {
            format!("{days} d")
        }
    }
}
