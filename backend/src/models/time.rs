use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Timelike, Utc,
};
use serde::{Deserialize, Serialize};

/// Day of the week, numbered 0=Sunday through 6=Saturday.
///
/// This is the only weekday numbering used anywhere in the crate: stored
/// availability rows, request payloads and slot expansion all go through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DayOfWeek(u8);

impl DayOfWeek {
    pub const SUNDAY: DayOfWeek = DayOfWeek(0);
    pub const MONDAY: DayOfWeek = DayOfWeek(1);
    pub const TUESDAY: DayOfWeek = DayOfWeek(2);
    pub const WEDNESDAY: DayOfWeek = DayOfWeek(3);
    pub const THURSDAY: DayOfWeek = DayOfWeek(4);
    pub const FRIDAY: DayOfWeek = DayOfWeek(5);
    pub const SATURDAY: DayOfWeek = DayOfWeek(6);

    /// Build from the 0..=6 index, `None` outside that range.
    pub fn new(index: u8) -> Option<Self> {
        (index <= 6).then_some(DayOfWeek(index))
    }

    /// Weekday of a calendar date.
    pub fn of(date: NaiveDate) -> Self {
        DayOfWeek(date.weekday().num_days_from_sunday() as u8)
    }

    pub fn index(&self) -> u8 {
        self.0
    }

    pub fn name(&self) -> &'static str {
        match self.0 {
            0 => "Sunday",
            1 => "Monday",
            2 => "Tuesday",
            3 => "Wednesday",
            4 => "Thursday",
            5 => "Friday",
            _ => "Saturday",
        }
    }
}

impl TryFrom<u8> for DayOfWeek {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        DayOfWeek::new(value).ok_or_else(|| format!("day_of_week must be 0..=6, got {}", value))
    }
}

impl From<DayOfWeek> for u8 {
    fn from(day: DayOfWeek) -> Self {
        day.0
    }
}

impl std::fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Wall-clock time of day serialized as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(NaiveTime);

impl ClockTime {
    /// Build from hour and minute, `None` when out of range.
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(ClockTime)
    }

    /// Parse `HH:MM`. Seconds are not accepted.
    pub fn parse(s: &str) -> Result<Self, String> {
        NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map(ClockTime)
            .map_err(|_| format!("expected HH:MM, got '{}'", s))
    }

    pub fn as_naive(&self) -> NaiveTime {
        self.0
    }

    /// Minutes since midnight.
    pub fn minutes(&self) -> u32 {
        self.0.hour() * 60 + self.0.minute()
    }
}

impl From<NaiveTime> for ClockTime {
    fn from(t: NaiveTime) -> Self {
        // Availability is minute-granular.
        ClockTime(t.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(t))
    }
}

impl TryFrom<String> for ClockTime {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ClockTime::parse(&value)
    }
}

impl From<ClockTime> for String {
    fn from(t: ClockTime) -> Self {
        t.to_string()
    }
}

impl std::fmt::Display for ClockTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

/// The school's local time, as a fixed offset from UTC.
///
/// Availability windows are wall-clock times in this zone; bookings are
/// stored as UTC instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchoolTimezone {
    offset: FixedOffset,
}

impl SchoolTimezone {
    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    /// Offset in minutes east of UTC; `None` if beyond ±24h.
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(|offset| Self { offset })
    }

    /// UTC instant of a local date and wall-clock time.
    pub fn to_utc(&self, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
        self.offset
            .from_local_datetime(&date.and_time(time))
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// First UTC instant of a local date.
    pub fn start_of_day(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        self.to_utc(date, NaiveTime::MIN)
    }

    /// Exclusive UTC end of a local date.
    pub fn end_of_day(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        self.start_of_day(date).map(|start| start + Duration::days(1))
    }

    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    pub fn local_time(&self, instant: DateTime<Utc>) -> NaiveTime {
        instant.with_timezone(&self.offset).time()
    }
}

impl Default for SchoolTimezone {
    fn default() -> Self {
        Self::utc()
    }
}

#[cfg(test)]
#[path = "time_tests.rs"]
mod time_tests;
