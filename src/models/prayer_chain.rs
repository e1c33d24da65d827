//! Prayer Chain Model
//!
//! A prayer chain is a weekly recurring set of prayer slots assigned to one
//! family. Slots are wall-clock windows on a day of the week; any UTC offset
//! supplied by a client is dropped and the local clock value kept.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum::Display;

use super::user::{FamilyCategory, Gender, Role};

/// Day of the week a prayer slot recurs on. Ordered Monday first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type, Display,
)]
#[sqlx(type_name = "text")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

/// One weekly time window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSlot {
    pub day: Weekday,
    #[serde(with = "wall_clock")]
    pub start_time: NaiveTime,
    #[serde(with = "wall_clock")]
    pub end_time: NaiveTime,
}

impl ScheduleSlot {
    pub fn new(day: Weekday, start_time: NaiveTime, end_time: NaiveTime) -> Self {
        Self {
            day,
            start_time,
            end_time,
        }
    }

    /// A window must start strictly before it ends
    pub fn is_well_formed(&self) -> bool {
        self.start_time < self.end_time
    }
}

/// A schedule already stored for the chain being checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct PersistedSlot {
    pub id: i64,
    pub day: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Outcome of a collision check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollisionReport {
    pub has_collision: bool,
    pub collision_details: Option<Vec<String>>,
    pub valid_schedules: Vec<ScheduleSlot>,
    pub conflicting_schedules: Vec<ScheduleSlot>,
}

impl CollisionReport {
    pub fn details(&self) -> &[String] {
        self.collision_details.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct PrayerChain {
    pub id: i64,
    pub family_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PrayerSchedule {
    pub id: i64,
    pub prayer_chain_id: i64,
    pub day: Weekday,
    #[serde(with = "wall_clock")]
    pub start_time: NaiveTime,
    #[serde(with = "wall_clock")]
    pub end_time: NaiveTime,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Account attached to a family, as shown on a prayer chain
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FamilyMemberInfo {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub gender: Gender,
    pub phone: String,
    pub role: Role,
    pub other: Option<String>,
    pub profile_pic: Option<String>,
    pub biography: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FamilyDetails {
    pub id: i64,
    pub category: FamilyCategory,
    pub name: String,
    pub pere: Option<FamilyMemberInfo>,
    pub mere: Option<FamilyMemberInfo>,
    pub members: Vec<FamilyMemberInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrayerChainResponse {
    pub id: i64,
    pub family_id: i64,
    pub family_name: String,
    pub family_details: FamilyDetails,
    pub schedules: Vec<PrayerSchedule>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePrayerChainRequest {
    pub family_id: i64,
    #[serde(default)]
    pub schedules: Vec<ScheduleSlot>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePrayerChainRequest {
    pub family_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateScheduleRequest {
    pub day: Option<Weekday>,
    #[serde(default, deserialize_with = "wall_clock::deserialize_option")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, deserialize_with = "wall_clock::deserialize_option")]
    pub end_time: Option<NaiveTime>,
}

impl UpdateScheduleRequest {
    pub fn touches_window(&self) -> bool {
        self.day.is_some() || self.start_time.is_some() || self.end_time.is_some()
    }
}

/// Dry-run collision check
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleCheckRequest {
    pub prayer_chain_id: Option<i64>,
    pub schedules: Vec<ScheduleSlot>,
}

/// Parse a wall-clock time, dropping any UTC offset.
///
/// Accepts `HH:MM`, `HH:MM:SS`, `HH:MM:SS.ffffff`, an optional `Z` or
/// `±HH:MM` suffix, and full `YYYY-MM-DDTHH:MM:SS` datetimes.
pub fn parse_wall_clock(input: &str) -> Result<NaiveTime, String> {
    let trimmed = input.trim();
    let time_part = match trimmed.split_once(['T', ' ']) {
        Some((_, time)) => time,
        None => trimmed,
    };
    let wall = strip_offset(time_part);

    ["%H:%M:%S%.f", "%H:%M"]
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(wall, format).ok())
        .ok_or_else(|| format!("invalid time '{}', expected HH:MM or HH:MM:SS", input))
}

fn strip_offset(time: &str) -> &str {
    if let Some(rest) = time.strip_suffix(['Z', 'z']) {
        return rest;
    }
    // Offsets start after the "HH:MM" prefix
    match time.rfind(['+', '-']) {
        Some(pos) if pos >= 5 => &time[..pos],
        _ => time,
    }
}

/// Serde adapter for wall-clock times: lenient input, `HH:MM:SS` output
pub mod wall_clock {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M:%S").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_wall_clock(&raw).map_err(de::Error::custom)
    }

    pub fn deserialize_option<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveTime>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => super::parse_wall_clock(&raw).map(Some).map_err(de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_parse_wall_clock_formats() {
        assert_eq!(parse_wall_clock("08:00").unwrap(), t(8, 0));
        assert_eq!(parse_wall_clock("08:00:00").unwrap(), t(8, 0));
        assert_eq!(
            parse_wall_clock("08:00:30.250").unwrap(),
            NaiveTime::from_hms_milli_opt(8, 0, 30, 250).unwrap()
        );
        assert_eq!(parse_wall_clock(" 21:15 ").unwrap(), t(21, 15));
    }

    #[test]
    fn test_parse_wall_clock_drops_offsets() {
        assert_eq!(parse_wall_clock("08:00:00Z").unwrap(), t(8, 0));
        assert_eq!(parse_wall_clock("08:00:00+02:00").unwrap(), t(8, 0));
        assert_eq!(parse_wall_clock("08:00-05:00").unwrap(), t(8, 0));
        assert_eq!(parse_wall_clock("2024-05-01T18:30:00+02:00").unwrap(), t(18, 30));
    }

    #[test]
    fn test_parse_wall_clock_rejects_garbage() {
        assert!(parse_wall_clock("8 o'clock").is_err());
        assert!(parse_wall_clock("25:00").is_err());
        assert!(parse_wall_clock("").is_err());
    }

    #[test]
    fn test_slot_serde() {
        let slot: ScheduleSlot =
            serde_json::from_str(r#"{"day":"Friday","start_time":"06:00","end_time":"07:30+01:00"}"#)
                .unwrap();
        assert_eq!(slot, ScheduleSlot::new(Weekday::Friday, t(6, 0), t(7, 30)));

        let json = serde_json::to_value(slot).unwrap();
        assert_eq!(json["start_time"], "06:00:00");
        assert_eq!(json["end_time"], "07:30:00");
        assert_eq!(json["day"], "Friday");
    }

    #[test]
    fn test_update_request_partial_times() {
        let request: UpdateScheduleRequest =
            serde_json::from_str(r#"{"end_time":"10:00"}"#).unwrap();
        assert!(request.day.is_none());
        assert!(request.start_time.is_none());
        assert_eq!(request.end_time, Some(t(10, 0)));
        assert!(request.touches_window());
        assert!(!UpdateScheduleRequest::default().touches_window());
    }

    #[test]
    fn test_weekday_order() {
        assert!(Weekday::Monday < Weekday::Sunday);
        assert_eq!(Weekday::Wednesday.to_string(), "Wednesday");
    }
}
