//! Prayer schedule collision checker
//!
//! Pure functions over weekly time windows. Two windows collide when they
//! fall on the same weekday and their half-open intervals overlap, so a
//! window ending at 09:00 and one starting at 09:00 sit side by side.
//!
//! Callers load persisted schedules themselves and pass them in; nothing
//! here touches the database.

use std::collections::BTreeMap;

use chrono::NaiveTime;

use crate::models::prayer_chain::{CollisionReport, PersistedSlot, ScheduleSlot, Weekday};

/// True iff `[s1, e1)` and `[s2, e2)` share at least one instant
pub fn windows_overlap(s1: NaiveTime, e1: NaiveTime, s2: NaiveTime, e2: NaiveTime) -> bool {
    s1 < e2 && e1 > s2
}

/// Same weekday and overlapping windows
pub fn slots_collide(a: &ScheduleSlot, b: &ScheduleSlot) -> bool {
    a.day == b.day && windows_overlap(a.start_time, a.end_time, b.start_time, b.end_time)
}

/// Tracks which batch positions are conflicting, in the order first flagged.
struct Flags {
    flagged: Vec<bool>,
    order: Vec<usize>,
}

impl Flags {
    fn new(len: usize) -> Self {
        Self {
            flagged: vec![false; len],
            order: Vec::new(),
        }
    }

    fn flag(&mut self, index: usize) {
        if !self.flagged[index] {
            self.flagged[index] = true;
            self.order.push(index);
        }
    }

    fn is_flagged(&self, index: usize) -> bool {
        self.flagged[index]
    }

    fn into_report(self, slots: &[ScheduleSlot], details: Vec<String>) -> CollisionReport {
        let valid_schedules = slots
            .iter()
            .enumerate()
            .filter(|(index, _)| !self.flagged[*index])
            .map(|(_, slot)| *slot)
            .collect();
        let conflicting_schedules = self.order.iter().map(|&index| slots[index]).collect();

        CollisionReport {
            has_collision: !details.is_empty(),
            collision_details: (!details.is_empty()).then_some(details),
            valid_schedules,
            conflicting_schedules,
        }
    }
}

/// Check a submitted batch against itself.
///
/// Malformed windows (start not before end) are reported and left out of the
/// pairwise comparison. Remaining slots are compared pairwise within each day,
/// days taken in the order they first appear in the batch.
pub fn validate_batch(slots: &[ScheduleSlot]) -> CollisionReport {
    let mut flags = Flags::new(slots.len());
    let mut details = Vec::new();

    for (index, slot) in slots.iter().enumerate() {
        if !slot.is_well_formed() {
            details.push(format!(
                "Schedule {}: start time must be before end time",
                index + 1
            ));
            flags.flag(index);
        }
    }

    let mut by_day: Vec<(Weekday, Vec<usize>)> = Vec::new();
    for (index, slot) in slots.iter().enumerate() {
        if flags.is_flagged(index) {
            continue;
        }
        match by_day.iter_mut().find(|(day, _)| *day == slot.day) {
            Some((_, indices)) => indices.push(index),
            None => by_day.push((slot.day, vec![index])),
        }
    }

    for (day, indices) in &by_day {
        for (position, &i) in indices.iter().enumerate() {
            for &j in &indices[position + 1..] {
                let (a, b) = (&slots[i], &slots[j]);
                if windows_overlap(a.start_time, a.end_time, b.start_time, b.end_time) {
                    details.push(format!(
                        "Schedule collision on {}: Schedule {} ({}-{}) overlaps with Schedule {} ({}-{})",
                        day,
                        i + 1,
                        format_time(a.start_time),
                        format_time(a.end_time),
                        j + 1,
                        format_time(b.start_time),
                        format_time(b.end_time),
                    ));
                    flags.flag(i);
                    flags.flag(j);
                }
            }
        }
    }

    flags.into_report(slots, details)
}

/// Check a batch against itself and then against the chain's stored schedules.
///
/// `exclude_id` skips one stored schedule, used when a schedule is being
/// replaced by its own updated window.
pub fn check_against_persisted(
    slots: &[ScheduleSlot],
    existing: &[PersistedSlot],
    exclude_id: Option<i64>,
) -> CollisionReport {
    let batch = validate_batch(slots);
    if batch.has_collision {
        return batch;
    }

    let mut flags = Flags::new(slots.len());
    let mut details = Vec::new();

    for (index, slot) in slots.iter().enumerate() {
        for stored in existing
            .iter()
            .filter(|stored| Some(stored.id) != exclude_id && stored.day == slot.day)
        {
            if windows_overlap(slot.start_time, slot.end_time, stored.start_time, stored.end_time) {
                details.push(format!(
                    "Schedule {} ({}-{}) on {} collides with existing schedule ({}-{})",
                    index + 1,
                    format_time(slot.start_time),
                    format_time(slot.end_time),
                    slot.day,
                    format_time(stored.start_time),
                    format_time(stored.end_time),
                ));
                flags.flag(index);
            }
        }
    }

    flags.into_report(slots, details)
}

/// `HH:MM`, dropping any seconds
pub fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Human readable range, e.g. `08:00 - 09:30`
pub fn format_time_range(start: NaiveTime, end: NaiveTime) -> String {
    format!("{} - {}", format_time(start), format_time(end))
}

/// Ranges per weekday, days in week order and ranges in input order
pub fn schedule_summary(slots: &[ScheduleSlot]) -> BTreeMap<Weekday, Vec<String>> {
    let mut summary: BTreeMap<Weekday, Vec<String>> = BTreeMap::new();
    for slot in slots {
        summary
            .entry(slot.day)
            .or_default()
            .push(format_time_range(slot.start_time, slot.end_time));
    }
    summary
}
