use chrono::NaiveDate;

use crate::models::{BreakTime, DayOfWeek, Slot, WallTime, WeeklyTemplate};

/// Turns a weekly template into the concrete slots of one calendar date.
///
/// Projection is pure and synchronous. Available intervals of the date's
/// weekday have the break cut out of them and are then split into
/// `default_slot_duration` pieces; a trailing piece shorter than the
/// duration is kept, zero-length pieces are dropped.
pub struct SlotProjector;

impl SlotProjector {
    pub fn project(template: &WeeklyTemplate, date: NaiveDate) -> Vec<Slot> {
        let day = template.day(DayOfWeek::of(date));
        if !day.is_working_day || day.time_slots.is_empty() {
            return Vec::new();
        }

        let step = template.default_slot_duration.max(1);

        let mut slots: Vec<Slot> = day
            .time_slots
            .iter()
            .filter(|interval| interval.is_available)
            .flat_map(|interval| {
                subtract_break(interval.start_time.minutes(), interval.end_time.minutes(), template.break_time.as_ref())
            })
            .flat_map(|(start, end)| split(start, end, step))
            .collect();

        slots.sort_by_key(|slot| slot.start_time);
        slots
    }
}

/// Removes the break from `[start, end)`, leaving zero, one or two pieces.
fn subtract_break(start: u32, end: u32, break_time: Option<&BreakTime>) -> Vec<(u32, u32)> {
    let Some(break_time) = break_time else {
        return vec![(start, end)];
    };
    let (break_start, break_end) = (break_time.start.minutes(), break_time.end.minutes());

    if break_end <= start || break_start >= end {
        return vec![(start, end)];
    }

    let mut pieces = Vec::with_capacity(2);
    if start < break_start {
        pieces.push((start, break_start));
    }
    if break_end < end {
        pieces.push((break_end, end));
    }
    pieces
}

fn split(start: u32, end: u32, step: u32) -> Vec<Slot> {
    let mut slots = Vec::new();
    if step == 0 {
        return slots;
    }
    let mut cursor = start;
    while cursor < end {
        let next = (cursor + step).min(end);
        if let (Some(start_time), Some(end_time)) = (WallTime::from_minutes(cursor), WallTime::from_minutes(next)) {
            slots.push(Slot { start_time, end_time });
        }
        cursor = next;
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DaySchedule, TimeSlot};
    use uuid::Uuid;

    fn t(s: &str) -> WallTime {
        s.parse().unwrap()
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn template_with_monday(slots: Vec<TimeSlot>, duration: u32, break_time: Option<(&str, &str)>) -> WeeklyTemplate {
        let mut template = WeeklyTemplate::default_for(Uuid::new_v4());
        template.default_slot_duration = duration;
        template.break_time = break_time.map(|(start, end)| BreakTime { start: t(start), end: t(end) });
        template
            .weekly_schedule
            .replace(DaySchedule::working(DayOfWeek::Monday, slots));
        template
    }

    fn starts(slots: &[Slot]) -> Vec<String> {
        slots.iter().map(|s| format!("{}-{}", s.start_time, s.end_time)).collect()
    }

    #[test]
    fn splits_around_break() {
        let template = template_with_monday(
            vec![TimeSlot::new(t("09:00"), t("12:00"))],
            30,
            Some(("10:00", "10:30")),
        );

        let slots = SlotProjector::project(&template, monday());
        assert_eq!(
            starts(&slots),
            vec!["09:00-09:30", "09:30-10:00", "10:30-11:00", "11:00-11:30", "11:30-12:00"]
        );
    }

    #[test]
    fn non_working_day_is_empty() {
        let template = template_with_monday(vec![TimeSlot::new(t("09:00"), t("12:00"))], 30, None);
        let tuesday = monday().succ_opt().unwrap();
        assert!(SlotProjector::project(&template, tuesday).is_empty());
    }

    #[test]
    fn working_day_without_intervals_is_empty() {
        let template = template_with_monday(Vec::new(), 30, None);
        assert!(SlotProjector::project(&template, monday()).is_empty());
    }

    #[test]
    fn interval_inside_break_is_dropped() {
        let template = template_with_monday(
            vec![
                TimeSlot::new(t("09:00"), t("10:00")),
                TimeSlot::new(t("13:00"), t("14:00")),
            ],
            60,
            Some(("12:30", "14:00")),
        );

        let slots = SlotProjector::project(&template, monday());
        assert_eq!(starts(&slots), vec!["09:00-10:00"]);
    }

    #[test]
    fn unavailable_intervals_are_skipped() {
        let mut closed = TimeSlot::new(t("09:00"), t("10:00"));
        closed.is_available = false;
        let template = template_with_monday(vec![closed, TimeSlot::new(t("10:00"), t("11:00"))], 60, None);

        let slots = SlotProjector::project(&template, monday());
        assert_eq!(starts(&slots), vec!["10:00-11:00"]);
    }

    #[test]
    fn partial_break_overlap_keeps_short_remainder() {
        let template = template_with_monday(
            vec![TimeSlot::new(t("09:00"), t("11:00"))],
            60,
            Some(("10:15", "10:30")),
        );

        let slots = SlotProjector::project(&template, monday());
        assert_eq!(starts(&slots), vec!["09:00-10:00", "10:00-10:15", "10:30-11:00"]);
    }

    #[test]
    fn output_is_sorted_by_start() {
        let template = template_with_monday(
            vec![
                TimeSlot::new(t("15:00"), t("16:00")),
                TimeSlot::new(t("08:00"), t("09:00")),
            ],
            60,
            None,
        );

        let slots = SlotProjector::project(&template, monday());
        assert_eq!(starts(&slots), vec!["08:00-09:00", "15:00-16:00"]);
    }

    #[test]
    fn zero_duration_projects_nothing() {
        let template = template_with_monday(vec![TimeSlot::new(t("09:00"), t("10:00"))], 0, None);
        assert!(SlotProjector::project(&template, monday()).is_empty());
    }
}
