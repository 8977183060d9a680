use chrono::{Days, NaiveDate};
use serde::Serialize;
use tracing::info;

use crate::{Card, IntervalModel};

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct Transition {
    pub old_level: u32,
    pub new_level: u32,
    pub day_offset: u64,
    pub next_review_date: NaiveDate,
}

/// One level up, then reschedule from the new level.
pub fn promote(card: &mut Card, model: &IntervalModel, today: NaiveDate) -> Transition {
    let old_level = card.mastery_level;
    card.mastery_level = old_level.saturating_add(1);
    let t = reschedule(card, old_level, model, today);
    info!(card_id = %card.id, old_level, new_level = t.new_level, days = t.day_offset, "promoted card");
    t
}

/// One level down with a floor at zero. The due date is recomputed even when
/// the level is already at the floor.
pub fn demote(card: &mut Card, model: &IntervalModel, today: NaiveDate) -> Transition {
    let old_level = card.mastery_level;
    card.mastery_level = old_level.saturating_sub(1);
    let t = reschedule(card, old_level, model, today);
    info!(card_id = %card.id, old_level, new_level = t.new_level, days = t.day_offset, "demoted card");
    t
}

/// Sets `mastery_level` to `level` and re-derives the due date with it.
pub fn set_level(card: &mut Card, level: u32, model: &IntervalModel, today: NaiveDate) -> Transition {
    let old_level = card.mastery_level;
    card.mastery_level = level;
    reschedule(card, old_level, model, today)
}

fn reschedule(card: &mut Card, old_level: u32, model: &IntervalModel, today: NaiveDate) -> Transition {
    let day_offset = model.day_offset(card.mastery_level);
    let next = due_date(today, day_offset);
    card.next_review_date = Some(next);
    Transition {
        old_level,
        new_level: card.mastery_level,
        day_offset,
        next_review_date: next,
    }
}

/// `today + days`, pinned to the last representable date on overflow.
pub fn due_date(today: NaiveDate, days: u64) -> NaiveDate {
    today.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX)
}
