use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

pub type CardId = Uuid;

/// Upper bound on `front` and `back`, counted in chars.
pub const MAX_FIELD_CHARS: usize = 200;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    pub id: CardId,
    pub front: String,
    pub back: String,

    /// Only the scheduler writes this, always together with `next_review_date`.
    pub mastery_level: u32,
    /// `None` until the card has been reviewed once.
    pub next_review_date: Option<NaiveDate>,

    pub created_at: DateTime<Utc>,
}

impl Card {
    pub fn new(front: impl Into<String>, back: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            front: front.into(),
            back: back.into(),
            mastery_level: 0,
            next_review_date: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_new(&self) -> bool {
        self.next_review_date.is_none()
    }

    pub fn is_due(&self, today: NaiveDate) -> bool {
        match self.next_review_date {
            None => true,
            Some(d) => d <= today,
        }
    }
}

/// Validated input for creating a card.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewCard {
    pub front: String,
    pub back: String,
}

impl NewCard {
    pub fn new(front: impl Into<String>, back: impl Into<String>) -> Result<Self, CoreError> {
        let front = front.into();
        let back = back.into();
        validate_field(&front, Field::Front)?;
        validate_field(&back, Field::Back)?;
        Ok(Self { front, back })
    }

    pub fn into_card(self) -> Card {
        Card::new(self.front, self.back)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Front,
    Back,
}

impl Field {
    fn empty(self) -> &'static str {
        match self {
            Field::Front => "front is empty",
            Field::Back => "back is empty",
        }
    }

    fn too_long(self) -> &'static str {
        match self {
            Field::Front => "front exceeds 200 characters",
            Field::Back => "back exceeds 200 characters",
        }
    }
}

pub fn validate_field(text: &str, field: Field) -> Result<(), CoreError> {
    if text.trim().is_empty() {
        return Err(CoreError::Invalid(field.empty()));
    }
    if text.chars().count() > MAX_FIELD_CHARS {
        return Err(CoreError::Invalid(field.too_long()));
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Grade {
    Correct,
    Incorrect,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::Correct => "Correct",
            Grade::Incorrect => "Incorrect",
        }
    }

    pub fn parse(s: &str) -> Option<Grade> {
        match s {
            "Correct" => Some(Grade::Correct),
            "Incorrect" => Some(Grade::Incorrect),
            _ => None,
        }
    }
}

/// What the grading oracle returns for one answer. Never persisted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Verdict {
    pub grade: Grade,
    pub feedback: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_card_is_due_on_any_day() {
        let c = Card::new("q", "a");
        assert!(c.is_new());
        assert!(c.is_due(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()));
    }

    #[test]
    fn field_bound_counts_chars_not_bytes() {
        let exactly = "é".repeat(MAX_FIELD_CHARS);
        assert!(NewCard::new(exactly.clone(), "a").is_ok());
        let over = format!("{exactly}x");
        assert!(matches!(NewCard::new(over, "a"), Err(CoreError::Invalid(_))));
        assert!(NewCard::new("q", "   ").is_err());
    }

    #[test]
    fn errors_name_the_offending_field() {
        let long = "x".repeat(MAX_FIELD_CHARS + 1);
        assert!(matches!(validate_field("", Field::Front), Err(CoreError::Invalid("front is empty"))));
        assert!(matches!(validate_field(" ", Field::Back), Err(CoreError::Invalid("back is empty"))));
        assert!(matches!(
            validate_field(&long, Field::Back),
            Err(CoreError::Invalid("back exceeds 200 characters"))
        ));
    }
}
