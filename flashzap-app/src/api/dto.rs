use chrono::{DateTime, NaiveDate, Utc};
use flashzap_core::{Card, CardPage, Grade, ReviewOutcome};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize)]
pub struct CardOut {
    pub id: Uuid,
    pub front: String,
    pub back: String,
    pub mastery_level: u32,
    pub next_review_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl From<Card> for CardOut {
    fn from(c: Card) -> Self {
        Self {
            id: c.id,
            front: c.front,
            back: c.back,
            mastery_level: c.mastery_level,
            next_review_date: c.next_review_date,
            created_at: c.created_at,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct CardPageOut {
    pub cards: Vec<CardOut>,
    pub total: usize,
    pub page: usize,
    pub total_pages: usize,
}

impl From<CardPage> for CardPageOut {
    fn from(p: CardPage) -> Self {
        Self {
            cards: p.cards.into_iter().map(CardOut::from).collect(),
            total: p.total,
            page: p.page,
            total_pages: p.total_pages,
        }
    }
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

#[derive(Deserialize)]
pub struct CardIn {
    pub front: String,
    pub back: String,
}

#[derive(Serialize, Deserialize)]
pub struct ImportOut {
    pub imported: usize,
}

/// The question side only; the answer stays hidden until graded.
#[derive(Serialize, Deserialize)]
pub struct PromptOut {
    pub card_id: Uuid,
    pub front: String,
    pub mastery_level: u32,
}

impl From<&Card> for PromptOut {
    fn from(c: &Card) -> Self {
        Self {
            card_id: c.id,
            front: c.front.clone(),
            mastery_level: c.mastery_level,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct SessionOut {
    /// Absent when nothing was due and no session was opened.
    pub session_id: Option<Uuid>,
    pub remaining: usize,
    pub card: Option<PromptOut>,
}

#[derive(Deserialize)]
pub struct AnswerIn {
    pub card_id: Uuid,
    pub answer: String,
}

#[derive(Serialize, Deserialize)]
pub struct AnswerOut {
    pub card_id: Uuid,
    pub grade: Grade,
    pub feedback: String,
    pub correct_answer: String,
    pub old_level: u32,
    pub new_level: u32,
    pub next_review_date: NaiveDate,
    pub requeued: bool,
    pub remaining: usize,
    pub next: Option<PromptOut>,
}

impl AnswerOut {
    pub fn new(out: ReviewOutcome, correct_answer: String, remaining: usize, next: Option<PromptOut>) -> Self {
        Self {
            card_id: out.card_id,
            grade: out.grade,
            feedback: out.feedback,
            correct_answer,
            old_level: out.old_level,
            new_level: out.new_level,
            next_review_date: out.next_review_date,
            requeued: out.requeued,
            remaining,
            next,
        }
    }
}
