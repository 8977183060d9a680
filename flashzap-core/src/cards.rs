use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{set_level, validate_field, Card, CardId, CoreError, Field, IntervalModel, NewCard, Repository};

pub const DEFAULT_PER_PAGE: usize = 30;

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based.
    pub page: usize,
    pub per_page: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CardPage {
    pub cards: Vec<Card>,
    pub total: usize,
    pub page: usize,
    pub total_pages: usize,
}

impl CardPage {
    pub fn from_cards(all: Vec<Card>, req: PageRequest) -> Self {
        let per_page = req.per_page.max(1);
        let page = req.page.max(1);
        let total = all.len();
        let total_pages = total.div_ceil(per_page);
        let cards = all
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .collect();
        Self {
            cards,
            total,
            page,
            total_pages,
        }
    }
}

pub async fn add_card<R: Repository + ?Sized>(
    repo: &R,
    front: &str,
    back: &str,
) -> Result<Card, CoreError> {
    let card = repo.add_card(NewCard::new(front, back)?).await?;
    info!(card_id = %card.id, "card added");
    Ok(card)
}

pub async fn list_page<R: Repository + ?Sized>(repo: &R, req: PageRequest) -> Result<CardPage, CoreError> {
    Ok(CardPage::from_cards(repo.list_cards().await?, req))
}

/// Any combination of field edits, applied as a single commit.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct CardChanges {
    pub front: Option<String>,
    pub back: Option<String>,
    /// May only lower the level; a level is only earned through review.
    pub mastery_level: Option<u32>,
}

impl CardChanges {
    pub fn is_empty(&self) -> bool {
        self.front.is_none() && self.back.is_none() && self.mastery_level.is_none()
    }
}

/// Checks every change before writing any, so a refused edit leaves the card
/// as it was. Lowering the level re-derives the due date with it.
pub async fn edit_card<R: Repository + ?Sized>(
    repo: &R,
    id: CardId,
    changes: CardChanges,
    model: &IntervalModel,
    today: NaiveDate,
) -> Result<Card, CoreError> {
    if let Some(front) = &changes.front {
        validate_field(front, Field::Front)?;
    }
    if let Some(back) = &changes.back {
        validate_field(back, Field::Back)?;
    }
    let mut card = repo.get_card(id).await?;
    if let Some(level) = changes.mastery_level {
        if level > card.mastery_level {
            return Err(CoreError::Conflict("mastery level can only be lowered"));
        }
    }

    if let Some(front) = changes.front {
        card.front = front;
    }
    if let Some(back) = changes.back {
        card.back = back;
    }
    if let Some(level) = changes.mastery_level {
        let t = set_level(&mut card, level, model, today);
        info!(card_id = %id, old_level = t.old_level, new_level = t.new_level, "mastery lowered");
    }
    repo.update_card(&card).await
}

pub async fn edit_front<R: Repository + ?Sized>(repo: &R, id: CardId, front: &str) -> Result<Card, CoreError> {
    validate_field(front, Field::Front)?;
    let mut card = repo.get_card(id).await?;
    card.front = front.to_string();
    repo.update_card(&card).await
}

pub async fn edit_back<R: Repository + ?Sized>(repo: &R, id: CardId, back: &str) -> Result<Card, CoreError> {
    validate_field(back, Field::Back)?;
    let mut card = repo.get_card(id).await?;
    card.back = back.to_string();
    repo.update_card(&card).await
}

pub async fn lower_mastery<R: Repository + ?Sized>(
    repo: &R,
    id: CardId,
    level: u32,
    model: &IntervalModel,
    today: NaiveDate,
) -> Result<Card, CoreError> {
    let changes = CardChanges {
        mastery_level: Some(level),
        ..CardChanges::default()
    };
    edit_card(repo, id, changes, model, today).await
}

pub async fn delete_card<R: Repository + ?Sized>(repo: &R, id: CardId) -> Result<(), CoreError> {
    repo.delete_card(id).await?;
    info!(card_id = %id, "card deleted");
    Ok(())
}
