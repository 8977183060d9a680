use crate::{Card, CardId, CoreError, NewCard};
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
pub struct MemoryRepo {
    cards: RwLock<HashMap<CardId, Card>>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a fully-formed card, keeping its id and schedule.
    pub fn seed(&self, card: Card) {
        self.cards.write().insert(card.id, card);
    }

    fn sorted(&self, keep: impl Fn(&Card) -> bool) -> Vec<Card> {
        let mut v: Vec<Card> = self.cards.read().values().filter(|c| keep(c)).cloned().collect();
        v.sort_by_key(|c| (c.created_at, c.id));
        v
    }
}

#[async_trait]
impl crate::repo::Repository for MemoryRepo {
    async fn add_card(&self, card: NewCard) -> Result<Card, CoreError> {
        let card = card.into_card();
        self.cards.write().insert(card.id, card.clone());
        Ok(card)
    }

    async fn get_card(&self, id: CardId) -> Result<Card, CoreError> {
        self.cards
            .read()
            .get(&id)
            .cloned()
            .ok_or(CoreError::NotFound("card"))
    }

    async fn list_cards(&self) -> Result<Vec<Card>, CoreError> {
        Ok(self.sorted(|_| true))
    }

    async fn find_due(&self, today: NaiveDate) -> Result<Vec<Card>, CoreError> {
        Ok(self.sorted(|c| c.is_due(today)))
    }

    async fn update_card(&self, card: &Card) -> Result<Card, CoreError> {
        let mut m = self.cards.write();
        if !m.contains_key(&card.id) {
            return Err(CoreError::NotFound("card"));
        }
        m.insert(card.id, card.clone());
        Ok(card.clone())
    }

    async fn delete_card(&self, id: CardId) -> Result<(), CoreError> {
        self.cards
            .write()
            .remove(&id)
            .ok_or(CoreError::NotFound("card"))?;
        Ok(())
    }
}
