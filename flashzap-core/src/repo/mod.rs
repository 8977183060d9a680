use crate::{Card, CardId, CoreError, NewCard};
use async_trait::async_trait;
use chrono::NaiveDate;

pub mod memory;
pub use memory::MemoryRepo;

/// Card storage consumed by the review queue and the card commands.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn add_card(&self, card: NewCard) -> Result<Card, CoreError>;
    async fn get_card(&self, id: CardId) -> Result<Card, CoreError>;
    /// All cards, oldest first.
    async fn list_cards(&self) -> Result<Vec<Card>, CoreError>;
    /// Cards never reviewed or due on or before `today`, oldest first.
    async fn find_due(&self, today: NaiveDate) -> Result<Vec<Card>, CoreError>;
    /// Commits an in-place mutation of an existing card.
    async fn update_card(&self, card: &Card) -> Result<Card, CoreError>;
    async fn delete_card(&self, id: CardId) -> Result<(), CoreError>;
}
