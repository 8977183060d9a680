use std::collections::VecDeque;
use std::sync::Arc;

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    demote, promote, Card, CardId, CoreError, Grade, GradingOracle, IntervalModel, Repository,
    ReviewError,
};

#[derive(Clone, Debug, PartialEq)]
pub struct ReviewPolicy {
    pub model: IntervalModel,
    pub shuffle: bool,
}

impl Default for ReviewPolicy {
    fn default() -> Self {
        Self {
            model: IntervalModel::default(),
            shuffle: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ReviewOutcome {
    pub card_id: CardId,
    pub grade: Grade,
    pub feedback: String,
    pub old_level: u32,
    pub new_level: u32,
    pub next_review_date: NaiveDate,
    /// True when the card went to the back of the deck instead of leaving it.
    pub requeued: bool,
}

/// One review pass over the cards that were due when it started.
///
/// The deck is fixed at construction: cards only leave it (answered correctly,
/// or answered wrong while keeping some mastery) or move to its back (answered
/// wrong and bottomed out at level 0). Once empty it stays empty.
pub struct ReviewQueue {
    store: Arc<dyn Repository>,
    oracle: Arc<dyn GradingOracle>,
    model: IntervalModel,
    today: NaiveDate,
    deck: VecDeque<Card>,
}

impl ReviewQueue {
    pub async fn start(
        store: Arc<dyn Repository>,
        oracle: Arc<dyn GradingOracle>,
        policy: ReviewPolicy,
        today: NaiveDate,
    ) -> Result<Self, CoreError> {
        let rng = StdRng::from_rng(&mut rand::rng());
        Self::start_with_rng(store, oracle, policy, today, rng).await
    }

    /// Same as [`ReviewQueue::start`] with a caller-chosen shuffle source.
    pub async fn start_with_rng<R: Rng + Send>(
        store: Arc<dyn Repository>,
        oracle: Arc<dyn GradingOracle>,
        policy: ReviewPolicy,
        today: NaiveDate,
        mut rng: R,
    ) -> Result<Self, CoreError> {
        policy.model.validate()?;
        let mut due = store.find_due(today).await?;
        if policy.shuffle {
            due.shuffle(&mut rng);
        }
        info!(%today, cards = due.len(), shuffled = policy.shuffle, "review pass started");
        Ok(Self {
            store,
            oracle,
            model: policy.model,
            today,
            deck: due.into(),
        })
    }

    pub fn peek_next(&self) -> Option<&Card> {
        self.deck.front()
    }

    pub fn remaining(&self) -> usize {
        self.deck.len()
    }

    pub fn is_drained(&self) -> bool {
        self.deck.is_empty()
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn contains(&self, id: CardId) -> bool {
        self.deck.iter().any(|c| c.id == id)
    }

    /// Grades `answer` for the card at the front of the deck and applies the result.
    ///
    /// Nothing changes unless both the grading call and the store commit succeed;
    /// on error the same card stays at the front.
    pub async fn submit_answer(
        &mut self,
        card_id: CardId,
        answer: &str,
    ) -> Result<ReviewOutcome, ReviewError> {
        let current = self.deck.front().ok_or(ReviewError::Drained)?;
        if current.id != card_id {
            return Err(ReviewError::NotCurrent);
        }

        let verdict = self
            .oracle
            .grade(&current.front, &current.back, answer)
            .await?;
        info!(card_id = %card_id, grade = verdict.grade.as_str(), "answer graded");

        let mut updated = current.clone();
        let transition = match verdict.grade {
            Grade::Correct => promote(&mut updated, &self.model, self.today),
            Grade::Incorrect => demote(&mut updated, &self.model, self.today),
        };
        let requeue = verdict.grade == Grade::Incorrect && updated.mastery_level == 0;

        let committed = self.store.update_card(&updated).await?;

        self.deck.pop_front();
        if requeue {
            debug!(card_id = %card_id, "card bottomed out, requeued");
            self.deck.push_back(committed);
        }

        Ok(ReviewOutcome {
            card_id,
            grade: verdict.grade,
            feedback: verdict.feedback,
            old_level: transition.old_level,
            new_level: transition.new_level,
            next_review_date: transition.next_review_date,
            requeued: requeue,
        })
    }
}
