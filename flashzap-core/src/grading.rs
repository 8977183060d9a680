use async_trait::async_trait;

use crate::{OracleError, Verdict};

/// External judge of whether a candidate answer means the same as the reference.
#[async_trait]
pub trait GradingOracle: Send + Sync {
    async fn grade(
        &self,
        question: &str,
        reference_answer: &str,
        candidate_answer: &str,
    ) -> Result<Verdict, OracleError>;
}
