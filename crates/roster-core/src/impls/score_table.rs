//! ScoreTable - 固定スコア表（開発・テスト用の PriorityScoreProvider）

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::ParticipantId;
use crate::ports::{PriorityScoreProvider, ScoreError};

/// Participant → score map. Unknown participants have no score.
#[derive(Debug, Default)]
pub struct ScoreTable {
    scores: RwLock<HashMap<ParticipantId, f64>>,
    failing: RwLock<HashSet<ParticipantId>>,
}

impl ScoreTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, participant: ParticipantId, score: f64) {
        self.scores
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(participant, score);
    }

    /// Lookups for `participant` fail until [`ScoreTable::recover`] is called.
    pub fn fail_for(&self, participant: ParticipantId) {
        self.failing
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(participant);
    }

    pub fn recover(&self, participant: ParticipantId) {
        self.failing
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&participant);
    }
}

#[async_trait]
impl PriorityScoreProvider for ScoreTable {
    async fn score(&self, participant: ParticipantId) -> Result<Option<f64>, ScoreError> {
        if self
            .failing
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&participant)
        {
            return Err(ScoreError::Unavailable(format!(
                "no ranking for {participant}"
            )));
        }
        Ok(self
            .scores
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&participant)
            .copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_participant_has_no_score() {
        let table = ScoreTable::new();
        let known = ParticipantId::random();
        table.set(known, 42.0);

        assert_eq!(table.score(known).await.unwrap(), Some(42.0));
        assert_eq!(table.score(ParticipantId::random()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn failing_participant_errors_until_recovered() {
        let table = ScoreTable::new();
        let p = ParticipantId::random();
        table.fail_for(p);

        assert!(table.score(p).await.is_err());
        table.recover(p);
        assert!(table.score(p).await.is_ok());
    }
}
