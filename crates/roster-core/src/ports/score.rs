//! PriorityScoreProvider port - 参加者ごとのランキングスコア
//!
//! スコアは保存せず、割り当て計算のたびに取得します（キャッシュしない）。

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::ParticipantId;

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("score lookup failed: {0}")]
    Unavailable(String),
}

/// PriorityScoreProvider は参加者の現在のスコアを返す
///
/// # 設計原則
/// - `Ok(None)` はスコアなし（最低スコア 0 として扱う）
/// - `Err` はトランザクションを中断させる（既定値で埋めない）
#[async_trait]
pub trait PriorityScoreProvider: Send + Sync {
    async fn score(&self, participant: ParticipantId) -> Result<Option<f64>, ScoreError>;
}
