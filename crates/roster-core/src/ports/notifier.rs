//! PresentationNotifier port - 公開表示の再描画
//!
//! 変更操作が commit に成功した後、appointment ごとに 1 回呼ばれます。
//! 通知側は store から最新の状態を読み直して表示を作り直します。

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::AppointmentId;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("republish failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait PresentationNotifier: Send + Sync {
    async fn republish(&self, appointment: AppointmentId) -> Result<(), NotifyError>;
}
