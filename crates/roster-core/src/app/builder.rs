//! ServiceBuilder - SignupService の構築とワイヤリング
//!
//! # 方針
//! - 必須の port（store, scores）が欠けていれば build() で失敗（Fail-fast）
//! - 任意の port は開発用の実装で補う

use std::sync::Arc;

use super::config::ServiceConfig;
use super::service::SignupService;
use crate::impls::NoopNotifier;
use crate::ports::{
    AppointmentStore, Clock, IdGenerator, PresentationNotifier, PriorityScoreProvider,
    SystemClock, UlidGenerator,
};

/// ServiceBuilder は SignupService を構築
///
/// # 使用例
/// ```ignore
/// let service = ServiceBuilder::new()
///     .store(Arc::new(store))
///     .scores(Arc::new(scores))
///     .notifier(Arc::new(discord))
///     .build()?;
/// ```
///
/// # デフォルト
/// - notifier: NoopNotifier
/// - clock: SystemClock
/// - ids: clock を使う UlidGenerator
/// - config: ServiceConfig::default()
#[derive(Default)]
pub struct ServiceBuilder {
    store: Option<Arc<dyn AppointmentStore>>,
    scores: Option<Arc<dyn PriorityScoreProvider>>,
    notifier: Option<Arc<dyn PresentationNotifier>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    config: ServiceConfig,
}

/// BuildError はサービス構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing port: {0}. It has no default and must be provided.")]
    MissingPort(&'static str),
}

impl ServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(mut self, store: Arc<dyn AppointmentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn scores(mut self, scores: Arc<dyn PriorityScoreProvider>) -> Self {
        self.scores = Some(scores);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn PresentationNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// # 検証
    /// - store と scores が設定されているかチェック
    /// - 不足があれば BuildError::MissingPort を返す
    pub fn build(self) -> Result<SignupService, BuildError> {
        let store = self.store.ok_or(BuildError::MissingPort("store"))?;
        let scores = self.scores.ok_or(BuildError::MissingPort("scores"))?;
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let ids: Arc<dyn IdGenerator> = match self.ids {
            Some(ids) => ids,
            None => Arc::new(UlidGenerator::new(Arc::clone(&clock))),
        };

        Ok(SignupService {
            store,
            scores,
            notifier: self.notifier.unwrap_or_else(|| Arc::new(NoopNotifier)),
            clock,
            ids,
            config: self.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{InMemoryAppointmentStore, ScoreTable};

    #[test]
    fn test_build_success() {
        let service = ServiceBuilder::new()
            .store(Arc::new(InMemoryAppointmentStore::new()))
            .scores(Arc::new(ScoreTable::new()))
            .build();

        assert!(service.is_ok());
    }

    #[test]
    fn test_build_missing_store() {
        let service = ServiceBuilder::new()
            .scores(Arc::new(ScoreTable::new()))
            .build();

        assert!(matches!(service, Err(BuildError::MissingPort("store"))));
    }

    #[test]
    fn test_build_missing_scores() {
        let service = ServiceBuilder::new()
            .store(Arc::new(InMemoryAppointmentStore::new()))
            .build();

        assert!(matches!(service, Err(BuildError::MissingPort("scores"))));
    }

    #[test]
    fn test_build_keeps_config() {
        let config = ServiceConfig {
            max_role_choices: 3,
            ..ServiceConfig::default()
        };

        let service = ServiceBuilder::new()
            .store(Arc::new(InMemoryAppointmentStore::new()))
            .scores(Arc::new(ScoreTable::new()))
            .config(config.clone())
            .build()
            .unwrap();

        assert_eq!(service.config(), &config);
    }
}
