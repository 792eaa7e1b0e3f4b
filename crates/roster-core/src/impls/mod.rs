//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryAppointmentStore**: 楽観的並行性制御つきの正本
//! - **ScoreTable**: 固定スコア表
//! - **NoopNotifier / RecordingNotifier**: 表示更新の受け口
//!
//! # 本番用実装
//! データベースやランキング API への接続は別クレートに配置します。

pub mod inmem_store;
pub mod notifier;
pub mod score_table;

pub use self::inmem_store::InMemoryAppointmentStore;
pub use self::notifier::{NoopNotifier, RecordingNotifier};
pub use self::score_table::ScoreTable;
