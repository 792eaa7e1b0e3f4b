//! App - アプリケーション層
//!
//! ports と allocation を組み合わせて登録ライフサイクルを実装します。
//!
//! # 主要コンポーネント
//! - **ServiceBuilder**: サービスの構築とワイヤリング
//! - **SignupService**: join / leave / template・group 数変更 / recompute
//! - **ConflictRetryPolicy**: commit 競合時の再試行方針
//! - **status**: 表示用の roster スナップショット

pub mod builder;
pub mod config;
pub mod retry;
pub mod service;
pub mod status;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, ServiceBuilder};
pub use self::config::ServiceConfig;
pub use self::retry::ConflictRetryPolicy;
pub use self::service::{JoinOutcome, LeaveOutcome, Placement, SignupService};
pub use self::status::{BucketView, RosterCounts, RosterEntry, RosterView, load_roster};
