//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部の協調者（永続ストア、ランキング、表示、時計）への
//! インターフェースで、割り当てロジックから実装の詳細を隠蔽します。

pub mod clock;
pub mod id_generator;
pub mod notifier;
pub mod score;
pub mod store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::notifier::{NotifyError, PresentationNotifier};
pub use self::score::{PriorityScoreProvider, ScoreError};
pub use self::store::{AppointmentStore, StoreError, StoreTransaction};
