//! roster-core
//!
//! Tiered signup roster for scheduled group activities.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, tier, appointment, registration, errors）
//! - **ports**: 抽象化レイヤー（AppointmentStore, PriorityScoreProvider, PresentationNotifier, Clock, IdGenerator）
//! - **allocation**: 割り当てエンジン（bucket ladder, allocate, recompute）
//! - **app**: アプリケーションロジック（builder, service, retry, status）
//! - **impls**: 実装（InMemoryAppointmentStore など開発用）

pub mod allocation;
pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
