//! Domain identifiers (strongly-typed IDs).
//!
//! # ULID ベースの ID + ジェネリック実装
//! すべての ID は ULID を内包する `Id<T>` で表現します。
//! `T` は PhantomData のマーカー型で、実行時にはメモリを消費しませんが、
//! `AppointmentId` と `RegistrationId` のような取り違えをコンパイル時に防ぎます。
//!
//! ## ULID の特性
//! - **時刻でソート可能**: 登録 ID は生成順に並ぶ（割り当ての最終 tie-break に使う）
//! - **分散生成可能**: 調整なしで生成できる

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"appt-", "reg-" など）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// ULID から Id を作成
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    /// 新しいランダムな Id（setup・テスト用）
    pub fn random() -> Self {
        Self::from_ulid(Ulid::new())
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

// ========================================
// マーカー型の定義
// ========================================

macro_rules! id_marker {
    ($(#[$meta:meta])* $name:ident => $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {}

        impl IdMarker for $name {
            fn prefix() -> &'static str {
                $prefix
            }
        }
    };
}

id_marker!(
    /// Appointment のマーカー型
    Appointment => "appt-"
);
id_marker!(
    /// Template のマーカー型
    Template => "tmpl-"
);
id_marker!(
    /// ExperienceTier のマーカー型
    Tier => "tier-"
);
id_marker!(
    /// Participant（ユーザー）のマーカー型
    Participant => "user-"
);
id_marker!(
    /// Registration のマーカー型
    Registration => "reg-"
);
id_marker!(
    /// Role のマーカー型（割り当てアルゴリズムからは不透明）
    Role => "role-"
);

// ========================================
// Type Alias
// ========================================

/// Identifier of one scheduled occurrence.
pub type AppointmentId = Id<Appointment>;

/// Identifier of a roster template.
pub type TemplateId = Id<Template>;

/// Identifier of an experience tier.
pub type TierId = Id<Tier>;

/// Identifier of a participant (resolved by the user directory outside this crate).
pub type ParticipantId = Id<Participant>;

/// Identifier of a registration row.
pub type RegistrationId = Id<Registration>;

/// Identifier of a role preference.
pub type RoleId = Id<Role>;
