//! AppointmentStore port - appointment / registration / tier の正本（source of truth）
//!
//! AppointmentStore は以下を管理します：
//! - Appointment（開催日時・締め切り・group 数・template）
//! - Template と TierRequirement、ExperienceTier
//! - ParticipantProfile（参加者の現在の tier）
//! - Registration（割り当て済み tier と role 希望）
//!
//! # 設計原則
//! - 読み取り → 割り当て計算 → 書き戻しは同一トランザクション内
//! - commit は all-or-nothing（途中の tier 再割り当てを他の読み手に見せない）
//! - 同じ appointment への並行トランザクションは、後から commit した側が
//!   `StoreError::Conflict` で失敗する（read committed では不十分）

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    Appointment, AppointmentId, ExperienceTier, ParticipantId, ParticipantProfile, Registration,
    RegistrationId, RoleId, Template, TemplateId, TierId,
};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Another transaction committed a change to data this one read.
    #[error("transaction conflict")]
    Conflict,

    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Entry point: hands out transactions.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Start a repeatable-read (or stronger) transaction.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;
}

/// One unit of work against the store.
///
/// Dropping a transaction without calling [`StoreTransaction::commit`]
/// discards every staged write.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn appointment(&mut self, id: AppointmentId) -> Result<Option<Appointment>, StoreError>;

    async fn put_appointment(&mut self, appointment: &Appointment) -> Result<(), StoreError>;

    async fn template(&mut self, id: TemplateId) -> Result<Option<Template>, StoreError>;

    async fn put_template(&mut self, template: &Template) -> Result<(), StoreError>;

    async fn tier(&mut self, id: TierId) -> Result<Option<ExperienceTier>, StoreError>;

    /// The whole tier directory, in no particular order.
    async fn tiers(&mut self) -> Result<Vec<ExperienceTier>, StoreError>;

    async fn put_tier(&mut self, tier: &ExperienceTier) -> Result<(), StoreError>;

    async fn profile(
        &mut self,
        participant: ParticipantId,
    ) -> Result<Option<ParticipantProfile>, StoreError>;

    async fn put_profile(&mut self, profile: &ParticipantProfile) -> Result<(), StoreError>;

    async fn registration_for(
        &mut self,
        appointment: AppointmentId,
        participant: ParticipantId,
    ) -> Result<Option<Registration>, StoreError>;

    async fn registrations(
        &mut self,
        appointment: AppointmentId,
    ) -> Result<Vec<Registration>, StoreError>;

    async fn appointments_for_participant(
        &mut self,
        participant: ParticipantId,
    ) -> Result<Vec<AppointmentId>, StoreError>;

    /// Fails with [`StoreError::Conflict`] if (appointment, participant) already exists.
    async fn insert_registration(&mut self, registration: &Registration)
    -> Result<(), StoreError>;

    /// Deletes the row and its role sub-assignments. Returns whether a row existed.
    async fn delete_registration(&mut self, id: RegistrationId) -> Result<bool, StoreError>;

    /// Batched conditional update: sets `assigned_tier = tier` for every id in
    /// `ids` that belongs to `appointment`. Returns the number of rows updated.
    async fn set_assigned_tier(
        &mut self,
        appointment: AppointmentId,
        ids: &[RegistrationId],
        tier: Option<TierId>,
    ) -> Result<usize, StoreError>;

    /// Replaces all role sub-assignments of one registration.
    async fn set_roles(&mut self, id: RegistrationId, roles: &[RoleId]) -> Result<bool, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
