//! SignupService - 登録ライフサイクル（join / leave / template 変更 / group 数変更）
//!
//! # フロー
//! 1. store のトランザクションを開始
//! 2. 前提条件を検証（開催前か・資格があるか）
//! 3. fast path で済むなら 1 行だけ更新、そうでなければ recompute
//! 4. commit（競合したら ConflictRetryPolicy に従って操作ごとやり直す）
//! 5. commit 成功後に PresentationNotifier へ republish
//!
//! # 設計原則
//! - `assigned_tier` を書くのは recompute と join の fast path だけ
//! - エラー時はトランザクションを drop するだけ（部分的な更新は残らない）

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::config::ServiceConfig;
use super::status::{RosterView, load_roster};
use crate::allocation::{AllocationReport, TierSlot, participant_tier, recompute, tier_slots};
use crate::domain::{
    Appointment, AppointmentId, NewAppointment, ParticipantId, ParticipantProfile, Registration,
    RegistrationId, RoleId, SignupError, TemplateId, TierId,
};
use crate::ports::{
    AppointmentStore, Clock, IdGenerator, PresentationNotifier, PriorityScoreProvider, StoreError,
    StoreTransaction,
};

/// How a join ended up placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Placement {
    /// Already registered; nothing changed.
    Existing,

    /// Dropped straight into the participant's own tier bucket.
    FastPath,

    /// The whole appointment was reallocated.
    Recomputed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinOutcome {
    pub registration_id: RegistrationId,
    pub placement: Placement,

    /// Tier the registration holds after the join; `None` means benched.
    pub tier: Option<TierId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaveOutcome {
    /// There was nothing to remove.
    NotRegistered,

    Removed {
        registration_id: RegistrationId,

        /// A full bucket was freed and the bench was reconsidered.
        recomputed: bool,
    },
}

impl LeaveOutcome {
    fn mutated(&self) -> bool {
        matches!(self, LeaveOutcome::Removed { .. })
    }
}

/// Registration lifecycle service.
///
/// Built with [`super::ServiceBuilder`].
pub struct SignupService {
    pub(super) store: Arc<dyn AppointmentStore>,
    pub(super) scores: Arc<dyn PriorityScoreProvider>,
    pub(super) notifier: Arc<dyn PresentationNotifier>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) ids: Arc<dyn IdGenerator>,
    pub(super) config: ServiceConfig,
}

impl SignupService {
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Lifecycle operations
    // ------------------------------------------------------------------

    #[tracing::instrument(skip_all, fields(appointment = %appointment_id, participant = %participant))]
    pub async fn join(
        &self,
        appointment_id: AppointmentId,
        participant: ParticipantId,
    ) -> Result<JoinOutcome, SignupError> {
        let outcome = self
            .retrying(Some(appointment_id), move || {
                self.try_join(appointment_id, participant)
            })
            .await?;

        info!(placement = ?outcome.placement, tier = ?outcome.tier, "joined");
        self.after(appointment_id, outcome.placement != Placement::Existing)
            .await;
        Ok(outcome)
    }

    #[tracing::instrument(skip_all, fields(appointment = %appointment_id, participant = %participant))]
    pub async fn leave(
        &self,
        appointment_id: AppointmentId,
        participant: ParticipantId,
    ) -> Result<LeaveOutcome, SignupError> {
        let outcome = self
            .retrying(Some(appointment_id), move || {
                self.try_leave(appointment_id, participant)
            })
            .await?;

        info!(?outcome, "left");
        self.after(appointment_id, outcome.mutated()).await;
        Ok(outcome)
    }

    #[tracing::instrument(skip_all, fields(appointment = %appointment_id, template = %template_id))]
    pub async fn set_template(
        &self,
        appointment_id: AppointmentId,
        template_id: TemplateId,
    ) -> Result<AllocationReport, SignupError> {
        let report = self
            .retrying(Some(appointment_id), move || async move {
                let now = self.clock.now();
                let mut tx = self.store.begin().await?;
                let mut appointment = active(tx.as_mut(), appointment_id, now).await?;
                if tx.template(template_id).await?.is_none() {
                    return Err(SignupError::UnknownTemplate(template_id));
                }
                appointment.template_id = template_id;
                tx.put_appointment(&appointment).await?;
                let report = recompute(tx.as_mut(), self.scores.as_ref(), appointment_id).await?;
                tx.commit().await?;
                Ok(report)
            })
            .await?;

        self.after(appointment_id, true).await;
        Ok(report)
    }

    #[tracing::instrument(skip_all, fields(appointment = %appointment_id, group_count = group_count))]
    pub async fn set_group_count(
        &self,
        appointment_id: AppointmentId,
        group_count: u32,
    ) -> Result<AllocationReport, SignupError> {
        if group_count == 0 {
            return Err(SignupError::InvalidGroupCount(group_count));
        }
        let report = self
            .retrying(Some(appointment_id), move || async move {
                let now = self.clock.now();
                let mut tx = self.store.begin().await?;
                let mut appointment = active(tx.as_mut(), appointment_id, now).await?;
                appointment.group_count = group_count;
                tx.put_appointment(&appointment).await?;
                let report = recompute(tx.as_mut(), self.scores.as_ref(), appointment_id).await?;
                tx.commit().await?;
                Ok(report)
            })
            .await?;

        self.after(appointment_id, true).await;
        Ok(report)
    }

    /// Full reallocation. Also accepted after the start time, as long as the
    /// appointment is not committed, so stale rosters can be repaired.
    #[tracing::instrument(skip_all, fields(appointment = %appointment_id))]
    pub async fn recompute(
        &self,
        appointment_id: AppointmentId,
    ) -> Result<AllocationReport, SignupError> {
        let report = self
            .retrying(Some(appointment_id), move || async move {
                let mut tx = self.store.begin().await?;
                let report = recompute(tx.as_mut(), self.scores.as_ref(), appointment_id).await?;
                tx.commit().await?;
                Ok(report)
            })
            .await?;

        self.after(appointment_id, !report.changed.is_empty()).await;
        Ok(report)
    }

    /// Replace the role preferences of a registration.
    #[tracing::instrument(skip_all, fields(appointment = %appointment_id, participant = %participant))]
    pub async fn assign_roles(
        &self,
        appointment_id: AppointmentId,
        participant: ParticipantId,
        roles: Vec<RoleId>,
    ) -> Result<(), SignupError> {
        let mut unique: Vec<RoleId> = Vec::with_capacity(roles.len());
        for role in roles {
            if !unique.contains(&role) {
                unique.push(role);
            }
        }
        let max = self.config.max_role_choices;
        if unique.len() > max {
            return Err(SignupError::TooManyRoles {
                given: unique.len(),
                max,
            });
        }

        let unique = &unique;
        self.retrying(Some(appointment_id), move || async move {
            let now = self.clock.now();
            let mut tx = self.store.begin().await?;
            let appointment = active(tx.as_mut(), appointment_id, now).await?;
            if appointment.deadline_passed(now) {
                return Err(SignupError::RegistrationClosed(appointment_id));
            }
            let registration = tx
                .registration_for(appointment_id, participant)
                .await?
                .ok_or(SignupError::NotRegistered {
                    appointment: appointment_id,
                    participant,
                })?;
            tx.set_roles(registration.id, unique).await?;
            tx.commit().await?;
            Ok(())
        })
        .await?;

        self.after(appointment_id, true).await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Setup and profile operations
    // ------------------------------------------------------------------

    #[tracing::instrument(skip_all, fields(template = %new.template_id))]
    pub async fn create_appointment(
        &self,
        new: NewAppointment,
    ) -> Result<AppointmentId, SignupError> {
        if new.group_count == 0 {
            return Err(SignupError::InvalidGroupCount(new.group_count));
        }
        let appointment = new.into_appointment(self.ids.appointment_id());
        let appointment = &appointment;
        self.retrying(Some(appointment.id), move || async move {
            let mut tx = self.store.begin().await?;
            if tx.template(appointment.template_id).await?.is_none() {
                return Err(SignupError::UnknownTemplate(appointment.template_id));
            }
            tx.put_appointment(appointment).await?;
            tx.commit().await?;
            Ok(())
        })
        .await?;

        info!(appointment = %appointment.id, "appointment created");
        self.after(appointment.id, true).await;
        Ok(appointment.id)
    }

    /// Freeze an appointment. Later mutations see `NoActiveAppointment`.
    #[tracing::instrument(skip_all, fields(appointment = %appointment_id))]
    pub async fn commit_appointment(&self, appointment_id: AppointmentId) -> Result<(), SignupError> {
        self.retrying(Some(appointment_id), move || async move {
            let mut tx = self.store.begin().await?;
            let mut appointment = tx
                .appointment(appointment_id)
                .await?
                .filter(|appt| !appt.committed)
                .ok_or(SignupError::NoActiveAppointment(appointment_id))?;
            appointment.committed = true;
            tx.put_appointment(&appointment).await?;
            tx.commit().await?;
            Ok(())
        })
        .await?;

        self.after(appointment_id, true).await;
        Ok(())
    }

    /// Change a participant's experience tier and reallocate every active
    /// appointment they are registered for. Returns the recomputed ones.
    ///
    /// The profile write and all recomputes share one transaction: either the
    /// new tier lands together with every reallocation or nothing changes.
    /// The new tier applies both ways: a regression can demote the
    /// participant out of a bucket they held.
    #[tracing::instrument(skip_all, fields(participant = %participant, tier = ?tier_id))]
    pub async fn set_experience_tier(
        &self,
        participant: ParticipantId,
        tier_id: Option<TierId>,
    ) -> Result<Vec<AppointmentId>, SignupError> {
        let reports = self
            .retrying(None, move || async move {
                let now = self.clock.now();
                let mut tx = self.store.begin().await?;
                if let Some(tier_id) = tier_id
                    && tx.tier(tier_id).await?.is_none()
                {
                    return Err(SignupError::UnknownTier(tier_id));
                }
                tx.put_profile(&ParticipantProfile {
                    participant_id: participant,
                    tier_id,
                })
                .await?;

                let mut reports = Vec::new();
                for appointment_id in tx.appointments_for_participant(participant).await? {
                    let is_active = tx
                        .appointment(appointment_id)
                        .await?
                        .is_some_and(|appt| appt.is_active(now));
                    if is_active {
                        reports.push(
                            recompute(tx.as_mut(), self.scores.as_ref(), appointment_id).await?,
                        );
                    }
                }
                tx.commit().await?;
                Ok(reports)
            })
            .await?;

        let mut recomputed = Vec::with_capacity(reports.len());
        for report in reports {
            self.after(report.appointment_id, !report.changed.is_empty())
                .await;
            recomputed.push(report.appointment_id);
        }

        info!(recomputed = recomputed.len(), "experience tier changed");
        Ok(recomputed)
    }

    /// Committed roster snapshot for display.
    pub async fn roster(&self, appointment_id: AppointmentId) -> Result<RosterView, SignupError> {
        let mut tx = self.store.begin().await?;
        load_roster(tx.as_mut(), appointment_id).await
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn try_join(
        &self,
        appointment_id: AppointmentId,
        participant: ParticipantId,
    ) -> Result<JoinOutcome, SignupError> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let appointment = active(tx.as_mut(), appointment_id, now).await?;

        // 登録済みなら資格に関係なく no-op（template や tier が後から変わっても）
        if let Some(existing) = tx.registration_for(appointment_id, participant).await? {
            return Ok(JoinOutcome {
                registration_id: existing.id,
                placement: Placement::Existing,
                tier: existing.assigned_tier,
            });
        }

        let directory = tx.tiers().await?;
        let slots = tier_slots(tx.as_mut(), &directory, &appointment).await?;
        let own = participant_tier(tx.as_mut(), &directory, participant).await?;
        let worst = slots.iter().map(|slot| slot.rank).max();
        let qualified = matches!((own, worst), (Some(own), Some(worst)) if own.rank.may_fill(worst));
        if !qualified {
            return Err(SignupError::NotQualified {
                participant,
                rank: own.map(|tier| tier.rank),
            });
        }

        let registration = Registration::new(
            self.ids.registration_id(),
            appointment_id,
            participant,
            now,
        );
        tx.insert_registration(&registration).await?;

        let fast_tier = match own {
            Some(own) if !appointment.deadline_passed(now) => {
                let rows = tx.registrations(appointment_id).await?;
                let capacity = tier_capacity(&slots, own.tier_id, appointment.group_count);
                let occupied = occupancy(&rows, own.tier_id);
                (occupied < capacity).then_some(own.tier_id)
            }
            _ => None,
        };

        let outcome = match fast_tier {
            Some(tier) => {
                let updated = tx
                    .set_assigned_tier(appointment_id, &[registration.id], Some(tier))
                    .await?;
                if updated != 1 {
                    return Err(SignupError::WriteConflict(appointment_id));
                }
                debug!(tier = %tier, "fast path");
                JoinOutcome {
                    registration_id: registration.id,
                    placement: Placement::FastPath,
                    tier: Some(tier),
                }
            }
            None => {
                recompute(tx.as_mut(), self.scores.as_ref(), appointment_id).await?;
                let tier = tx
                    .registration_for(appointment_id, participant)
                    .await?
                    .and_then(|r| r.assigned_tier);
                JoinOutcome {
                    registration_id: registration.id,
                    placement: Placement::Recomputed,
                    tier,
                }
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn try_leave(
        &self,
        appointment_id: AppointmentId,
        participant: ParticipantId,
    ) -> Result<LeaveOutcome, SignupError> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let appointment = active(tx.as_mut(), appointment_id, now).await?;

        let Some(registration) = tx.registration_for(appointment_id, participant).await? else {
            return Ok(LeaveOutcome::NotRegistered);
        };

        let frees_full_bucket = match registration.assigned_tier {
            Some(tier) if !appointment.deadline_passed(now) => {
                let directory = tx.tiers().await?;
                let slots = tier_slots(tx.as_mut(), &directory, &appointment).await?;
                let rows = tx.registrations(appointment_id).await?;
                occupancy(&rows, tier) >= tier_capacity(&slots, tier, appointment.group_count)
            }
            _ => false,
        };

        if !tx.delete_registration(registration.id).await? {
            return Err(SignupError::WriteConflict(appointment_id));
        }
        if frees_full_bucket {
            recompute(tx.as_mut(), self.scores.as_ref(), appointment_id).await?;
        } else {
            debug!("fast path");
        }
        tx.commit().await?;

        Ok(LeaveOutcome::Removed {
            registration_id: registration.id,
            recomputed: frees_full_bucket,
        })
    }

    /// Run `op`, rerunning it from scratch while it loses commit races and
    /// the retry policy allows.
    async fn retrying<T, F, Fut>(
        &self,
        scope: Option<AppointmentId>,
        mut op: F,
    ) -> Result<T, SignupError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SignupError>>,
    {
        let policy = &self.config.conflict_retry;
        let mut retry = 0;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            let conflicted = matches!(
                err,
                SignupError::WriteConflict(_) | SignupError::Store(StoreError::Conflict)
            );
            if !conflicted {
                return Err(err);
            }
            if !policy.allows(retry + 1) {
                return Err(match scope {
                    Some(appointment) => SignupError::WriteConflict(appointment),
                    None => err,
                });
            }
            retry += 1;
            let delay = policy.next_delay(retry);
            warn!(retry, ?delay, "write conflict, retrying");
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    /// Post-commit hook: republish once per successful mutation.
    async fn after(&self, appointment_id: AppointmentId, mutated: bool) {
        if !mutated && !self.config.republish_on_noop {
            return;
        }
        if let Err(err) = self.notifier.republish(appointment_id).await {
            warn!(appointment = %appointment_id, error = %err, "republish failed");
        }
    }
}

/// The appointment, if it still accepts sign-ups.
async fn active(
    tx: &mut dyn StoreTransaction,
    appointment_id: AppointmentId,
    now: DateTime<Utc>,
) -> Result<Appointment, SignupError> {
    tx.appointment(appointment_id)
        .await?
        .filter(|appt| appt.is_active(now))
        .ok_or(SignupError::NoActiveAppointment(appointment_id))
}

fn tier_capacity(slots: &[TierSlot], tier_id: TierId, group_count: u32) -> usize {
    slots
        .iter()
        .filter(|slot| slot.tier_id == tier_id)
        .map(|slot| slot.capacity(group_count))
        .sum()
}

fn occupancy(rows: &[Registration], tier_id: TierId) -> usize {
    rows.iter()
        .filter(|r| r.assigned_tier == Some(tier_id))
        .count()
}
