//! Recompute: load → place → write back, inside the caller's transaction.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::bucket::TierSlot;
use super::engine::{Allocation, AllocationInput, Candidate, allocate};
use crate::domain::{
    Appointment, AppointmentId, ExperienceTier, ParticipantId, RegistrationId, SignupError,
    TierId, TierRank,
};
use crate::ports::{PriorityScoreProvider, StoreError, StoreTransaction};

/// What a recompute did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationReport {
    pub appointment_id: AppointmentId,
    pub placed: usize,
    pub waitlisted: usize,

    /// Registrations whose assigned tier differs from before.
    pub changed: Vec<RegistrationId>,
}

/// Resolved skill of one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticipantTier {
    pub tier_id: TierId,
    pub rank: TierRank,
}

/// Looks up a participant's current tier.
///
/// A missing profile, a null tier or a dangling tier reference all resolve to
/// the lowest-priority tier of the directory (largest rank). `None` only when
/// the directory is empty.
pub async fn participant_tier(
    tx: &mut dyn StoreTransaction,
    directory: &[ExperienceTier],
    participant: ParticipantId,
) -> Result<Option<ParticipantTier>, StoreError> {
    let profile = tx.profile(participant).await?;
    let own = profile
        .and_then(|p| p.tier_id)
        .and_then(|id| directory.iter().find(|tier| tier.id == id));
    let resolved = own.or_else(|| directory.iter().max_by_key(|tier| tier.rank));

    Ok(resolved.map(|tier| ParticipantTier {
        tier_id: tier.id,
        rank: tier.rank,
    }))
}

/// The appointment's template requirements joined with tier ranks, in
/// template order.
pub async fn tier_slots(
    tx: &mut dyn StoreTransaction,
    directory: &[ExperienceTier],
    appointment: &Appointment,
) -> Result<Vec<TierSlot>, SignupError> {
    let template = tx
        .template(appointment.template_id)
        .await?
        .ok_or(SignupError::UnknownTemplate(appointment.template_id))?;

    template
        .requirements
        .iter()
        .map(|req| -> Result<TierSlot, SignupError> {
            let tier = directory
                .iter()
                .find(|tier| tier.id == req.tier_id)
                .ok_or_else(|| {
                    StoreError::Backend(format!(
                        "template {} references unknown tier {}",
                        template.id, req.tier_id
                    ))
                })?;
            Ok(TierSlot {
                tier_id: tier.id,
                rank: tier.rank,
                base_count: req.base_count,
            })
        })
        .collect()
}

/// Re-derive every tier assignment of one appointment.
///
/// Reads and writes go through `tx`; nothing is visible to other readers
/// until the caller commits. Any error leaves `tx` half-written, so the
/// caller must drop it instead of committing.
#[tracing::instrument(skip_all, fields(appointment = %appointment_id))]
pub async fn recompute(
    tx: &mut dyn StoreTransaction,
    scores: &dyn PriorityScoreProvider,
    appointment_id: AppointmentId,
) -> Result<AllocationReport, SignupError> {
    let appointment = tx
        .appointment(appointment_id)
        .await?
        .filter(|appt| !appt.committed)
        .ok_or(SignupError::NoActiveAppointment(appointment_id))?;

    let directory = tx.tiers().await?;
    let slots = tier_slots(tx, &directory, &appointment).await?;
    let registrations = tx.registrations(appointment_id).await?;

    let mut candidates = Vec::with_capacity(registrations.len());
    for registration in &registrations {
        let rank = participant_tier(tx, &directory, registration.participant_id)
            .await?
            .map_or(TierRank(u32::MAX), |tier| tier.rank);
        let score = scores
            .score(registration.participant_id)
            .await
            .map_err(SignupError::ProviderUnavailable)?
            .unwrap_or(0.0);
        candidates.push(Candidate {
            registration_id: registration.id,
            participant_id: registration.participant_id,
            registered_at: registration.registered_at,
            rank,
            score,
        });
    }

    let allocation = allocate(&AllocationInput {
        group_count: appointment.group_count,
        slots,
        candidates,
    });

    write_back(tx, appointment_id, &allocation).await?;

    let changed: Vec<RegistrationId> = registrations
        .iter()
        .filter(|r| r.assigned_tier != allocation.tier_of(r.id))
        .map(|r| r.id)
        .collect();

    debug!(
        placed = allocation.placed(),
        waitlisted = allocation.waitlist.len(),
        changed = changed.len(),
        "recomputed roster"
    );

    Ok(AllocationReport {
        appointment_id,
        placed: allocation.placed(),
        waitlisted: allocation.waitlist.len(),
        changed,
    })
}

/// One batched update per non-empty bucket plus one for the bench.
async fn write_back(
    tx: &mut dyn StoreTransaction,
    appointment_id: AppointmentId,
    allocation: &Allocation,
) -> Result<(), SignupError> {
    let batches = allocation
        .buckets
        .iter()
        .map(|bucket| (Some(bucket.tier_id), &bucket.occupants))
        .chain(std::iter::once((None, &allocation.waitlist)));

    for (tier, ids) in batches {
        if ids.is_empty() {
            continue;
        }
        let updated = tx.set_assigned_tier(appointment_id, ids, tier).await?;
        if updated != ids.len() {
            return Err(SignupError::WriteConflict(appointment_id));
        }
    }
    Ok(())
}
