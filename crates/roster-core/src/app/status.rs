//! Status - 公開表示用の roster スナップショット
//!
//! PresentationNotifier が表示を作り直すのに必要なデータだけを集めます。
//! 描画形式（埋め込み・ページ分割など）はこのクレートの外の責務です。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::allocation::{participant_tier, tier_slots};
use crate::domain::{
    Appointment, AppointmentId, ParticipantId, Registration, RegistrationId, RoleId, SignupError,
    TierId, TierRank,
};
use crate::ports::StoreTransaction;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterCounts {
    pub placed: usize,
    pub benched: usize,
    pub capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub registration_id: RegistrationId,
    pub participant_id: ParticipantId,
    pub registered_at: DateTime<Utc>,

    /// The participant's current rank, if the tier directory has any tiers.
    pub rank: Option<TierRank>,
    pub roles: Vec<RoleId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketView {
    pub tier_id: TierId,
    pub tier_name: String,
    pub rank: TierRank,
    pub capacity: usize,
    pub occupants: Vec<RosterEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterView {
    pub appointment: Appointment,

    /// Ladder order, one view per distinct tier.
    pub buckets: Vec<BucketView>,
    pub bench: Vec<RosterEntry>,
}

impl RosterView {
    pub fn counts(&self) -> RosterCounts {
        RosterCounts {
            placed: self.buckets.iter().map(|b| b.occupants.len()).sum(),
            benched: self.bench.len(),
            capacity: self.buckets.iter().map(|b| b.capacity).sum(),
        }
    }

    pub fn bucket(&self, tier_id: TierId) -> Option<&BucketView> {
        self.buckets.iter().find(|b| b.tier_id == tier_id)
    }
}

/// Read the committed roster of one appointment.
pub async fn load_roster(
    tx: &mut dyn StoreTransaction,
    appointment_id: AppointmentId,
) -> Result<RosterView, SignupError> {
    let appointment = tx
        .appointment(appointment_id)
        .await?
        .ok_or(SignupError::NoActiveAppointment(appointment_id))?;
    let directory = tx.tiers().await?;
    let mut slots = tier_slots(tx, &directory, &appointment).await?;
    slots.sort_by_key(|slot| slot.rank);

    let mut buckets: Vec<BucketView> = Vec::new();
    for slot in &slots {
        let capacity = slot.capacity(appointment.group_count);
        match buckets.iter_mut().find(|b| b.tier_id == slot.tier_id) {
            Some(existing) => existing.capacity += capacity,
            None => buckets.push(BucketView {
                tier_id: slot.tier_id,
                tier_name: directory
                    .iter()
                    .find(|tier| tier.id == slot.tier_id)
                    .map(|tier| tier.name.clone())
                    .unwrap_or_default(),
                rank: slot.rank,
                capacity,
                occupants: Vec::new(),
            }),
        }
    }

    let mut bench = Vec::new();
    for registration in tx.registrations(appointment_id).await? {
        let rank = participant_tier(tx, &directory, registration.participant_id)
            .await?
            .map(|tier| tier.rank);
        let assigned = registration.assigned_tier;
        let entry = entry(registration, rank);
        match assigned.and_then(|tier| buckets.iter_mut().find(|b| b.tier_id == tier)) {
            Some(bucket) => bucket.occupants.push(entry),
            None => bench.push(entry),
        }
    }

    Ok(RosterView {
        appointment,
        buckets,
        bench,
    })
}

fn entry(registration: Registration, rank: Option<TierRank>) -> RosterEntry {
    RosterEntry {
        registration_id: registration.id,
        participant_id: registration.participant_id,
        registered_at: registration.registered_at,
        rank,
        roles: registration.roles,
    }
}
