//! Capacity buckets: one per template tier requirement.

use serde::{Deserialize, Serialize};

use crate::domain::{RegistrationId, TierId, TierRank};

/// A template requirement joined with its tier's rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSlot {
    pub tier_id: TierId,
    pub rank: TierRank,
    pub base_count: u32,
}

impl TierSlot {
    pub fn capacity(&self, group_count: u32) -> usize {
        self.base_count.saturating_mul(group_count) as usize
    }
}

/// The capacity-bounded slot group for one tier within one appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub tier_id: TierId,
    pub rank: TierRank,
    pub capacity: usize,
    pub occupants: Vec<RegistrationId>,
}

impl Bucket {
    pub fn empty(slot: &TierSlot, group_count: u32) -> Self {
        Self {
            tier_id: slot.tier_id,
            rank: slot.rank,
            capacity: slot.capacity(group_count),
            occupants: Vec::new(),
        }
    }

    pub fn has_room(&self) -> bool {
        self.occupants.len() < self.capacity
    }

    /// Free capacity and a rank the participant is skilled enough for.
    pub fn accepts(&self, participant_rank: TierRank) -> bool {
        self.has_room() && participant_rank.may_fill(self.rank)
    }
}

/// Buckets in ladder order (most skilled first). The sort is stable, so
/// requirements sharing a rank keep their template order.
pub fn ladder(slots: &[TierSlot], group_count: u32) -> Vec<Bucket> {
    let mut buckets: Vec<Bucket> = slots
        .iter()
        .map(|slot| Bucket::empty(slot, group_count))
        .collect();
    buckets.sort_by_key(|bucket| bucket.rank);
    buckets
}
