//! Experience tiers, roster templates and participant skill profiles.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{ParticipantId, TemplateId, TierId};

/// Position of a tier on the skill ladder.
///
/// Lower numbers are more skilled. A participant of rank `r` may fill any
/// bucket whose rank is `>= r`, never one above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierRank(pub u32);

impl TierRank {
    /// Can a participant of this rank occupy a bucket of `bucket` rank?
    pub fn may_fill(self, bucket: TierRank) -> bool {
        bucket >= self
    }
}

impl fmt::Display for TierRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rank {}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperienceTier {
    pub id: TierId,
    pub name: String,
    pub rank: TierRank,
}

impl ExperienceTier {
    pub fn new(name: impl Into<String>, rank: u32) -> Self {
        Self {
            id: TierId::random(),
            name: name.into(),
            rank: TierRank(rank),
        }
    }
}

/// One line of a template: `base_count` slots of `tier_id` per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierRequirement {
    pub tier_id: TierId,
    pub base_count: u32,
}

/// The roster shape for one kind of appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    pub requirements: Vec<TierRequirement>,
}

impl Template {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TemplateId::random(),
            name: name.into(),
            requirements: Vec::new(),
        }
    }

    pub fn with_requirement(mut self, tier_id: TierId, base_count: u32) -> Self {
        self.requirements.push(TierRequirement {
            tier_id,
            base_count,
        });
        self
    }
}

/// Durable skill record of a participant, independent of any appointment.
///
/// `tier_id == None` means the lowest-priority default tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantProfile {
    pub participant_id: ParticipantId,
    pub tier_id: Option<TierId>,
}
