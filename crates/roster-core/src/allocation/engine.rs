//! Placement: the pure part of a recompute.
//!
//! Given the roster shape and every registration with its rank and score,
//! decide which bucket each registration occupies. No I/O happens here, so
//! the result depends only on the input (fixed score tables in tests give
//! fixed rosters).

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

use super::bucket::{Bucket, TierSlot, ladder};
use crate::domain::{ParticipantId, RegistrationId, TierId, TierRank};

/// One registration as seen by the placement pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub registration_id: RegistrationId,
    pub participant_id: ParticipantId,
    pub registered_at: DateTime<Utc>,

    /// The participant's current rank (the skill ceiling).
    pub rank: TierRank,

    /// Live priority score; missing scores arrive here as 0.0.
    pub score: f64,
}

impl Candidate {
    /// Score descending, then earlier registration, then registration id.
    fn priority_cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.registered_at.cmp(&other.registered_at))
            .then_with(|| self.registration_id.cmp(&other.registration_id))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AllocationInput {
    pub group_count: u32,
    pub slots: Vec<TierSlot>,
    pub candidates: Vec<Candidate>,
}

/// Result of a placement pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    /// Buckets in ladder order; occupants in priority order.
    pub buckets: Vec<Bucket>,

    /// Benched registrations in priority order.
    pub waitlist: Vec<RegistrationId>,
}

impl Allocation {
    pub fn tier_of(&self, registration: RegistrationId) -> Option<TierId> {
        self.buckets
            .iter()
            .find(|bucket| bucket.occupants.contains(&registration))
            .map(|bucket| bucket.tier_id)
    }

    pub fn placed(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.occupants.len()).sum()
    }
}

/// Fill the ladder top-down.
///
/// Candidates are taken in priority order; each lands in the first bucket
/// (most skilled first) that has room and that its rank may fill. Whoever
/// finds no such bucket is benched.
pub fn allocate(input: &AllocationInput) -> Allocation {
    let mut buckets = ladder(&input.slots, input.group_count);

    let mut ordered: Vec<&Candidate> = input.candidates.iter().collect();
    ordered.sort_by(|a, b| a.priority_cmp(b));

    let mut waitlist = Vec::new();
    for candidate in ordered {
        match buckets
            .iter_mut()
            .find(|bucket| bucket.accepts(candidate.rank))
        {
            Some(bucket) => bucket.occupants.push(candidate.registration_id),
            None => waitlist.push(candidate.registration_id),
        }
    }

    Allocation { buckets, waitlist }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rstest::rstest;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap()
    }

    fn slot(rank: u32, base_count: u32) -> TierSlot {
        TierSlot {
            tier_id: TierId::random(),
            rank: TierRank(rank),
            base_count,
        }
    }

    fn candidate(rank: u32, score: f64, minutes: i64) -> Candidate {
        Candidate {
            registration_id: RegistrationId::random(),
            participant_id: ParticipantId::random(),
            registered_at: t0() + Duration::minutes(minutes),
            rank: TierRank(rank),
            score,
        }
    }

    fn assert_invariants(input: &AllocationInput, allocation: &Allocation) {
        for bucket in &allocation.buckets {
            assert!(bucket.occupants.len() <= bucket.capacity);
            for id in &bucket.occupants {
                let c = input
                    .candidates
                    .iter()
                    .find(|c| c.registration_id == *id)
                    .unwrap();
                assert!(c.rank.may_fill(bucket.rank));
            }
        }
        assert_eq!(
            allocation.placed() + allocation.waitlist.len(),
            input.candidates.len()
        );
    }

    #[test]
    fn sixth_veteran_spills_into_the_lower_bucket() {
        let slots = vec![slot(1, 5), slot(2, 5)];
        let candidates: Vec<Candidate> = (0..6)
            .map(|i| candidate(1, 100.0 - i as f64, i))
            .collect();
        let input = AllocationInput {
            group_count: 1,
            slots: slots.clone(),
            candidates: candidates.clone(),
        };

        let allocation = allocate(&input);

        let top: Vec<RegistrationId> = candidates[..5].iter().map(|c| c.registration_id).collect();
        assert_eq!(allocation.buckets[0].occupants, top);
        assert_eq!(
            allocation.buckets[1].occupants,
            vec![candidates[5].registration_id]
        );
        assert!(allocation.waitlist.is_empty());
        assert_invariants(&input, &allocation);
    }

    #[test]
    fn earlier_registration_wins_a_tied_score() {
        let late = candidate(1, 10.0, 5);
        let early = candidate(1, 10.0, 1);
        let input = AllocationInput {
            group_count: 1,
            slots: vec![slot(1, 1)],
            candidates: vec![late.clone(), early.clone()],
        };

        let allocation = allocate(&input);

        assert_eq!(allocation.buckets[0].occupants, vec![early.registration_id]);
        assert_eq!(allocation.waitlist, vec![late.registration_id]);
    }

    #[test]
    fn lower_skill_never_climbs() {
        let rookie = candidate(2, 1_000.0, 0);
        let input = AllocationInput {
            group_count: 1,
            slots: vec![slot(1, 3)],
            candidates: vec![rookie.clone()],
        };

        let allocation = allocate(&input);

        assert!(allocation.buckets[0].occupants.is_empty());
        assert_eq!(allocation.waitlist, vec![rookie.registration_id]);
    }

    #[test]
    fn placement_is_deterministic() {
        let input = AllocationInput {
            group_count: 2,
            slots: vec![slot(2, 2), slot(1, 1), slot(3, 1)],
            candidates: (0..12)
                .map(|i| candidate(1 + (i % 3) as u32, (i * 7 % 5) as f64, i))
                .collect(),
        };

        let first = allocate(&input);
        let mut shuffled = input.clone();
        shuffled.candidates.reverse();
        let second = allocate(&shuffled);

        assert_eq!(first, second);
        assert_invariants(&input, &first);
    }

    #[rstest]
    #[case(1, 8)]
    #[case(2, 4)]
    #[case(3, 0)]
    fn group_count_scales_every_bucket(#[case] group_count: u32, #[case] benched: usize) {
        // 12 veterans against [rank1: 2, rank2: 2] per group.
        let input = AllocationInput {
            group_count,
            slots: vec![slot(1, 2), slot(2, 2)],
            candidates: (0..12).map(|i| candidate(1, 50.0 - i as f64, i)).collect(),
        };

        let allocation = allocate(&input);

        assert_eq!(allocation.waitlist.len(), benched);
        assert_invariants(&input, &allocation);
    }

    #[test]
    fn no_buckets_benches_everyone() {
        let input = AllocationInput {
            group_count: 1,
            slots: Vec::new(),
            candidates: vec![candidate(1, 1.0, 0), candidate(2, 2.0, 0)],
        };

        let allocation = allocate(&input);

        assert_eq!(allocation.placed(), 0);
        assert_eq!(allocation.waitlist.len(), 2);
    }
}
