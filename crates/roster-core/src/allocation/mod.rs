//! Allocation engine.
//!
//! - **bucket**: capacity buckets and the rank ladder
//! - **engine**: pure placement (`allocate`)
//! - **recompute**: transactional load → place → write back

pub mod bucket;
pub mod engine;
pub mod recompute;

pub use self::bucket::{Bucket, TierSlot};
pub use self::engine::{Allocation, AllocationInput, Candidate, allocate};
pub use self::recompute::{AllocationReport, ParticipantTier, participant_tier, recompute, tier_slots};
