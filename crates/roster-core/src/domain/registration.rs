//! Registration record: one participant's sign-up for one appointment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{AppointmentId, ParticipantId, RegistrationId, RoleId, TierId};

/// A participant's sign-up.
///
/// Design:
/// - Unique per (appointment, participant).
/// - `assigned_tier` is written only by the allocation engine and the join
///   fast path; `None` means the registration sits on the bench.
/// - `roles` travel with the row and are deleted with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub id: RegistrationId,
    pub appointment_id: AppointmentId,
    pub participant_id: ParticipantId,
    pub registered_at: DateTime<Utc>,
    pub assigned_tier: Option<TierId>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<RoleId>,
}

impl Registration {
    /// A fresh registration starts on the bench.
    pub fn new(
        id: RegistrationId,
        appointment_id: AppointmentId,
        participant_id: ParticipantId,
        registered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            appointment_id,
            participant_id,
            registered_at,
            assigned_tier: None,
            roles: Vec::new(),
        }
    }

    pub fn is_benched(&self) -> bool {
        self.assigned_tier.is_none()
    }
}
