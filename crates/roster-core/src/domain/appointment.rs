//! Appointment: one scheduled occurrence that needs a roster.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{AppointmentId, TemplateId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub scheduled_at: DateTime<Utc>,

    /// Registrations after this instant no longer take the fast path and
    /// leaving no longer promotes anyone from the bench.
    pub deadline: DateTime<Utc>,

    /// Multiplies every tier's base count (always >= 1).
    pub group_count: u32,
    pub template_id: TemplateId,

    /// Committed appointments are frozen and never reallocated.
    pub committed: bool,
}

impl Appointment {
    /// Accepting sign-ups: not committed and not yet started.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.committed && now < self.scheduled_at
    }

    pub fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }
}

/// Setup input for [`Appointment`]; the id is assigned on creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAppointment {
    pub scheduled_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub group_count: u32,
    pub template_id: TemplateId,
}

impl NewAppointment {
    pub fn into_appointment(self, id: AppointmentId) -> Appointment {
        Appointment {
            id,
            scheduled_at: self.scheduled_at,
            deadline: self.deadline,
            group_count: self.group_count,
            template_id: self.template_id,
            committed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn appointment(committed: bool) -> Appointment {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 20, 0, 0).unwrap();
        let mut appt = NewAppointment {
            scheduled_at: start,
            deadline: start - Duration::hours(2),
            group_count: 1,
            template_id: TemplateId::random(),
        }
        .into_appointment(AppointmentId::random());
        appt.committed = committed;
        appt
    }

    #[test]
    fn active_until_it_starts() {
        let appt = appointment(false);

        assert!(appt.is_active(appt.scheduled_at - Duration::minutes(1)));
        assert!(!appt.is_active(appt.scheduled_at));
    }

    #[test]
    fn committed_is_never_active() {
        let appt = appointment(true);

        assert!(!appt.is_active(appt.deadline - Duration::days(1)));
    }

    #[test]
    fn deadline_is_inclusive() {
        let appt = appointment(false);

        assert!(!appt.deadline_passed(appt.deadline - Duration::seconds(1)));
        assert!(appt.deadline_passed(appt.deadline));
    }
}
