//! Domain model (IDs, tiers, appointments, registrations, errors).

pub mod appointment;
pub mod errors;
pub mod ids;
pub mod registration;
pub mod tier;

pub use appointment::{Appointment, NewAppointment};
pub use errors::{ErrorKind, SignupError};
pub use ids::{AppointmentId, ParticipantId, RegistrationId, RoleId, TemplateId, TierId};
pub use registration::Registration;
pub use tier::{ExperienceTier, ParticipantProfile, Template, TierRank, TierRequirement};
