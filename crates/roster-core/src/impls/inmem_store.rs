//! InMemoryAppointmentStore - 開発・テスト用の正本
//!
//! # 学習ポイント
//! - 楽観的並行性制御（読み取った key の version を commit 時に検証）
//! - 書き込みは op log に積み、snapshot にも即時適用（read-your-writes）
//! - commit は Mutex 内で検証 → 適用を一括で行う（all-or-nothing）

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    Appointment, AppointmentId, ExperienceTier, ParticipantId, ParticipantProfile, Registration,
    RegistrationId, RoleId, Template, TemplateId, TierId,
};
use crate::ports::{AppointmentStore, StoreError, StoreTransaction};

/// Unit of conflict detection.
///
/// Registrations live under their appointment's key, and also bump the
/// participant's key so "which appointments is this participant in" reads
/// are validated too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Key {
    Appointment(AppointmentId),
    Template(TemplateId),
    Tiers,
    Participant(ParticipantId),
}

/// A staged write.
#[derive(Debug, Clone)]
enum Write {
    PutAppointment(Appointment),
    PutTemplate(Template),
    PutTier(ExperienceTier),
    PutProfile(ParticipantProfile),
    InsertRegistration(Registration),
    DeleteRegistration(RegistrationId),
    AssignTier {
        appointment: AppointmentId,
        ids: Vec<RegistrationId>,
        tier: Option<TierId>,
    },
    SetRoles {
        id: RegistrationId,
        roles: Vec<RoleId>,
    },
}

#[derive(Debug, Clone, Default)]
struct InMemoryState {
    appointments: HashMap<AppointmentId, Appointment>,
    templates: HashMap<TemplateId, Template>,
    tiers: HashMap<TierId, ExperienceTier>,
    profiles: HashMap<ParticipantId, ParticipantProfile>,

    /// Registrations (roles embedded, so deletion cascades).
    registrations: HashMap<RegistrationId, Registration>,

    /// Committed version per key.
    versions: HashMap<Key, u64>,
}

impl InMemoryState {
    fn version(&self, key: &Key) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    fn bump(&mut self, key: Key) {
        *self.versions.entry(key).or_insert(0) += 1;
    }

    fn find_registration(
        &self,
        appointment: AppointmentId,
        participant: ParticipantId,
    ) -> Option<&Registration> {
        self.registrations
            .values()
            .find(|r| r.appointment_id == appointment && r.participant_id == participant)
    }

    /// Keys a write touches, resolved against this state before applying it.
    fn keys_of(&self, write: &Write) -> Vec<Key> {
        match write {
            Write::PutAppointment(appt) => vec![Key::Appointment(appt.id)],
            Write::PutTemplate(template) => vec![Key::Template(template.id)],
            Write::PutTier(_) => vec![Key::Tiers],
            Write::PutProfile(profile) => vec![Key::Participant(profile.participant_id)],
            Write::InsertRegistration(r) => vec![
                Key::Appointment(r.appointment_id),
                Key::Participant(r.participant_id),
            ],
            Write::DeleteRegistration(id) => self
                .registrations
                .get(id)
                .map(|r| {
                    vec![
                        Key::Appointment(r.appointment_id),
                        Key::Participant(r.participant_id),
                    ]
                })
                .unwrap_or_default(),
            Write::AssignTier { appointment, .. } => vec![Key::Appointment(*appointment)],
            Write::SetRoles { id, .. } => self
                .registrations
                .get(id)
                .map(|r| vec![Key::Appointment(r.appointment_id)])
                .unwrap_or_default(),
        }
    }

    /// Apply one write. Returns the number of rows it touched.
    fn apply(&mut self, write: &Write) -> usize {
        match write {
            Write::PutAppointment(appt) => {
                self.appointments.insert(appt.id, appt.clone());
                1
            }
            Write::PutTemplate(template) => {
                self.templates.insert(template.id, template.clone());
                1
            }
            Write::PutTier(tier) => {
                self.tiers.insert(tier.id, tier.clone());
                1
            }
            Write::PutProfile(profile) => {
                self.profiles
                    .insert(profile.participant_id, profile.clone());
                1
            }
            Write::InsertRegistration(r) => {
                self.registrations.insert(r.id, r.clone());
                1
            }
            Write::DeleteRegistration(id) => usize::from(self.registrations.remove(id).is_some()),
            Write::AssignTier {
                appointment,
                ids,
                tier,
            } => {
                let mut updated = 0;
                for id in ids {
                    if let Some(r) = self.registrations.get_mut(id)
                        && r.appointment_id == *appointment
                    {
                        r.assigned_tier = *tier;
                        updated += 1;
                    }
                }
                updated
            }
            Write::SetRoles { id, roles } => match self.registrations.get_mut(id) {
                Some(r) => {
                    r.roles = roles.clone();
                    1
                }
                None => 0,
            },
        }
    }
}

/// In-memory store.
///
/// Every transaction works on its own snapshot. Commit fails with
/// [`StoreError::Conflict`] when any key the transaction read or wrote was
/// changed by another commit in the meantime (first committer wins).
#[derive(Clone, Default)]
pub struct InMemoryAppointmentStore {
    state: Arc<Mutex<InMemoryState>>,
    injected_conflicts: Arc<AtomicU32>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` writing commits fail with a conflict.
    pub fn inject_conflicts(&self, n: u32) {
        self.injected_conflicts.store(n, Ordering::SeqCst);
    }

    /// Setup: register a tier outside any transaction.
    pub async fn insert_tier(&self, tier: ExperienceTier) {
        self.write_now(Write::PutTier(tier)).await;
    }

    /// Setup: register a template outside any transaction.
    pub async fn insert_template(&self, template: Template) {
        self.write_now(Write::PutTemplate(template)).await;
    }

    /// Setup: register a participant profile outside any transaction.
    pub async fn insert_profile(&self, profile: ParticipantProfile) {
        self.write_now(Write::PutProfile(profile)).await;
    }

    async fn write_now(&self, write: Write) {
        let mut state = self.state.lock().await;
        let keys = state.keys_of(&write);
        state.apply(&write);
        for key in keys {
            state.bump(key);
        }
    }

    /// Committed registrations of one appointment (for testing)
    #[cfg(test)]
    pub async fn registrations_of(&self, appointment: AppointmentId) -> Vec<Registration> {
        let state = self.state.lock().await;
        state
            .registrations
            .values()
            .filter(|r| r.appointment_id == appointment)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let snapshot = self.state.lock().await.clone();
        Ok(Box::new(InMemoryTransaction {
            shared: Arc::clone(&self.state),
            injected_conflicts: Arc::clone(&self.injected_conflicts),
            base: snapshot.versions.clone(),
            snapshot,
            read: HashSet::new(),
            written: HashSet::new(),
            log: Vec::new(),
        }))
    }
}

/// Transaction over a private snapshot.
struct InMemoryTransaction {
    shared: Arc<Mutex<InMemoryState>>,
    injected_conflicts: Arc<AtomicU32>,

    /// Versions as of `begin`.
    base: HashMap<Key, u64>,
    snapshot: InMemoryState,
    read: HashSet<Key>,
    written: HashSet<Key>,
    log: Vec<Write>,
}

impl InMemoryTransaction {
    fn stage(&mut self, write: Write) -> usize {
        self.written.extend(self.snapshot.keys_of(&write));
        let touched = self.snapshot.apply(&write);
        self.log.push(write);
        touched
    }

    fn take_injected_conflict(&self) -> bool {
        self.injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn appointment(&mut self, id: AppointmentId) -> Result<Option<Appointment>, StoreError> {
        self.read.insert(Key::Appointment(id));
        Ok(self.snapshot.appointments.get(&id).cloned())
    }

    async fn put_appointment(&mut self, appointment: &Appointment) -> Result<(), StoreError> {
        self.stage(Write::PutAppointment(appointment.clone()));
        Ok(())
    }

    async fn template(&mut self, id: TemplateId) -> Result<Option<Template>, StoreError> {
        self.read.insert(Key::Template(id));
        Ok(self.snapshot.templates.get(&id).cloned())
    }

    async fn put_template(&mut self, template: &Template) -> Result<(), StoreError> {
        self.stage(Write::PutTemplate(template.clone()));
        Ok(())
    }

    async fn tier(&mut self, id: TierId) -> Result<Option<ExperienceTier>, StoreError> {
        self.read.insert(Key::Tiers);
        Ok(self.snapshot.tiers.get(&id).cloned())
    }

    async fn tiers(&mut self) -> Result<Vec<ExperienceTier>, StoreError> {
        self.read.insert(Key::Tiers);
        Ok(self.snapshot.tiers.values().cloned().collect())
    }

    async fn put_tier(&mut self, tier: &ExperienceTier) -> Result<(), StoreError> {
        self.stage(Write::PutTier(tier.clone()));
        Ok(())
    }

    async fn profile(
        &mut self,
        participant: ParticipantId,
    ) -> Result<Option<ParticipantProfile>, StoreError> {
        self.read.insert(Key::Participant(participant));
        Ok(self.snapshot.profiles.get(&participant).cloned())
    }

    async fn put_profile(&mut self, profile: &ParticipantProfile) -> Result<(), StoreError> {
        self.stage(Write::PutProfile(profile.clone()));
        Ok(())
    }

    async fn registration_for(
        &mut self,
        appointment: AppointmentId,
        participant: ParticipantId,
    ) -> Result<Option<Registration>, StoreError> {
        self.read.insert(Key::Appointment(appointment));
        Ok(self
            .snapshot
            .find_registration(appointment, participant)
            .cloned())
    }

    async fn registrations(
        &mut self,
        appointment: AppointmentId,
    ) -> Result<Vec<Registration>, StoreError> {
        self.read.insert(Key::Appointment(appointment));
        let mut rows: Vec<Registration> = self
            .snapshot
            .registrations
            .values()
            .filter(|r| r.appointment_id == appointment)
            .cloned()
            .collect();
        rows.sort_by_key(|r| (r.registered_at, r.id));
        Ok(rows)
    }

    async fn appointments_for_participant(
        &mut self,
        participant: ParticipantId,
    ) -> Result<Vec<AppointmentId>, StoreError> {
        self.read.insert(Key::Participant(participant));
        let mut ids: Vec<AppointmentId> = self
            .snapshot
            .registrations
            .values()
            .filter(|r| r.participant_id == participant)
            .map(|r| r.appointment_id)
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn insert_registration(
        &mut self,
        registration: &Registration,
    ) -> Result<(), StoreError> {
        self.read.insert(Key::Appointment(registration.appointment_id));
        if self
            .snapshot
            .find_registration(registration.appointment_id, registration.participant_id)
            .is_some()
        {
            return Err(StoreError::Conflict);
        }
        self.stage(Write::InsertRegistration(registration.clone()));
        Ok(())
    }

    async fn delete_registration(&mut self, id: RegistrationId) -> Result<bool, StoreError> {
        Ok(self.stage(Write::DeleteRegistration(id)) > 0)
    }

    async fn set_assigned_tier(
        &mut self,
        appointment: AppointmentId,
        ids: &[RegistrationId],
        tier: Option<TierId>,
    ) -> Result<usize, StoreError> {
        Ok(self.stage(Write::AssignTier {
            appointment,
            ids: ids.to_vec(),
            tier,
        }))
    }

    async fn set_roles(&mut self, id: RegistrationId, roles: &[RoleId]) -> Result<bool, StoreError> {
        Ok(self.stage(Write::SetRoles {
            id,
            roles: roles.to_vec(),
        }) > 0)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        if self.log.is_empty() {
            return Ok(());
        }

        let mut live = self.shared.lock().await;
        if self.take_injected_conflict() {
            return Err(StoreError::Conflict);
        }

        let base_version = |key: &Key| self.base.get(key).copied().unwrap_or(0);
        if self
            .read
            .iter()
            .chain(self.written.iter())
            .any(|key| live.version(key) != base_version(key))
        {
            return Err(StoreError::Conflict);
        }

        for write in &self.log {
            live.apply(write);
        }
        for key in &self.written {
            live.bump(*key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    async fn seeded() -> (InMemoryAppointmentStore, Appointment) {
        let store = InMemoryAppointmentStore::new();
        let tier = ExperienceTier::new("veteran", 1);
        let template = Template::new("raid").with_requirement(tier.id, 2);
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap();
        let appointment = Appointment {
            id: AppointmentId::random(),
            scheduled_at: start,
            deadline: start - Duration::hours(1),
            group_count: 1,
            template_id: template.id,
            committed: false,
        };
        store.insert_tier(tier).await;
        store.insert_template(template).await;

        let mut tx = store.begin().await.unwrap();
        tx.put_appointment(&appointment).await.unwrap();
        tx.commit().await.unwrap();
        (store, appointment)
    }

    fn registration(appointment: AppointmentId) -> Registration {
        Registration::new(
            RegistrationId::random(),
            appointment,
            ParticipantId::random(),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn uncommitted_writes_are_invisible() {
        let (store, appt) = seeded().await;

        let mut tx = store.begin().await.unwrap();
        tx.insert_registration(&registration(appt.id)).await.unwrap();
        assert_eq!(tx.registrations(appt.id).await.unwrap().len(), 1);
        drop(tx);

        assert!(store.registrations_of(appt.id).await.is_empty());
    }

    #[tokio::test]
    async fn second_writer_on_same_appointment_conflicts() {
        let (store, appt) = seeded().await;

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first.registrations(appt.id).await.unwrap();
        second.registrations(appt.id).await.unwrap();
        first.insert_registration(&registration(appt.id)).await.unwrap();
        second.insert_registration(&registration(appt.id)).await.unwrap();

        first.commit().await.unwrap();
        assert!(matches!(second.commit().await, Err(StoreError::Conflict)));
        assert_eq!(store.registrations_of(appt.id).await.len(), 1);
    }

    #[tokio::test]
    async fn different_appointments_do_not_conflict() {
        let (store, appt) = seeded().await;
        let mut other = appt.clone();
        other.id = AppointmentId::random();
        let mut tx = store.begin().await.unwrap();
        tx.put_appointment(&other).await.unwrap();
        tx.commit().await.unwrap();

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first.insert_registration(&registration(appt.id)).await.unwrap();
        second.insert_registration(&registration(other.id)).await.unwrap();

        first.commit().await.unwrap();
        second.commit().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_participant_is_rejected() {
        let (store, appt) = seeded().await;
        let r = registration(appt.id);
        let mut again = r.clone();
        again.id = RegistrationId::random();

        let mut tx = store.begin().await.unwrap();
        tx.insert_registration(&r).await.unwrap();
        assert!(matches!(
            tx.insert_registration(&again).await,
            Err(StoreError::Conflict)
        ));
    }

    #[tokio::test]
    async fn batched_tier_update_counts_only_matching_rows() {
        let (store, appt) = seeded().await;
        let r = registration(appt.id);
        let stranger = RegistrationId::random();
        let tier = TierId::random();

        let mut tx = store.begin().await.unwrap();
        tx.insert_registration(&r).await.unwrap();
        let updated = tx
            .set_assigned_tier(appt.id, &[r.id, stranger], Some(tier))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(updated, 1);
        let rows = store.registrations_of(appt.id).await;
        assert_eq!(rows[0].assigned_tier, Some(tier));
    }

    #[tokio::test]
    async fn delete_cascades_roles() {
        let (store, appt) = seeded().await;
        let r = registration(appt.id);

        let mut tx = store.begin().await.unwrap();
        tx.insert_registration(&r).await.unwrap();
        assert!(tx.set_roles(r.id, &[RoleId::random()]).await.unwrap());
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.delete_registration(r.id).await.unwrap());
        assert!(!tx.set_roles(r.id, &[RoleId::random()]).await.unwrap());
        tx.commit().await.unwrap();

        assert!(store.registrations_of(appt.id).await.is_empty());
    }

    #[tokio::test]
    async fn injected_conflict_fails_one_commit() {
        let (store, appt) = seeded().await;
        store.inject_conflicts(1);

        let mut tx = store.begin().await.unwrap();
        tx.insert_registration(&registration(appt.id)).await.unwrap();
        assert!(matches!(tx.commit().await, Err(StoreError::Conflict)));

        let mut tx = store.begin().await.unwrap();
        tx.insert_registration(&registration(appt.id)).await.unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn directory_writes_go_through_transactions() {
        let store = InMemoryAppointmentStore::new();
        let tier = ExperienceTier::new("mentor", 0);
        let template = Template::new("training").with_requirement(tier.id, 1);

        let mut tx = store.begin().await.unwrap();
        tx.put_tier(&tier).await.unwrap();
        tx.put_template(&template).await.unwrap();
        assert_eq!(tx.tier(tier.id).await.unwrap(), Some(tier.clone()));
        drop(tx);

        let mut tx = store.begin().await.unwrap();
        assert!(tx.tiers().await.unwrap().is_empty());
        tx.put_tier(&tier).await.unwrap();
        tx.put_template(&template).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.tiers().await.unwrap(), vec![tier]);
        assert_eq!(tx.template(template.id).await.unwrap(), Some(template));
    }

    #[tokio::test]
    async fn concurrent_tier_edits_conflict() {
        let store = InMemoryAppointmentStore::new();

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first.put_tier(&ExperienceTier::new("a", 1)).await.unwrap();
        second.put_tier(&ExperienceTier::new("b", 2)).await.unwrap();

        first.commit().await.unwrap();
        assert!(matches!(second.commit().await, Err(StoreError::Conflict)));
    }
}
