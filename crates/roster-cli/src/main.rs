use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use roster_core::app::{ServiceBuilder, ServiceConfig, load_roster};
use roster_core::domain::{
    AppointmentId, ExperienceTier, NewAppointment, ParticipantId, ParticipantProfile, Template,
};
use roster_core::impls::{InMemoryAppointmentStore, ScoreTable};
use roster_core::ports::{AppointmentStore, NotifyError, PresentationNotifier};

#[derive(Debug, Deserialize)]
struct SeedParticipant {
    name: String,
    tier: String,
    score: Option<f64>,
}

/// 表示係：commit 後の roster を読み直して標準出力へ
struct PrintingNotifier {
    store: InMemoryAppointmentStore,
    names: HashMap<ParticipantId, String>,
}

#[async_trait]
impl PresentationNotifier for PrintingNotifier {
    async fn republish(&self, appointment: AppointmentId) -> Result<(), NotifyError> {
        let mut tx = self
            .store
            .begin()
            .await
            .map_err(|e| NotifyError::Failed(e.to_string()))?;
        let roster = load_roster(tx.as_mut(), appointment)
            .await
            .map_err(|e| NotifyError::Failed(e.to_string()))?;

        let name = |id: &ParticipantId| {
            self.names
                .get(id)
                .cloned()
                .unwrap_or_else(|| id.to_string())
        };
        println!(
            "--- roster {} (groups={}) ---",
            appointment, roster.appointment.group_count
        );
        for bucket in &roster.buckets {
            let members: Vec<String> = bucket
                .occupants
                .iter()
                .map(|e| name(&e.participant_id))
                .collect();
            println!(
                "  {:<8} {}/{} {:?}",
                bucket.tier_name,
                bucket.occupants.len(),
                bucket.capacity,
                members
            );
        }
        let bench: Vec<String> = roster.bench.iter().map(|e| name(&e.participant_id)).collect();
        println!("  {:<8} {:?}", "bench", bench);
        Ok(())
    }
}

/// ROSTER_CONFIG が指す JSON ファイルを読む（無ければデフォルト）
fn load_config() -> ServiceConfig {
    let Ok(path) = std::env::var("ROSTER_CONFIG") else {
        return ServiceConfig::default();
    };
    let parsed = std::fs::read_to_string(&path)
        .map_err(|e| e.to_string())
        .and_then(|json| ServiceConfig::from_json(&json).map_err(|e| e.to_string()));
    match parsed {
        Ok(config) => config,
        Err(error) => {
            warn!(%path, %error, "ignoring ROSTER_CONFIG");
            ServiceConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // (A) store に tier と template を用意
    let store = InMemoryAppointmentStore::new();
    let veteran = ExperienceTier::new("veteran", 1);
    let rookie = ExperienceTier::new("rookie", 2);
    let template = Template::new("raid")
        .with_requirement(veteran.id, 2)
        .with_requirement(rookie.id, 1);
    store.insert_tier(veteran.clone()).await;
    store.insert_tier(rookie.clone()).await;
    store.insert_template(template.clone()).await;

    // (B) 参加者（tier + score）を投入
    let seed: Vec<SeedParticipant> = serde_json::from_value(serde_json::json!([
        { "name": "aki",   "tier": "veteran", "score": 92.0 },
        { "name": "ben",   "tier": "veteran", "score": 75.5 },
        { "name": "chika", "tier": "veteran", "score": 88.0 },
        { "name": "dai",   "tier": "rookie",  "score": 99.0 },
        { "name": "emi",   "tier": "rookie" }
    ]))?;
    let scores = Arc::new(ScoreTable::new());
    let mut names = HashMap::new();
    let mut participants = Vec::new();
    for p in seed {
        let id = ParticipantId::random();
        let tier = if p.tier == veteran.name { &veteran } else { &rookie };
        store
            .insert_profile(ParticipantProfile {
                participant_id: id,
                tier_id: Some(tier.id),
            })
            .await;
        if let Some(score) = p.score {
            scores.set(id, score);
        }
        names.insert(id, p.name);
        participants.push(id);
    }

    // (C) サービスを組み立てる
    let service = ServiceBuilder::new()
        .store(Arc::new(store.clone()))
        .scores(scores)
        .notifier(Arc::new(PrintingNotifier {
            store: store.clone(),
            names,
        }))
        .config(load_config())
        .build()?;

    let now = Utc::now();
    let appointment = service
        .create_appointment(NewAppointment {
            scheduled_at: now + Duration::days(1),
            deadline: now + Duration::hours(12),
            group_count: 1,
            template_id: template.id,
        })
        .await?;

    // (D) join → leave → group 数変更
    for &participant in &participants {
        match service.join(appointment, participant).await {
            Ok(outcome) => info!(placement = ?outcome.placement, "join"),
            Err(e) if e.is_business() => warn!(error = %e, "join rejected"),
            Err(e) => return Err(e.into()),
        }
    }
    service.leave(appointment, participants[0]).await?;
    service.set_group_count(appointment, 2).await?;

    let counts = service.roster(appointment).await?.counts();
    println!("counts: {:?}", counts);
    Ok(())
}
