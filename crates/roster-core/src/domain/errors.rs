//! Errors - エラー型と分類
//!
//! サービス操作はすべて `SignupError` を返します。
//! 呼び出し側（コマンド層）は `kind()` を見てメッセージを出し分けます。

use thiserror::Error;

use super::ids::{AppointmentId, ParticipantId, TemplateId, TierId};
use super::tier::TierRank;
use crate::ports::{ScoreError, StoreError};

/// ErrorKind はエラーの運用分類
///
/// - Rejected: 業務上の拒否（ユーザーに説明する）
/// - Conflict: 同一 appointment への同時更新（再試行で解消しうる）
/// - Infrastructure: 外部依存の障害（致命的、呼び出し側へ伝播）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Rejected,
    Conflict,
    Infrastructure,
}

#[derive(Debug, Error)]
pub enum SignupError {
    #[error("participant {participant} ({rank:?}) does not qualify for any tier offered")]
    NotQualified {
        participant: ParticipantId,
        rank: Option<TierRank>,
    },

    #[error("no active appointment {0}")]
    NoActiveAppointment(AppointmentId),

    #[error("write conflict on appointment {0}")]
    WriteConflict(AppointmentId),

    #[error("priority score provider unavailable")]
    ProviderUnavailable(#[source] ScoreError),

    #[error("unknown template {0}")]
    UnknownTemplate(TemplateId),

    #[error("unknown tier {0}")]
    UnknownTier(TierId),

    #[error("group count must be at least 1, got {0}")]
    InvalidGroupCount(u32),

    #[error("at most {max} role choices allowed, got {given}")]
    TooManyRoles { given: usize, max: usize },

    #[error("participant {participant} is not registered for {appointment}")]
    NotRegistered {
        appointment: AppointmentId,
        participant: ParticipantId,
    },

    #[error("registration deadline of {0} has passed")]
    RegistrationClosed(AppointmentId),

    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

impl SignupError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SignupError::WriteConflict(_) | SignupError::Store(StoreError::Conflict) => {
                ErrorKind::Conflict
            }
            SignupError::ProviderUnavailable(_) | SignupError::Store(_) => {
                ErrorKind::Infrastructure
            }
            _ => ErrorKind::Rejected,
        }
    }

    /// Expected outcome the caller should present, not a fault.
    pub fn is_business(&self) -> bool {
        self.kind() != ErrorKind::Infrastructure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_outcomes_are_not_infrastructure() {
        let appointment = AppointmentId::random();

        assert!(SignupError::NoActiveAppointment(appointment).is_business());
        assert_eq!(
            SignupError::WriteConflict(appointment).kind(),
            ErrorKind::Conflict
        );
        assert!(
            SignupError::NotQualified {
                participant: ParticipantId::random(),
                rank: Some(TierRank(4)),
            }
            .is_business()
        );
    }

    #[test]
    fn provider_and_store_failures_are_fatal() {
        let provider = SignupError::ProviderUnavailable(ScoreError::Unavailable("timeout".into()));
        let store = SignupError::from(StoreError::Backend("disk".into()));

        assert_eq!(provider.kind(), ErrorKind::Infrastructure);
        assert!(!store.is_business());
    }

    #[test]
    fn store_conflict_counts_as_conflict() {
        let conflict = SignupError::from(StoreError::Conflict);

        assert_eq!(conflict.kind(), ErrorKind::Conflict);
    }
}
