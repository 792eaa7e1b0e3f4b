//! Notifier implementations for development and tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::AppointmentId;
use crate::ports::{NotifyError, PresentationNotifier};

/// Does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl PresentationNotifier for NoopNotifier {
    async fn republish(&self, _appointment: AppointmentId) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Records every republish request in call order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<AppointmentId>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<AppointmentId> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl PresentationNotifier for RecordingNotifier {
    async fn republish(&self, appointment: AppointmentId) -> Result<(), NotifyError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(appointment);
        Ok(())
    }
}
