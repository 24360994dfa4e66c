use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use tokio::sync::{broadcast, OwnedMutexGuard};

use crate::config::{AppConfig, SalonConfig};
use crate::models::BookingEvent;
use crate::services::ai::LlmProvider;
use crate::services::extraction::ExtractionOrchestrator;
use crate::services::mail::Mailer;
use crate::services::memory::SqliteMemory;
use crate::services::voice::{SpeechToText, TextToSpeech};

/// One async lock per session id, so turns of a session run one at a time.
/// An entry lives only while some turn holds or waits for it.
#[derive(Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionLocks {
    fn map(&self) -> MutexGuard<'_, HashMap<String, Arc<tokio::sync::Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Waits for exclusive use of the session. The entry is dropped from
    /// the map when the last holder or waiter lets go.
    pub async fn acquire(&self, session_id: &str) -> SessionGuard<'_> {
        let lock = self.map().entry(session_id.to_string()).or_default().clone();
        let guard = lock.lock_owned().await;
        SessionGuard {
            locks: self,
            session_id: session_id.to_string(),
            guard: Some(guard),
        }
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }

    fn release(&self, session_id: &str) {
        let mut locks = self.map();
        let idle = locks
            .get(session_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            locks.remove(session_id);
        }
    }
}

pub struct SessionGuard<'a> {
    locks: &'a SessionLocks,
    session_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks.release(&self.session_id);
    }
}

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub salon: SalonConfig,
    pub memory: SqliteMemory,
    pub extraction: ExtractionOrchestrator,
    pub llm: Box<dyn LlmProvider>,
    pub stt: Box<dyn SpeechToText>,
    pub tts: Box<dyn TextToSpeech>,
    pub mailer: Box<dyn Mailer>,
    pub sessions: SessionLocks,
    pub booking_tx: broadcast::Sender<BookingEvent>,
}

/// The external collaborators, chosen by the binary (or a test).
pub struct Providers {
    pub llm: Box<dyn LlmProvider>,
    pub stt: Box<dyn SpeechToText>,
    pub tts: Box<dyn TextToSpeech>,
    pub mailer: Box<dyn Mailer>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        salon: SalonConfig,
        conn: Connection,
        providers: Providers,
    ) -> anyhow::Result<Self> {
        let db = Arc::new(Mutex::new(conn));
        let extraction =
            ExtractionOrchestrator::new(&salon)?.with_llm_timeout(config.llm_extraction_timeout);
        let (booking_tx, _) = broadcast::channel(64);

        Ok(Self {
            memory: SqliteMemory::new(db.clone()),
            db,
            config,
            salon,
            extraction,
            llm: providers.llm,
            stt: providers.stt,
            tts: providers.tts,
            mailer: providers.mailer,
            sessions: SessionLocks::default(),
            booking_tx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_session_lock_removed_after_release() {
        let locks = SessionLocks::default();
        let guard = locks.acquire("caller-1").await;
        let other = locks.acquire("caller-2").await;
        assert_eq!(locks.len(), 2);

        drop(guard);
        assert_eq!(locks.len(), 1);
        drop(other);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_session_lock_kept_while_waiter_queued() {
        let locks = Arc::new(SessionLocks::default());
        let first = locks.acquire("caller-1").await;

        let waiting = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _second = locks.acquire("caller-1").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(locks.len(), 1);
        assert!(!waiting.is_finished());

        drop(first);
        waiting.await.unwrap();
        assert!(locks.is_empty());
    }
}
