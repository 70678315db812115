// src/client/autosave.rs

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

use crate::{client::api::QuizBackend, models::attempt::AnswerMap};

/// Idle period after the last edit before a save.
pub const DEBOUNCE: Duration = Duration::from_secs(2);
/// Backstop save interval, independent of edits.
pub const PERIODIC: Duration = Duration::from_secs(30);

enum Command {
    Changed(AnswerMap),
    SessionLoaded(bool),
    Flush(oneshot::Sender<bool>),
}

/// Keeps the server's answer map eventually consistent with local edits.
///
/// Saves run on a debounce after each change and on a fixed interval.
/// Failures are logged and dropped; the final sync at submit time recovers
/// anything lost.
#[derive(Debug)]
pub struct AutosaveCoordinator {
    tx: mpsc::UnboundedSender<Command>,
    last_saved: watch::Receiver<Option<DateTime<Utc>>>,
    task: JoinHandle<()>,
}

struct Worker {
    backend: Arc<dyn QuizBackend>,
    attempt_id: String,
    answers: AnswerMap,
    loaded: bool,
    last_saved: watch::Sender<Option<DateTime<Utc>>>,
}

impl Worker {
    async fn save(&self) -> bool {
        if !self.loaded || self.answers.is_empty() {
            return false;
        }
        match self.backend.save_progress(&self.attempt_id, &self.answers).await {
            Ok(_) => {
                self.last_saved.send_replace(Some(Utc::now()));
                tracing::debug!("Auto-saved {} answers for {}", self.answers.len(), self.attempt_id);
                true
            }
            Err(e) => {
                tracing::warn!("Auto-save failed for {}: {}", self.attempt_id, e);
                false
            }
        }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        let debounce = tokio::time::sleep(DEBOUNCE);
        tokio::pin!(debounce);
        let mut armed = false;

        let mut periodic = tokio::time::interval_at(Instant::now() + PERIODIC, PERIODIC);
        periodic.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = &mut debounce, if armed => {
                    armed = false;
                    self.save().await;
                }
                _ = periodic.tick() => {
                    self.save().await;
                }
                cmd = rx.recv() => match cmd {
                    Some(Command::Changed(answers)) => {
                        self.answers = answers;
                        debounce.as_mut().reset(Instant::now() + DEBOUNCE);
                        armed = true;
                    }
                    Some(Command::SessionLoaded(loaded)) => self.loaded = loaded,
                    Some(Command::Flush(reply)) => {
                        armed = false;
                        let saved = self.save().await;
                        let _ = reply.send(saved);
                    }
                    None => break,
                },
            }
        }
    }
}

impl AutosaveCoordinator {
    pub fn spawn(backend: Arc<dyn QuizBackend>, attempt_id: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (last_saved_tx, last_saved) = watch::channel(None);
        let worker = Worker {
            backend,
            attempt_id: attempt_id.into(),
            answers: AnswerMap::new(),
            loaded: false,
            last_saved: last_saved_tx,
        };
        let task = tokio::spawn(worker.run(rx));
        Self { tx, last_saved, task }
    }

    /// Replaces the pending answer snapshot and restarts the debounce.
    pub fn answers_changed(&self, answers: AnswerMap) {
        let _ = self.tx.send(Command::Changed(answers));
    }

    /// Saves are skipped until the attempt has loaded.
    pub fn set_session_loaded(&self, loaded: bool) {
        let _ = self.tx.send(Command::SessionLoaded(loaded));
    }

    /// Saves immediately. Returns whether anything was saved.
    pub async fn flush(&self) -> bool {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Command::Flush(reply)).is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        *self.last_saved.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.last_saved.clone()
    }

    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for AutosaveCoordinator {
    fn drop(&mut self) {
        self.task.abort();
    }
}
