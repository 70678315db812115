// src/client/runtime.rs

use std::sync::{Arc, Weak};

use tokio::sync::Mutex;

use crate::{
    client::{
        api::QuizBackend,
        autosave::AutosaveCoordinator,
        clock::{Countdown, DriftClock, LocalClock},
        error::{ClientError, ClientResult},
    },
    models::attempt::{AnswerMap, SaveProgressResponse, SessionView, SubmitResult},
    utils::time::parse_timestamp,
};

#[derive(Default)]
struct RuntimeState {
    session: Option<SessionView>,
    drift: DriftClock,
    answers: AnswerMap,
    result: Option<SubmitResult>,
}

/// Drives one attempt from load to submission.
///
/// Local answers are the source of truth until a submission succeeds: they
/// are autosaved in the background, force-synced right before submitting,
/// and kept intact when a submission fails so it can be retried.
pub struct QuizRuntime {
    attempt_id: String,
    backend: Arc<dyn QuizBackend>,
    clock: Arc<dyn LocalClock>,
    autosave: AutosaveCoordinator,
    state: Mutex<RuntimeState>,
    countdown: Mutex<Option<Countdown>>,
    // serialises manual and time-up submissions
    submit_lock: Mutex<()>,
}

impl QuizRuntime {
    pub fn new(backend: Arc<dyn QuizBackend>, clock: Arc<dyn LocalClock>, attempt_id: impl Into<String>) -> Arc<Self> {
        let attempt_id = attempt_id.into();
        Arc::new(Self {
            autosave: AutosaveCoordinator::spawn(backend.clone(), attempt_id.clone()),
            attempt_id,
            backend,
            clock,
            state: Mutex::new(RuntimeState::default()),
            countdown: Mutex::new(None),
            submit_lock: Mutex::new(()),
        })
    }

    pub fn attempt_id(&self) -> &str {
        &self.attempt_id
    }

    /// Fetches the attempt, calibrates drift and starts the countdown.
    ///
    /// Answers already saved on the server are restored; local edits made
    /// before the load take precedence. An unparseable `serverNow` means no
    /// drift; an unparseable `endAt` means the time is already up.
    pub async fn load(self: &Arc<Self>) -> ClientResult<SessionView> {
        let session = self.backend.get_session(&self.attempt_id).await?;
        let drift = DriftClock::calibrate(&session.server_now, self.clock.now());

        {
            let mut state = self.state.lock().await;
            let mut answers = session.current_answers.clone();
            answers.extend(std::mem::take(&mut state.answers));
            state.answers = answers;
            state.drift = drift;
            state.session = Some(session.clone());
        }
        self.autosave.set_session_loaded(!session.is_completed);

        if !session.is_completed {
            // epoch end expires on the first tick
            let end_at = parse_timestamp(&session.end_at).unwrap_or_default();
            let runtime: Weak<Self> = Arc::downgrade(self);
            let countdown = Countdown::spawn(end_at, drift, self.clock.clone(), move || {
                if let Some(runtime) = runtime.upgrade() {
                    tokio::spawn(async move {
                        if let Err(e) = runtime.on_time_up().await {
                            tracing::error!("Auto-submit of {} failed: {}", runtime.attempt_id, e);
                        }
                    });
                }
            });
            *self.countdown.lock().await = Some(countdown);
        }

        tracing::info!(
            "Attempt {} loaded: {} questions, drift {} ms",
            self.attempt_id,
            session.questions.len(),
            drift.drift_ms()
        );
        Ok(session)
    }

    pub async fn set_answer(&self, question_id: impl Into<String>, option_ids: Vec<String>) {
        let snapshot = {
            let mut state = self.state.lock().await;
            state.answers.insert(question_id.into(), option_ids);
            state.answers.clone()
        };
        self.autosave.answers_changed(snapshot);
    }

    pub async fn answers(&self) -> AnswerMap {
        self.state.lock().await.answers.clone()
    }

    pub async fn drift(&self) -> DriftClock {
        self.state.lock().await.drift
    }

    /// Seconds left by the drift-corrected clock; 0 before load.
    pub async fn remaining_secs(&self) -> u64 {
        let state = self.state.lock().await;
        match &state.session {
            Some(session) => state.drift.remaining_secs(&session.end_at, self.clock.now()),
            None => 0,
        }
    }

    /// Whether a countdown is running for this attempt.
    pub async fn is_counting_down(&self) -> bool {
        self.countdown
            .lock()
            .await
            .as_ref()
            .is_some_and(|countdown| !countdown.is_finished())
    }

    pub fn last_saved_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.autosave.last_saved_at()
    }

    pub async fn result(&self) -> Option<SubmitResult> {
        self.state.lock().await.result.clone()
    }

    /// Explicit save. The acknowledgement carries a fresh server timestamp,
    /// so drift is re-measured from it.
    pub async fn save_progress(&self) -> ClientResult<SaveProgressResponse> {
        let answers = self.answers().await;
        let ack = self.backend.save_progress(&self.attempt_id, &answers).await?;

        let drift = DriftClock::calibrate(&ack.server_now, self.clock.now());
        self.state.lock().await.drift = drift;
        if let Some(countdown) = self.countdown.lock().await.as_ref() {
            countdown.recalibrate(drift);
        }
        Ok(ack)
    }

    /// Final sync, then submission with the same answers as payload.
    ///
    /// A second call after success returns the stored result without
    /// contacting the server.
    pub async fn submit(&self) -> ClientResult<SubmitResult> {
        let _guard = self.submit_lock.lock().await;

        let answers = {
            let state = self.state.lock().await;
            if let Some(result) = &state.result {
                return Ok(result.clone());
            }
            if state.session.is_none() {
                return Err(ClientError::Validation("Attempt is not loaded".to_string()));
            }
            state.answers.clone()
        };

        match self.sync_and_submit(&answers).await {
            Ok(result) => {
                self.state.lock().await.result = Some(result.clone());
                self.autosave.shutdown();
                if let Some(countdown) = self.countdown.lock().await.take() {
                    countdown.stop();
                }
                tracing::info!("Attempt {} submitted: score {}", self.attempt_id, result.score);
                Ok(result)
            }
            Err(e) => {
                tracing::error!(
                    "Submission of {} failed, {} answers kept for retry: {}",
                    self.attempt_id,
                    answers.len(),
                    e
                );
                Err(e)
            }
        }
    }

    async fn sync_and_submit(&self, answers: &AnswerMap) -> ClientResult<SubmitResult> {
        if answers.is_empty() {
            return self.backend.submit(&self.attempt_id, None).await;
        }
        self.backend.save_progress(&self.attempt_id, answers).await?;
        self.backend.submit(&self.attempt_id, Some(answers)).await
    }

    /// Countdown expiry. Same path as a manual submit.
    pub async fn on_time_up(&self) -> ClientResult<SubmitResult> {
        tracing::info!("Time is up for {}, submitting", self.attempt_id);
        self.submit().await
    }
}
