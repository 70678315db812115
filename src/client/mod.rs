// src/client/mod.rs

//! Client library for taking a quiz against the HTTP API.
//!
//! [`ApiClient`] does the HTTP calls with timeouts and bounded retry;
//! [`QuizRuntime`] ties it to the drift-corrected countdown and the
//! autosave worker.

pub mod api;
pub mod autosave;
pub mod clock;
pub mod error;
pub mod retry;
pub mod runtime;

pub use api::{ApiClient, QuizBackend};
pub use autosave::AutosaveCoordinator;
pub use clock::{Countdown, DriftClock, LocalClock, SystemClock};
pub use error::{ClientError, ClientResult};
pub use retry::RetryPolicy;
pub use runtime::QuizRuntime;
