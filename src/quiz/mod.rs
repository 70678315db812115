// src/quiz/mod.rs

pub mod attempts;
pub mod leaderboard;
pub mod scoring;
pub mod shuffle;

pub use attempts::AttemptService;
