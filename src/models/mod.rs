// src/models/mod.rs

pub mod attempt;
pub mod category;
pub mod leaderboard;
pub mod question;
