// src/quiz/scoring.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::models::{
    attempt::{AnswerMap, BreakdownEntry, Outcome, SubmitResult},
    question::{PublicQuestion, Question},
};

/// Maps client-space option ids back to canonical ids.
///
/// Shuffling only reorders options, so an id the client saw normally names
/// the same canonical option; that identity is used first. Otherwise the id
/// is resolved to its text in the projection and matched by text against
/// the original. Unresolvable ids pass through unchanged.
pub fn remap_to_canonical(
    chosen: &[String],
    projected: &PublicQuestion,
    original: &Question,
) -> Vec<String> {
    chosen
        .iter()
        .map(|selected| {
            let Some(client_option) = projected.option(selected) else {
                return selected.clone();
            };
            if original.option(&client_option.id).is_some() {
                return client_option.id.clone();
            }
            original
                .options
                .iter()
                .find(|o| o.text == client_option.text)
                .map(|o| o.id.clone())
                .unwrap_or_else(|| selected.clone())
        })
        .collect()
}

/// Exact, order-independent match. An empty selection is never correct.
pub fn answers_match(chosen: &[String], correct: &[String]) -> bool {
    if chosen.is_empty() {
        return false;
    }
    let mut chosen = chosen.to_vec();
    let mut correct = correct.to_vec();
    chosen.sort();
    correct.sort();
    chosen == correct
}

/// Grades one question against its original record.
pub fn grade_question(
    projected: &PublicQuestion,
    original: &Question,
    chosen: &[String],
) -> BreakdownEntry {
    let user_answer_ids = remap_to_canonical(chosen, projected, original);
    let correct_answer_ids = original.correct_option_ids.clone();
    let is_correct = answers_match(&user_answer_ids, &correct_answer_ids);

    let outcome = if chosen.is_empty() {
        Outcome::Unselected
    } else if is_correct {
        Outcome::Correct
    } else {
        Outcome::Incorrect
    };

    BreakdownEntry {
        question_id: projected.id.clone(),
        is_correct,
        outcome,
        user_answer_texts: user_answer_ids
            .iter()
            .map(|id| original.option_text_or_id(id))
            .collect(),
        correct_answer_texts: correct_answer_ids
            .iter()
            .map(|id| original.option_text_or_id(id))
            .collect(),
        user_answer_ids,
        correct_answer_ids,
        explanation: original.explanation.clone(),
    }
}

/// `round(correct / total * 100)`, 0 for an empty attempt.
pub fn percentage(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((correct as f64 / total as f64) * 100.0).round() as u32
}

/// Grades every question in presentation order and aggregates the counts.
///
/// A projected question without an original record counts as unselected.
pub fn score_attempt(
    projected: &[PublicQuestion],
    originals: &[Question],
    answers: &AnswerMap,
    started_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> SubmitResult {
    let by_id: HashMap<&str, &Question> = originals.iter().map(|q| (q.id.as_str(), q)).collect();

    let mut correct_count = 0;
    let mut incorrect_count = 0;
    let mut unselected_count = 0;

    let breakdown: Vec<BreakdownEntry> = projected
        .iter()
        .map(|client_q| {
            let Some(original) = by_id.get(client_q.id.as_str()) else {
                unselected_count += 1;
                return BreakdownEntry {
                    question_id: client_q.id.clone(),
                    is_correct: false,
                    outcome: Outcome::Unselected,
                    user_answer_ids: Vec::new(),
                    correct_answer_ids: Vec::new(),
                    user_answer_texts: Vec::new(),
                    correct_answer_texts: Vec::new(),
                    explanation: None,
                };
            };

            let chosen = answers.get(&client_q.id).map(Vec::as_slice).unwrap_or(&[]);
            let entry = grade_question(client_q, original, chosen);
            match entry.outcome {
                Outcome::Correct => correct_count += 1,
                Outcome::Incorrect => incorrect_count += 1,
                Outcome::Unselected => unselected_count += 1,
            }
            entry
        })
        .collect();

    let total = projected.len();

    SubmitResult {
        score: percentage(correct_count, total),
        correct_count,
        incorrect_count,
        unselected_count,
        total,
        time_taken_sec: (now - started_at).num_seconds().max(0),
        breakdown,
        rank: None,
        percentile: None,
    }
}
