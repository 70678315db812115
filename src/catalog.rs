// src/catalog.rs

//! In-memory category and question catalog.
//!
//! Admin CRUD mutates it at runtime; attempts snapshot the questions they
//! use, so later edits never affect an attempt in progress.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tokio::sync::RwLock;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        category::{Category, CreateCategoryRequest, DEFAULT_COLOR, DEFAULT_ICON, UpdateCategoryRequest},
        question::{
            CreateQuestionRequest, Difficulty, OptionInput, Question, QuestionOption,
            UpdateQuestionRequest, canonical_option_ref, positional_option_id,
        },
    },
    utils::html::clean_html,
};

/// Shape of a `QUIZ_SEED_FILE`.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub categories: Vec<Category>,
    /// Questions keyed by category id.
    #[serde(default)]
    pub questions: HashMap<String, Vec<Question>>,
}

#[derive(Debug, Default)]
struct CatalogData {
    categories: Vec<Category>,
    questions: HashMap<String, Vec<Question>>,
}

impl CatalogData {
    fn recount(&mut self, category_id: &str) {
        let count = self.questions.get(category_id).map_or(0, Vec::len);
        if let Some(category) = self.categories.iter_mut().find(|c| c.id == category_id) {
            category.question_count = count;
        }
    }

    fn locate_question(&self, id: &str) -> Option<(String, usize)> {
        self.questions.iter().find_map(|(category_id, questions)| {
            questions
                .iter()
                .position(|q| q.id == id)
                .map(|index| (category_id.clone(), index))
        })
    }
}

#[derive(Debug, Default)]
pub struct Catalog {
    data: RwLock<CatalogData>,
}

fn default_category(id: &str, name: &str, description: &str, color: &str, icon: &str) -> Category {
    Category {
        id: id.to_string(),
        name: name.to_string(),
        slug: id.to_string(),
        description: Some(description.to_string()),
        color: Some(color.to_string()),
        icon: Some(icon.to_string()),
        question_count: 0,
    }
}

impl Catalog {
    /// The six stock categories, with no questions yet.
    pub fn with_default_categories() -> Self {
        let categories = vec![
            default_category(
                "history",
                "World History",
                "Test your knowledge of world history from ancient civilizations to modern times",
                "#8B5CF6",
                "🏛️",
            ),
            default_category(
                "science",
                "Science & Nature",
                "Explore the wonders of physics, chemistry, biology, and the natural world",
                "#10B981",
                "🔬",
            ),
            default_category(
                "technology",
                "Technology",
                "Modern tech, programming, AI, and digital innovation",
                "#3B82F6",
                "💻",
            ),
            default_category(
                "geography",
                "Geography",
                "Countries, capitals, landmarks, and physical geography",
                "#F59E0B",
                "🌍",
            ),
            default_category(
                "literature",
                "Literature",
                "Classic and modern literature, authors, and literary movements",
                "#EF4444",
                "📚",
            ),
            default_category(
                "sports",
                "Sports",
                "Sports trivia, records, athletes, and major competitions",
                "#06B6D4",
                "⚽",
            ),
        ];
        Self::from_seed(CatalogSeed {
            categories,
            questions: HashMap::new(),
        })
    }

    /// Builds a catalog from seed data. Questions for unknown categories or
    /// with an inconsistent answer key are dropped; question counts are
    /// recomputed.
    pub fn from_seed(seed: CatalogSeed) -> Self {
        let mut data = CatalogData {
            categories: seed.categories,
            questions: HashMap::new(),
        };
        for category in &data.categories {
            data.questions.insert(category.id.clone(), Vec::new());
        }
        for (category_id, questions) in seed.questions {
            match data.questions.get_mut(&category_id) {
                Some(slot) => slot.extend(questions.into_iter().filter(|q| match q.check_answer_key() {
                    Ok(()) => true,
                    Err(reason) => {
                        tracing::warn!("Seed question '{}' in '{}' dropped: {}", q.id, category_id, reason);
                        false
                    }
                })),
                None => tracing::warn!(
                    "Seed questions for unknown category '{}' ignored",
                    category_id
                ),
            }
        }
        let ids: Vec<String> = data.categories.iter().map(|c| c.id.clone()).collect();
        for id in ids {
            data.recount(&id);
        }
        Self {
            data: RwLock::new(data),
        }
    }

    /// Loads a JSON seed file. Difficulty values go through the legacy shim
    /// on the way in.
    pub async fn load_seed_file(path: &Path) -> AppResult<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AppError::Internal(format!("Cannot read {}: {}", path.display(), e)))?;
        let seed: CatalogSeed = serde_json::from_str(&raw)
            .map_err(|e| AppError::Internal(format!("Invalid seed file {}: {}", path.display(), e)))?;
        Ok(Self::from_seed(seed))
    }

    pub async fn list_categories(&self) -> Vec<Category> {
        self.data.read().await.categories.clone()
    }

    pub async fn category(&self, id: &str) -> Option<Category> {
        self.data
            .read()
            .await
            .categories
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    pub async fn create_category(&self, req: CreateCategoryRequest) -> AppResult<Category> {
        req.validate()?;

        let id = req.id.clone().unwrap_or_else(|| req.slug.clone());
        let mut data = self.data.write().await;
        if data.categories.iter().any(|c| c.id == id) {
            return Err(AppError::Conflict(format!("Category '{}' already exists", id)));
        }

        let created = Category {
            id: id.clone(),
            name: req.name,
            slug: req.slug,
            description: Some(req.description.unwrap_or_default()),
            color: Some(req.color.unwrap_or_else(|| DEFAULT_COLOR.to_string())),
            icon: Some(req.icon.unwrap_or_else(|| DEFAULT_ICON.to_string())),
            question_count: 0,
        };

        data.questions.entry(id).or_default();
        data.categories.insert(0, created.clone());
        Ok(created)
    }

    pub async fn update_category(&self, id: &str, req: UpdateCategoryRequest) -> AppResult<Category> {
        req.validate()?;

        let mut data = self.data.write().await;
        let category = data
            .categories
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

        if let Some(name) = req.name {
            category.name = name;
        }
        if let Some(slug) = req.slug {
            category.slug = slug;
        }
        if let Some(description) = req.description {
            category.description = Some(description);
        }
        if let Some(color) = req.color {
            category.color = Some(color);
        }
        if let Some(icon) = req.icon {
            category.icon = Some(icon);
        }
        Ok(category.clone())
    }

    /// Deletes a category and all of its questions.
    pub async fn delete_category(&self, id: &str) -> AppResult<()> {
        let mut data = self.data.write().await;
        let index = data
            .categories
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;
        data.categories.remove(index);
        data.questions.remove(id);
        Ok(())
    }

    /// Full questions of a category (answer keys included).
    pub async fn questions(&self, category_id: &str) -> AppResult<Vec<Question>> {
        let data = self.data.read().await;
        if !data.categories.iter().any(|c| c.id == category_id) {
            return Err(AppError::NotFound("Category not found".to_string()));
        }
        Ok(data.questions.get(category_id).cloned().unwrap_or_default())
    }

    pub async fn create_question(&self, category_id: &str, req: CreateQuestionRequest) -> AppResult<Question> {
        req.validate()?;

        let options: Vec<QuestionOption> = req
            .options
            .into_iter()
            .enumerate()
            .map(|(index, option)| QuestionOption {
                id: positional_option_id(index),
                text: option.text.unwrap_or_else(|| format!("Option {}", index + 1)),
            })
            .collect();

        let question = Question {
            id: format!("q-{}", uuid::Uuid::new_v4().simple()),
            text: clean_html(&req.text),
            question_type: req.question_type,
            image_url: req.image_url,
            options,
            correct_option_ids: req
                .correct_option_ids
                .iter()
                .map(|raw| canonical_option_ref(raw))
                .collect(),
            explanation: req.explanation.as_deref().map(clean_html),
            difficulty: Difficulty::normalize(req.difficulty.as_deref()),
        };
        question.check_answer_key().map_err(AppError::Validation)?;

        let mut data = self.data.write().await;
        if !data.categories.iter().any(|c| c.id == category_id) {
            return Err(AppError::NotFound("Category not found".to_string()));
        }
        data.questions
            .entry(category_id.to_string())
            .or_default()
            .push(question.clone());
        data.recount(category_id);

        tracing::info!("Question {} added to category {}", question.id, category_id);
        Ok(question)
    }

    pub async fn update_question(&self, id: &str, req: UpdateQuestionRequest) -> AppResult<Question> {
        req.validate()?;

        let mut data = self.data.write().await;
        let (category_id, index) = data
            .locate_question(id)
            .ok_or_else(|| AppError::NotFound("Question not found".to_string()))?;

        let previous = data.questions[&category_id][index].clone();
        let mut updated = previous.clone();

        if let Some(text) = req.text {
            updated.text = clean_html(&text);
        }
        if let Some(question_type) = req.question_type {
            updated.question_type = question_type;
        }
        if let Some(image_url) = req.image_url {
            updated.image_url = Some(image_url);
        }
        if let Some(options) = req.options {
            updated.options = merge_options(&previous.options, options);
        }
        if let Some(correct) = req.correct_option_ids {
            updated.correct_option_ids = correct;
        }
        if let Some(explanation) = req.explanation {
            updated.explanation = Some(clean_html(&explanation));
        }
        if let Some(difficulty) = req.difficulty {
            updated.difficulty = Difficulty::normalize(Some(&difficulty));
        }
        updated.check_answer_key().map_err(AppError::Validation)?;

        if let Some(slot) = data
            .questions
            .get_mut(&category_id)
            .and_then(|questions| questions.get_mut(index))
        {
            *slot = updated.clone();
        }
        data.recount(&category_id);
        Ok(updated)
    }

    pub async fn delete_question(&self, id: &str) -> AppResult<()> {
        let mut data = self.data.write().await;
        let (category_id, index) = data
            .locate_question(id)
            .ok_or_else(|| AppError::NotFound("Question not found".to_string()))?;
        if let Some(questions) = data.questions.get_mut(&category_id) {
            questions.remove(index);
        }
        data.recount(&category_id);
        Ok(())
    }
}

/// Options keep a submitted id, else inherit the id at the same position,
/// else get a positional id. Missing text is inherited the same way.
fn merge_options(previous: &[QuestionOption], incoming: Vec<OptionInput>) -> Vec<QuestionOption> {
    incoming
        .into_iter()
        .enumerate()
        .map(|(index, option)| {
            let prior = previous.get(index);
            QuestionOption {
                id: option
                    .id
                    .filter(|id| !id.is_empty())
                    .or_else(|| prior.map(|p| p.id.clone()))
                    .unwrap_or_else(|| positional_option_id(index)),
                text: option
                    .text
                    .or_else(|| prior.map(|p| p.text.clone()))
                    .unwrap_or_else(|| format!("Option {}", index + 1)),
            }
        })
        .collect()
}
