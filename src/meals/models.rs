//! Meal data as consumed by the sorting engine.
//!
//! Meals are owned by the host application; this crate only reads them.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// When in the day a meal was eaten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snack => "snack",
        }
    }
}

/// Macro and micro nutrient breakdown. Masses are grams, sodium is milligrams.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Nutrition {
    #[serde(default)]
    pub calories: f64,
    #[serde(default)]
    pub protein: f64,
    #[serde(default)]
    pub carbs: f64,
    #[serde(default)]
    pub fat: f64,
    #[serde(default)]
    pub fiber: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sugar: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sodium: Option<f64>,
}

/// Insight fields produced by meal photo analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiInsights {
    /// 0-100; takes precedence over the computed heuristic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nutrition_balance: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// A logged meal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meal_type: Option<MealType>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub nutrition: Nutrition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_insights: Option<AiInsights>,
}

impl Meal {
    /// A meal with a fresh id and no name, type or insights.
    pub fn new(timestamp: DateTime<Utc>, nutrition: Nutrition) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            meal_type: None,
            timestamp,
            nutrition,
            ai_insights: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_type(mut self, meal_type: MealType) -> Self {
        self.meal_type = Some(meal_type);
        self
    }

    pub fn with_ai_health_score(mut self, score: f64) -> Self {
        self.ai_insights
            .get_or_insert_with(AiInsights::default)
            .health_score = Some(score);
        self
    }

    /// AI-provided health score, if the meal was analyzed.
    pub fn ai_health_score(&self) -> Option<f64> {
        self.ai_insights.as_ref().and_then(|insights| insights.health_score)
    }
}
