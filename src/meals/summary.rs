// Per-day nutrition summary
// Author: kelexine (https://github.com/kelexine)

use crate::meals::models::{Meal, MealType};
use chrono::{FixedOffset, NaiveDate};
use serde::Serialize;

/// Totals for the meals eaten on one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub total_calories: f64,
    pub total_protein: f64,
    pub total_carbs: f64,
    pub total_fat: f64,
    pub total_fiber: f64,
    pub total_sugar: f64,
    pub total_sodium: f64,
    pub breakfast_count: usize,
    pub lunch_count: usize,
    pub dinner_count: usize,
    pub snack_count: usize,
    pub total_meals: usize,
    /// Integer average of the AI health scores, if any meal has one.
    pub average_health_score: Option<u32>,
}

impl DailySummary {
    /// Summarize the meals whose local date (at `offset`) is `date`.
    pub fn for_day(meals: &[Meal], date: NaiveDate, offset: FixedOffset) -> Self {
        let mut summary = Self {
            date,
            total_calories: 0.0,
            total_protein: 0.0,
            total_carbs: 0.0,
            total_fat: 0.0,
            total_fiber: 0.0,
            total_sugar: 0.0,
            total_sodium: 0.0,
            breakfast_count: 0,
            lunch_count: 0,
            dinner_count: 0,
            snack_count: 0,
            total_meals: 0,
            average_health_score: None,
        };
        let mut health_scores: Vec<u32> = Vec::new();

        let on_day = meals
            .iter()
            .filter(|meal| meal.timestamp.with_timezone(&offset).date_naive() == date);

        for meal in on_day {
            let n = &meal.nutrition;
            summary.total_meals += 1;
            summary.total_calories += n.calories;
            summary.total_protein += n.protein;
            summary.total_carbs += n.carbs;
            summary.total_fat += n.fat;
            summary.total_fiber += n.fiber;
            summary.total_sugar += n.sugar.unwrap_or(0.0);
            summary.total_sodium += n.sodium.unwrap_or(0.0);

            match meal.meal_type {
                Some(MealType::Breakfast) => summary.breakfast_count += 1,
                Some(MealType::Lunch) => summary.lunch_count += 1,
                Some(MealType::Dinner) => summary.dinner_count += 1,
                Some(MealType::Snack) => summary.snack_count += 1,
                None => {}
            }

            if let Some(score) = meal.ai_health_score().filter(|s| s.is_finite()) {
                health_scores.push(score.clamp(0.0, 100.0) as u32);
            }
        }

        if !health_scores.is_empty() {
            let total: u32 = health_scores.iter().sum();
            summary.average_health_score = Some(total / health_scores.len() as u32);
        }

        summary
    }
}
