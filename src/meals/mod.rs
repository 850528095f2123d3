// Meal domain: models, derived scores, sorting and summaries
// Author: kelexine (https://github.com/kelexine)

pub mod engine;
pub mod grouping;
pub mod models;
pub mod scoring;
pub mod sort_method;
pub mod summary;

pub use engine::{MealSortingEngine, SortedSection};
pub use models::{AiInsights, Meal, MealType, Nutrition};
pub use scoring::{health_score, heuristic_health_score, nutrition_density};
pub use sort_method::{Direction, SortMethod, SortMetric};
pub use summary::DailySummary;
