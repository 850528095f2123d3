// Meal sort methods
// Author: kelexine (https://github.com/kelexine)

use crate::error::{CoreError, Result};
use crate::meals::models::Meal;
use crate::meals::scoring;
use phf::phf_map;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// The quantity a sort method orders by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortMetric {
    Date,
    Calories,
    Protein,
    HealthScore,
    NutritionDensity,
}

impl SortMetric {
    /// Sort key for `meal`. Fails on values that can't be ordered.
    pub fn key(&self, meal: &Meal) -> Result<f64> {
        match self {
            SortMetric::Date => Ok(meal.timestamp.timestamp_millis() as f64),
            SortMetric::Calories => scoring::checked_calories(&meal.nutrition),
            SortMetric::Protein => scoring::checked_protein(&meal.nutrition),
            SortMetric::HealthScore => scoring::health_score(meal),
            SortMetric::NutritionDensity => scoring::nutrition_density(&meal.nutrition),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Ascending,
    Descending,
}

/// A sort method as offered to the user. Each carries its own direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortMethod {
    #[default]
    DateDesc,
    DateAsc,
    CaloriesDesc,
    CaloriesAsc,
    ProteinDesc,
    ProteinAsc,
    HealthScoreDesc,
    HealthScoreAsc,
    NutritionDensityDesc,
    NutritionDensityAsc,
}

/// Accepted method ids, including the camelCase spellings used by clients.
static METHOD_IDS: phf::Map<&'static str, SortMethod> = phf_map! {
    "date-desc" => SortMethod::DateDesc,
    "date-asc" => SortMethod::DateAsc,
    "calories-desc" => SortMethod::CaloriesDesc,
    "calories-asc" => SortMethod::CaloriesAsc,
    "protein-desc" => SortMethod::ProteinDesc,
    "protein-asc" => SortMethod::ProteinAsc,
    "health-score-desc" => SortMethod::HealthScoreDesc,
    "health-score-asc" => SortMethod::HealthScoreAsc,
    "healthScore-desc" => SortMethod::HealthScoreDesc,
    "healthScore-asc" => SortMethod::HealthScoreAsc,
    "nutrition-density-desc" => SortMethod::NutritionDensityDesc,
    "nutrition-density-asc" => SortMethod::NutritionDensityAsc,
    "nutritionDensity-desc" => SortMethod::NutritionDensityDesc,
    "nutritionDensity-asc" => SortMethod::NutritionDensityAsc,
};

impl SortMethod {
    pub const ALL: [SortMethod; 10] = [
        SortMethod::DateDesc,
        SortMethod::DateAsc,
        SortMethod::CaloriesDesc,
        SortMethod::CaloriesAsc,
        SortMethod::ProteinDesc,
        SortMethod::ProteinAsc,
        SortMethod::HealthScoreDesc,
        SortMethod::HealthScoreAsc,
        SortMethod::NutritionDensityDesc,
        SortMethod::NutritionDensityAsc,
    ];

    /// Canonical id, e.g. `date-desc`.
    pub fn id(&self) -> &'static str {
        match self {
            SortMethod::DateDesc => "date-desc",
            SortMethod::DateAsc => "date-asc",
            SortMethod::CaloriesDesc => "calories-desc",
            SortMethod::CaloriesAsc => "calories-asc",
            SortMethod::ProteinDesc => "protein-desc",
            SortMethod::ProteinAsc => "protein-asc",
            SortMethod::HealthScoreDesc => "health-score-desc",
            SortMethod::HealthScoreAsc => "health-score-asc",
            SortMethod::NutritionDensityDesc => "nutrition-density-desc",
            SortMethod::NutritionDensityAsc => "nutrition-density-asc",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortMethod::DateDesc => "Latest First",
            SortMethod::DateAsc => "Oldest First",
            SortMethod::CaloriesDesc => "Highest Calories",
            SortMethod::CaloriesAsc => "Lowest Calories",
            SortMethod::ProteinDesc => "Most Protein",
            SortMethod::ProteinAsc => "Least Protein",
            SortMethod::HealthScoreDesc => "Healthiest First",
            SortMethod::HealthScoreAsc => "Least Healthy First",
            SortMethod::NutritionDensityDesc => "Most Nutrient Dense",
            SortMethod::NutritionDensityAsc => "Least Nutrient Dense",
        }
    }

    pub fn metric(&self) -> SortMetric {
        match self {
            SortMethod::DateDesc | SortMethod::DateAsc => SortMetric::Date,
            SortMethod::CaloriesDesc | SortMethod::CaloriesAsc => SortMetric::Calories,
            SortMethod::ProteinDesc | SortMethod::ProteinAsc => SortMetric::Protein,
            SortMethod::HealthScoreDesc | SortMethod::HealthScoreAsc => SortMetric::HealthScore,
            SortMethod::NutritionDensityDesc | SortMethod::NutritionDensityAsc => {
                SortMetric::NutritionDensity
            }
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            SortMethod::DateDesc
            | SortMethod::CaloriesDesc
            | SortMethod::ProteinDesc
            | SortMethod::HealthScoreDesc
            | SortMethod::NutritionDensityDesc => Direction::Descending,
            _ => Direction::Ascending,
        }
    }
}

impl FromStr for SortMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        METHOD_IDS.get(s.trim()).copied().ok_or_else(|| {
            CoreError::InvalidInput(format!(
                "Unknown sort method: {}. Supported methods: {}",
                s,
                SortMethod::ALL.iter().map(|m| m.id()).collect::<Vec<_>>().join(", ")
            ))
        })
    }
}

impl fmt::Display for SortMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl Serialize for SortMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.id())
    }
}

impl<'de> Deserialize<'de> for SortMethod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let id = String::deserialize(deserializer)?;
        id.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_round_trip() {
        for method in SortMethod::ALL {
            assert_eq!(method.id().parse::<SortMethod>().unwrap(), method);
        }
    }

    #[test]
    fn test_camel_case_aliases() {
        assert_eq!(
            "healthScore-desc".parse::<SortMethod>().unwrap(),
            SortMethod::HealthScoreDesc
        );
        assert_eq!(
            "nutritionDensity-asc".parse::<SortMethod>().unwrap(),
            SortMethod::NutritionDensityAsc
        );
    }

    #[test]
    fn test_unknown_method() {
        let err = "fiber-desc".parse::<SortMethod>().unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
        assert!(err.to_string().contains("date-desc"));
    }

    #[test]
    fn test_latest_first_is_descending_by_date() {
        assert_eq!(SortMethod::DateDesc.label(), "Latest First");
        assert_eq!(SortMethod::DateDesc.metric(), SortMetric::Date);
        assert_eq!(SortMethod::DateDesc.direction(), Direction::Descending);
        assert_eq!(SortMethod::default(), SortMethod::DateDesc);
    }
}
