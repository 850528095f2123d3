// Derived meal metrics
// Author: kelexine (https://github.com/kelexine)

use crate::error::{CoreError, Result};
use crate::meals::models::{Meal, Nutrition};

const CALORIES_PER_GRAM_PROTEIN: f64 = 4.0;
const CALORIES_PER_GRAM_FAT: f64 = 9.0;

/// Reject nutrition values that can't be ordered or scored.
fn check(name: &str, value: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(CoreError::Sort(format!("{} is not a finite number", name)));
    }
    if value < 0.0 {
        return Err(CoreError::Sort(format!("{} is negative: {}", name, value)));
    }
    Ok(value)
}

pub fn checked_calories(nutrition: &Nutrition) -> Result<f64> {
    check("calories", nutrition.calories)
}

pub fn checked_protein(nutrition: &Nutrition) -> Result<f64> {
    check("protein", nutrition.protein)
}

/// `(protein + fiber) / max(calories, 1) * 100`
pub fn nutrition_density(nutrition: &Nutrition) -> Result<f64> {
    let calories = check("calories", nutrition.calories)?;
    let protein = check("protein", nutrition.protein)?;
    let fiber = check("fiber", nutrition.fiber)?;
    Ok((protein + fiber) / calories.max(1.0) * 100.0)
}

/// The AI score when present, otherwise [`heuristic_health_score`].
pub fn health_score(meal: &Meal) -> Result<f64> {
    match meal.ai_health_score() {
        Some(score) => check("AI health score", score),
        None => heuristic_health_score(&meal.nutrition),
    }
}

/// Score a meal 0-100 from its macros.
///
/// Starts at 50. Protein above 15% of calories adds 20 (above 10% adds 10).
/// Fiber adds 4 per gram up to 20. Fat above 35% of calories subtracts 15
/// (above 30% subtracts 10).
///
/// A meal with zero calories has no macro shares: it gets neither the
/// protein bonus nor the fat penalty, so only fiber moves it off 50.
pub fn heuristic_health_score(nutrition: &Nutrition) -> Result<f64> {
    let calories = check("calories", nutrition.calories)?;
    let protein = check("protein", nutrition.protein)?;
    let fat = check("fat", nutrition.fat)?;
    let fiber = check("fiber", nutrition.fiber)?;

    let (protein_pct, fat_pct) = if calories > 0.0 {
        (
            protein * CALORIES_PER_GRAM_PROTEIN / calories * 100.0,
            fat * CALORIES_PER_GRAM_FAT / calories * 100.0,
        )
    } else {
        (0.0, 0.0)
    };

    let mut score = 50.0;

    if protein_pct > 15.0 {
        score += 20.0;
    } else if protein_pct > 10.0 {
        score += 10.0;
    }

    score += (fiber * 4.0).min(20.0);

    if fat_pct > 35.0 {
        score -= 15.0;
    } else if fat_pct > 30.0 {
        score -= 10.0;
    }

    Ok(score.clamp(0.0, 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn nutrition(calories: f64, protein: f64, fat: f64, fiber: f64) -> Nutrition {
        Nutrition {
            calories,
            protein,
            fat,
            fiber,
            ..Default::default()
        }
    }

    #[test]
    fn test_nutrition_density() {
        let density = nutrition_density(&nutrition(400.0, 30.0, 10.0, 10.0)).unwrap();
        assert!((density - 10.0).abs() < 1e-9);

        // calories below one are treated as one
        let density = nutrition_density(&nutrition(0.0, 2.0, 0.0, 1.0)).unwrap();
        assert!((density - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_heuristic_high_protein_high_fiber() {
        // protein 40g * 4 = 160 kcal of 500 = 32% -> +20
        // fiber 6g -> +20 (capped)
        // fat 10g * 9 = 90 kcal = 18% -> no penalty
        let score = heuristic_health_score(&nutrition(500.0, 40.0, 10.0, 6.0)).unwrap();
        assert_eq!(score, 90.0);
    }

    #[test]
    fn test_heuristic_fatty_meal() {
        // protein 15g = 60 kcal of 500 = 12% -> +10
        // fiber 1g -> +4
        // fat 25g = 225 kcal = 45% -> -15
        let score = heuristic_health_score(&nutrition(500.0, 15.0, 25.0, 1.0)).unwrap();
        assert_eq!(score, 49.0);

        // fat 18g = 162 kcal = 32.4% -> -10
        let score = heuristic_health_score(&nutrition(500.0, 0.0, 18.0, 0.0)).unwrap();
        assert_eq!(score, 40.0);
    }

    #[test]
    fn test_heuristic_is_clamped() {
        let score = heuristic_health_score(&nutrition(100.0, 50.0, 0.0, 50.0)).unwrap();
        assert_eq!(score, 90.0);
        let score = heuristic_health_score(&nutrition(0.0, 0.0, 0.0, 0.0)).unwrap();
        assert_eq!(score, 50.0);
    }

    #[test]
    fn test_zero_calorie_meal_only_scores_fiber() {
        // protein and fat would otherwise count as huge shares
        let score = heuristic_health_score(&nutrition(0.0, 25.0, 30.0, 0.0)).unwrap();
        assert_eq!(score, 50.0);

        let score = heuristic_health_score(&nutrition(0.0, 25.0, 30.0, 3.0)).unwrap();
        assert_eq!(score, 62.0);
    }

    #[test]
    fn test_ai_score_takes_precedence() {
        let meal = Meal::new(Utc::now(), nutrition(500.0, 40.0, 10.0, 6.0)).with_ai_health_score(33.0);
        assert_eq!(health_score(&meal).unwrap(), 33.0);
    }

    #[test]
    fn test_invalid_values_are_sort_errors() {
        assert!(matches!(
            nutrition_density(&nutrition(100.0, f64::NAN, 0.0, 0.0)),
            Err(CoreError::Sort(_))
        ));
        assert!(matches!(
            heuristic_health_score(&nutrition(-5.0, 0.0, 0.0, 0.0)),
            Err(CoreError::Sort(_))
        ));
    }
}
