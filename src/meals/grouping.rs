// Section labels for sorted meals
// Author: kelexine (https://github.com/kelexine)

use crate::error::{CoreError, Result};
use crate::meals::sort_method::SortMetric;
use chrono::NaiveDate;

/// A half-open value range `[min, max)` with its section label.
#[derive(Debug, Clone, Copy)]
pub struct Bucket {
    pub label: &'static str,
    pub min: f64,
    pub max: f64,
}

const fn bucket(label: &'static str, min: f64, max: f64) -> Bucket {
    Bucket { label, min, max }
}

const CALORIE_BUCKETS: &[Bucket] = &[
    bucket("Light (0-200 cal)", 0.0, 200.0),
    bucket("Moderate (200-400 cal)", 200.0, 400.0),
    bucket("Substantial (400-600 cal)", 400.0, 600.0),
    bucket("Hearty (600-800 cal)", 600.0, 800.0),
    bucket("Heavy (800+ cal)", 800.0, f64::INFINITY),
];

const PROTEIN_BUCKETS: &[Bucket] = &[
    bucket("Low Protein (<10g)", 0.0, 10.0),
    bucket("Moderate Protein (10-20g)", 10.0, 20.0),
    bucket("Good Protein (20-30g)", 20.0, 30.0),
    bucket("High Protein (30g+)", 30.0, f64::INFINITY),
];

const HEALTH_BUCKETS: &[Bucket] = &[
    bucket("Needs Improvement (0-39)", 0.0, 40.0),
    bucket("Fair (40-59)", 40.0, 60.0),
    bucket("Good (60-79)", 60.0, 80.0),
    bucket("Excellent (80-100)", 80.0, f64::INFINITY),
];

const DENSITY_BUCKETS: &[Bucket] = &[
    bucket("Low Density (<2)", 0.0, 2.0),
    bucket("Moderate Density (2-5)", 2.0, 5.0),
    bucket("Nutrient Dense (5-10)", 5.0, 10.0),
    bucket("Very Nutrient Dense (10+)", 10.0, f64::INFINITY),
];

/// Value ranges for a non-date metric, lowest first. Date has none.
pub fn buckets_for(metric: SortMetric) -> &'static [Bucket] {
    match metric {
        SortMetric::Date => &[],
        SortMetric::Calories => CALORIE_BUCKETS,
        SortMetric::Protein => PROTEIN_BUCKETS,
        SortMetric::HealthScore => HEALTH_BUCKETS,
        SortMetric::NutritionDensity => DENSITY_BUCKETS,
    }
}

/// Index of the bucket holding `value`.
pub fn bucket_index(metric: SortMetric, value: f64) -> Result<usize> {
    buckets_for(metric)
        .iter()
        .position(|b| value >= b.min && value < b.max)
        .ok_or_else(|| CoreError::Sort(format!("no {:?} bucket for value {}", metric, value)))
}

/// Section title for a bucket holding `count` meals.
pub fn bucket_title(bucket: &Bucket, count: usize) -> String {
    let noun = if count == 1 { "meal" } else { "meals" };
    format!("{} - {} {}", bucket.label, count, noun)
}

/// "Today", "Yesterday", the weekday name within the last week, otherwise
/// the full date.
pub fn day_label(day: NaiveDate, today: NaiveDate) -> String {
    match (today - day).num_days() {
        0 => "Today".to_string(),
        1 => "Yesterday".to_string(),
        2..=6 => day.format("%A").to_string(),
        _ => day.format("%B %-d, %Y").to_string(),
    }
}
