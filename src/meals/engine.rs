//! Meal sorting and grouping.
//!
//! Sorting never fails from the caller's point of view: if a sort key can't
//! be derived or a meal can't be placed in a section, the engine logs the
//! problem and returns the default "latest first" view of the input instead.
//!
//! Large collections are sorted cooperatively. Keys are derived a chunk at a
//! time, each chunk is sorted on its own, and the sorted runs are merged
//! pairwise with a stable two-pointer merge, yielding to the scheduler
//! between steps.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::chunking::ChunkedProcessor;
use crate::config::{ChunkingSettings, SortingSettings};
use crate::error::Result;
use crate::meals::grouping::{bucket_index, bucket_title, buckets_for, day_label};
use crate::meals::models::Meal;
use crate::meals::sort_method::{Direction, SortMethod, SortMetric};
use crate::metrics;
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::convert::Infallible;
use std::time::Instant;
use tracing::{debug, warn};

/// A titled, ordered group of meals ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortedSection {
    pub title: String,
    pub data: Vec<Meal>,
}

/// Sort key paired with the meal's index in the input.
type Keyed = (f64, usize);

fn compare(direction: Direction, a: &Keyed, b: &Keyed) -> Ordering {
    let ordering = a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal);
    match direction {
        Direction::Ascending => ordering,
        Direction::Descending => ordering.reverse(),
    }
}

/// Counts the items handled in the current scheduler turn and yields
/// before a turn would exceed one chunk's worth.
struct TurnBudget {
    step: usize,
    used: usize,
}

impl TurnBudget {
    fn new(step: usize) -> Self {
        Self {
            step: step.max(1),
            used: 0,
        }
    }

    /// A budget that never yields.
    fn unbounded() -> Self {
        Self::new(usize::MAX)
    }

    async fn spend(&mut self, items: usize) {
        if self.used > 0 && self.used.saturating_add(items) > self.step {
            tokio::task::yield_now().await;
            self.used = 0;
        }
        self.used = self.used.saturating_add(items);
    }

    /// The current turn already did a full chunk elsewhere.
    fn fill(&mut self) {
        self.used = self.step;
    }
}

/// Stable two-pointer merge: on ties the left run wins.
async fn merge(left: Vec<Keyed>, right: Vec<Keyed>, direction: Direction, budget: &mut TurnBudget) -> Vec<Keyed> {
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();

    loop {
        let take_left = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => compare(direction, l, r) != Ordering::Greater,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        budget.spend(1).await;
        let next = if take_left { left.next() } else { right.next() };
        merged.extend(next);
    }

    merged
}

/// Sorts meals by a [`SortMethod`] and groups them into sections.
#[derive(Debug, Clone)]
pub struct MealSortingEngine {
    processor: ChunkedProcessor,
    sort_threshold: usize,
    offset: FixedOffset,
}

impl Default for MealSortingEngine {
    fn default() -> Self {
        Self::from_settings(&ChunkingSettings::default(), &SortingSettings::default())
    }
}

impl MealSortingEngine {
    /// `sort_threshold` is the collection size above which sorting is chunked.
    /// `offset` decides which calendar day a meal belongs to.
    pub fn new(chunk_size: usize, sort_threshold: usize, offset: FixedOffset) -> Self {
        Self {
            processor: ChunkedProcessor::new(chunk_size),
            sort_threshold,
            offset,
        }
    }

    pub fn from_settings(chunking: &ChunkingSettings, sorting: &SortingSettings) -> Self {
        let offset = FixedOffset::east_opt(sorting.utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| {
                warn!(
                    "UTC offset of {} minutes is out of range; grouping days in UTC",
                    sorting.utc_offset_minutes
                );
                Utc.fix()
            });
        Self::new(chunking.chunk_size, chunking.sort_threshold, offset)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn sort_threshold(&self) -> usize {
        self.sort_threshold
    }

    /// Sort and group `meals` relative to the current time.
    pub async fn sort(&self, meals: &[Meal], method: SortMethod) -> Vec<SortedSection> {
        self.sort_at(meals, method, Utc::now()).await
    }

    /// Sort and group `meals` with `now` deciding "Today" and "Yesterday".
    ///
    /// The result depends only on the arguments.
    pub async fn sort_at(
        &self,
        meals: &[Meal],
        method: SortMethod,
        now: DateTime<Utc>,
    ) -> Vec<SortedSection> {
        let started = Instant::now();
        let chunked = meals.len() > self.sort_threshold;

        match self.try_sort(meals, method, now).await {
            Ok(sections) => {
                metrics::record_sort(method.id(), chunked, started.elapsed().as_secs_f64());
                debug!(
                    "Sorted {} meals by {} into {} sections",
                    meals.len(),
                    method,
                    sections.len()
                );
                sections
            }
            Err(e) => {
                warn!("Sorting by {} failed, showing latest first: {}", method, e);
                metrics::record_sort_fallback(method.id());
                self.fallback(meals, now).await
            }
        }
    }

    async fn try_sort(
        &self,
        meals: &[Meal],
        method: SortMethod,
        now: DateTime<Utc>,
    ) -> Result<Vec<SortedSection>> {
        let metric = method.metric();
        let mut budget = self.budget(meals.len());

        let mut base = 0usize;
        let keyed = self
            .processor
            .map(meals, |chunk| {
                let start = base;
                base += chunk.len();
                chunk
                    .iter()
                    .enumerate()
                    .map(|(i, meal)| metric.key(meal).map(|key| (key, start + i)))
                    .collect::<Result<Vec<Keyed>>>()
            })
            .await?;
        budget.fill();

        let sorted = self.sort_keys(keyed, method.direction(), &mut budget).await;

        match metric {
            SortMetric::Date => Ok(self.group_by_day(&sorted, meals, now, &mut budget).await),
            _ => group_by_bucket(metric, &sorted, meals, &mut budget).await,
        }
    }

    /// Large inputs are handled a chunk per turn; small ones in one go.
    fn budget(&self, len: usize) -> TurnBudget {
        if len > self.sort_threshold {
            TurnBudget::new(self.processor.chunk_size())
        } else {
            TurnBudget::unbounded()
        }
    }

    /// Order keys by `direction`, keeping input order among equal keys.
    async fn sort_keys(&self, mut keyed: Vec<Keyed>, direction: Direction, budget: &mut TurnBudget) -> Vec<Keyed> {
        if keyed.len() <= self.sort_threshold {
            keyed.sort_by(|a, b| compare(direction, a, b));
            return keyed;
        }

        let runs = self
            .processor
            .process(keyed, move |mut chunk: Vec<Keyed>| async move {
                chunk.sort_by(|a, b| compare(direction, a, b));
                Ok::<_, Infallible>(vec![chunk])
            })
            .await
            .unwrap_or_else(|never| match never {});
        budget.fill();

        merge_runs(runs, direction, budget).await
    }

    /// Descending-date grouping of the input as given.
    async fn fallback(&self, meals: &[Meal], now: DateTime<Utc>) -> Vec<SortedSection> {
        let mut budget = self.budget(meals.len());
        let keyed: Vec<Keyed> = meals
            .iter()
            .enumerate()
            .map(|(i, meal)| (meal.timestamp.timestamp_millis() as f64, i))
            .collect();
        let sorted = self.sort_keys(keyed, Direction::Descending, &mut budget).await;
        self.group_by_day(&sorted, meals, now, &mut budget).await
    }

    fn local_day(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    /// Group date-ordered meals into one section per calendar day.
    async fn group_by_day(
        &self,
        sorted: &[Keyed],
        meals: &[Meal],
        now: DateTime<Utc>,
        budget: &mut TurnBudget,
    ) -> Vec<SortedSection> {
        let today = self.local_day(now);
        let mut sections: Vec<(NaiveDate, Vec<Meal>)> = Vec::new();

        for &(_, i) in sorted {
            budget.spend(1).await;
            let meal = &meals[i];
            let day = self.local_day(meal.timestamp);
            match sections.last_mut() {
                Some((current, data)) if *current == day => data.push(meal.clone()),
                _ => sections.push((day, vec![meal.clone()])),
            }
        }

        sections
            .into_iter()
            .map(|(day, data)| SortedSection {
                title: day_label(day, today),
                data,
            })
            .collect()
    }
}

/// Merge sorted runs pairwise until one remains.
async fn merge_runs(mut runs: Vec<Vec<Keyed>>, direction: Direction, budget: &mut TurnBudget) -> Vec<Keyed> {
    while runs.len() > 1 {
        let mut next = Vec::with_capacity(runs.len().div_ceil(2));
        let mut pending = runs.into_iter();

        while let Some(left) = pending.next() {
            match pending.next() {
                Some(right) => next.push(merge(left, right, direction, budget).await),
                None => next.push(left),
            }
        }

        runs = next;
    }

    runs.pop().unwrap_or_default()
}

/// Group key-ordered meals into the metric's value ranges.
async fn group_by_bucket(
    metric: SortMetric,
    sorted: &[Keyed],
    meals: &[Meal],
    budget: &mut TurnBudget,
) -> Result<Vec<SortedSection>> {
    let buckets = buckets_for(metric);
    let mut sections: Vec<(usize, Vec<Meal>)> = Vec::new();

    for &(key, i) in sorted {
        budget.spend(1).await;
        let bucket = bucket_index(metric, key)?;
        match sections.last_mut() {
            Some((current, data)) if *current == bucket => data.push(meals[i].clone()),
            _ => sections.push((bucket, vec![meals[i].clone()])),
        }
    }

    Ok(sections
        .into_iter()
        .map(|(bucket, data)| SortedSection {
            title: bucket_title(&buckets[bucket], data.len()),
            data,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meals::models::Nutrition;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 18, 0, 0).unwrap()
    }

    fn meal(name: &str, hours_ago: i64, calories: f64, protein: f64) -> Meal {
        Meal::new(
            now() - Duration::hours(hours_ago),
            Nutrition {
                calories,
                protein,
                ..Default::default()
            },
        )
        .with_name(name)
    }

    fn names(sections: &[SortedSection]) -> Vec<Vec<&str>> {
        sections
            .iter()
            .map(|s| s.data.iter().map(|m| m.name.as_str()).collect())
            .collect()
    }

    #[tokio::test]
    async fn test_equal_keys_keep_input_order() {
        let engine = MealSortingEngine::default();
        let meals = vec![
            meal("1", 1, 100.0, 0.0),
            meal("2", 2, 100.0, 0.0),
            meal("3", 3, 50.0, 0.0),
        ];

        let sections = engine.sort_at(&meals, SortMethod::CaloriesDesc, now()).await;
        assert_eq!(sections.len(), 1);
        assert_eq!(names(&sections), vec![vec!["1", "2", "3"]]);
        assert_eq!(sections[0].title, "Light (0-200 cal) - 3 meals");
    }

    #[tokio::test]
    async fn test_buckets_follow_sort_direction() {
        let engine = MealSortingEngine::default();
        let meals = vec![
            meal("snack", 1, 150.0, 5.0),
            meal("feast", 2, 950.0, 60.0),
            meal("lunch", 3, 450.0, 25.0),
            meal("bar", 4, 180.0, 12.0),
        ];

        let desc = engine.sort_at(&meals, SortMethod::CaloriesDesc, now()).await;
        let titles: Vec<_> = desc.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Heavy (800+ cal) - 1 meal",
                "Substantial (400-600 cal) - 1 meal",
                "Light (0-200 cal) - 2 meals",
            ]
        );
        assert_eq!(names(&desc)[2], vec!["bar", "snack"]);

        let asc = engine.sort_at(&meals, SortMethod::ProteinAsc, now()).await;
        assert_eq!(
            names(&asc),
            vec![vec!["snack"], vec!["bar"], vec!["lunch"], vec!["feast"]]
        );
    }

    #[tokio::test]
    async fn test_date_sections_are_labelled_by_day() {
        let engine = MealSortingEngine::default();
        let meals = vec![
            meal("old", 24 * 10, 300.0, 10.0),
            meal("breakfast", 10, 300.0, 10.0),
            meal("dinner", 1, 300.0, 10.0),
            meal("late", 20, 300.0, 10.0),
        ];

        let sections = engine.sort_at(&meals, SortMethod::DateDesc, now()).await;
        let titles: Vec<_> = sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Today", "Yesterday", "October 6, 2026"]);
        assert_eq!(names(&sections)[0], vec!["dinner", "breakfast"]);

        let sections = engine.sort_at(&meals, SortMethod::DateAsc, now()).await;
        assert_eq!(sections[0].title, "October 6, 2026");
        assert_eq!(names(&sections)[2], vec!["breakfast", "dinner"]);
    }

    #[tokio::test]
    async fn test_offset_moves_day_boundary() {
        // 18:00 UTC is already the next day at UTC+8
        let engine = MealSortingEngine::new(50, 100, FixedOffset::east_opt(8 * 3600).unwrap());
        let meals = vec![meal("a", 0, 100.0, 0.0), meal("b", 8, 100.0, 0.0)];

        let sections = engine.sort_at(&meals, SortMethod::DateDesc, now()).await;
        let titles: Vec<_> = sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Today", "Yesterday"]);
    }

    #[tokio::test]
    async fn test_invalid_metric_falls_back_to_latest_first() {
        let engine = MealSortingEngine::default();
        let mut broken = meal("broken", 30, 200.0, 10.0);
        broken.nutrition.protein = f64::NAN;
        let meals = vec![meal("a", 50, 500.0, 30.0), broken, meal("c", 1, 100.0, 2.0)];

        let sections = engine
            .sort_at(&meals, SortMethod::NutritionDensityDesc, now())
            .await;

        let titles: Vec<_> = sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Today", "Yesterday", "Wednesday"]);
        assert_eq!(names(&sections), vec![vec!["c"], vec!["broken"], vec!["a"]]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let engine = MealSortingEngine::default();
        assert!(engine.sort_at(&[], SortMethod::HealthScoreDesc, now()).await.is_empty());
    }

    #[tokio::test]
    async fn test_merge_prefers_left_on_ties() {
        let left = vec![(5.0, 0), (3.0, 1)];
        let right = vec![(5.0, 2), (1.0, 3)];
        let merged = merge(left, right, Direction::Descending, &mut TurnBudget::new(1)).await;
        assert_eq!(merged, vec![(5.0, 0), (5.0, 2), (3.0, 1), (1.0, 3)]);
    }

    #[test]
    fn test_merging_runs_never_exceeds_one_chunk_per_turn() {
        let runs: Vec<Vec<Keyed>> = (0..3)
            .map(|r| (0..4).map(|i| ((i * 3 + r) as f64, i * 3 + r)).collect())
            .collect();
        let mut budget = TurnBudget::new(4);
        let mut merging = tokio_test::task::spawn(merge_runs(runs, Direction::Ascending, &mut budget));

        // 8 items for the first merge, 12 for the second: 20 items, 5 turns
        let mut turns = 1;
        let merged = loop {
            match merging.poll() {
                std::task::Poll::Ready(merged) => break merged,
                std::task::Poll::Pending => turns += 1,
            }
        };

        assert_eq!(turns, 5);
        let keys: Vec<usize> = merged.iter().map(|&(_, i)| i).collect();
        assert_eq!(keys, (0..12).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_large_sort_lets_other_tasks_run() {
        let engine = MealSortingEngine::new(10, 20, Utc.fix());
        let meals: Vec<Meal> = (0..60).map(|i| meal("m", i, 100.0 + i as f64, 5.0)).collect();
        let ticks = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let ticker = {
            let ticks = ticks.clone();
            tokio::spawn(async move {
                loop {
                    ticks.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    tokio::task::yield_now().await;
                }
            })
        };

        let sections = engine.sort_at(&meals, SortMethod::CaloriesDesc, now()).await;
        ticker.abort();

        assert_eq!(sections.iter().map(|s| s.data.len()).sum::<usize>(), 60);
        // every stage hands the scheduler back between chunks
        assert!(ticks.load(std::sync::atomic::Ordering::SeqCst) >= 10);
    }

    proptest! {
        #[test]
        fn prop_chunked_sort_matches_stable_sort(
            keys in prop::collection::vec(0u8..20, 0..400),
            chunk_size in 1usize..64,
            descending in any::<bool>(),
        ) {
            let direction = if descending { Direction::Descending } else { Direction::Ascending };
            let keyed: Vec<Keyed> = keys.iter().enumerate().map(|(i, k)| (*k as f64, i)).collect();

            let mut expected = keyed.clone();
            expected.sort_by(|a, b| compare(direction, a, b));

            let engine = MealSortingEngine::new(chunk_size, 0, FixedOffset::east_opt(0).unwrap());
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let mut budget = engine.budget(keyed.len());
            let actual = runtime.block_on(engine.sort_keys(keyed, direction, &mut budget));

            prop_assert_eq!(actual, expected);
        }
    }
}
