//! Learned per-model correction factor table (spec §4.6 "Correction factor",
//! §5 "single-writer per model row").

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use super::{CORRECTION_MAX, CORRECTION_MIN, MIN_CORRECTION_SAMPLES};

#[derive(Debug, Clone)]
pub struct TokenCorrectionFactor {
    pub model_nickname: String,
    pub total_samples: u32,
    pub sum_ratio: f64,
    pub avg_correction: f64,
    pub updated_at: DateTime<Utc>,
}

impl TokenCorrectionFactor {
    fn new(model_nickname: String, now: DateTime<Utc>) -> Self {
        Self {
            model_nickname,
            total_samples: 0,
            sum_ratio: 0.0,
            avg_correction: 1.0,
            updated_at: now,
        }
    }

    fn record(&mut self, estimated: f64, actual: f64, now: DateTime<Utc>) {
        if estimated <= 0.0 {
            return;
        }
        self.total_samples += 1;
        self.sum_ratio += actual / estimated;
        self.avg_correction = (self.sum_ratio / self.total_samples as f64)
            .clamp(CORRECTION_MIN, CORRECTION_MAX);
        self.updated_at = now;
    }

    /// Whether this model has enough history to apply its correction.
    pub fn is_confident(&self) -> bool {
        self.total_samples >= MIN_CORRECTION_SAMPLES
    }
}

/// Per-model correction rows behind a single lock; each row is only ever
/// updated by the writer that owns that model's API responses, but readers
/// (token estimates for display, `/context`) may run concurrently.
#[derive(Default)]
pub struct TokenCorrectionTable {
    rows: RwLock<HashMap<String, TokenCorrectionFactor>>,
}

impl TokenCorrectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one `(estimated, actual)` sample for `model_nickname`.
    pub fn record_sample(
        &self,
        model_nickname: &str,
        estimated: f64,
        actual: f64,
        now: DateTime<Utc>,
    ) {
        let mut rows = self.rows.write().expect("correction table lock poisoned");
        let row = rows
            .entry(model_nickname.to_string())
            .or_insert_with(|| TokenCorrectionFactor::new(model_nickname.to_string(), now));
        row.record(estimated, actual, now);
    }

    /// Applies the learned correction to a raw estimate if the model has
    /// enough samples to be trusted; otherwise returns the raw estimate.
    pub fn corrected_estimate(&self, model_nickname: &str, raw_estimate: usize) -> usize {
        let rows = self.rows.read().expect("correction table lock poisoned");
        match rows.get(model_nickname) {
            Some(row) if row.is_confident() => {
                (raw_estimate as f64 * row.avg_correction).round() as usize
            }
            _ => raw_estimate,
        }
    }

    pub fn snapshot(&self, model_nickname: &str) -> Option<TokenCorrectionFactor> {
        self.rows
            .read()
            .expect("correction table lock poisoned")
            .get(model_nickname)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_to_ratio_within_epsilon_over_many_samples() {
        let table = TokenCorrectionTable::new();
        let now = DateTime::<Utc>::UNIX_EPOCH;
        for _ in 0..100 {
            table.record_sample("gpt-x", 100.0, 110.0, now);
        }
        let snapshot = table.snapshot("gpt-x").unwrap();
        assert!((snapshot.avg_correction - 1.1).abs() < 1e-3);
        assert_eq!(snapshot.total_samples, 100);
    }

    #[test]
    fn invariant_total_samples_times_avg_equals_sum_ratio() {
        let table = TokenCorrectionTable::new();
        let now = DateTime::<Utc>::UNIX_EPOCH;
        for i in 1..=20u32 {
            table.record_sample("m", 50.0, 50.0 + i as f64, now);
        }
        let snapshot = table.snapshot("m").unwrap();
        let lhs = snapshot.total_samples as f64 * snapshot.avg_correction;
        assert!((lhs - snapshot.sum_ratio).abs() < 1e-6);
    }

    #[test]
    fn correction_not_applied_below_min_samples() {
        let table = TokenCorrectionTable::new();
        let now = DateTime::<Utc>::UNIX_EPOCH;
        for _ in 0..3 {
            table.record_sample("new-model", 100.0, 200.0, now);
        }
        assert_eq!(table.corrected_estimate("new-model", 100), 100);
    }

    #[test]
    fn correction_applied_once_confident() {
        let table = TokenCorrectionTable::new();
        let now = DateTime::<Utc>::UNIX_EPOCH;
        for _ in 0..10 {
            table.record_sample("seasoned-model", 100.0, 150.0, now);
        }
        assert_eq!(table.corrected_estimate("seasoned-model", 100), 150);
    }

    #[test]
    fn extreme_outlier_is_clamped_to_bounds() {
        let table = TokenCorrectionTable::new();
        let now = DateTime::<Utc>::UNIX_EPOCH;
        for _ in 0..10 {
            table.record_sample("outlier-model", 10.0, 1000.0, now);
        }
        let snapshot = table.snapshot("outlier-model").unwrap();
        assert_eq!(snapshot.avg_correction, CORRECTION_MAX);
    }
}
