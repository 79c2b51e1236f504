//! Client-side aggregation of prediction outcomes.
//!
//! The store keeps a running prediction counter and the most recent
//! confidence values, persisting both on every mutation. Everything shown on
//! the statistics surfaces is derived from those two values on read.

use std::collections::VecDeque;

use crate::predict::PredictionOutcome;
use crate::storage::{KeyValueStore, StorageError};

pub const HISTORY_CAPACITY: usize = 50;
pub const TOTAL_KEY: &str = "totalPredictions";
pub const HISTORY_KEY: &str = "confidenceHistory";
pub const BUCKET_LABELS: [&str; 5] = ["0-20%", "21-40%", "41-60%", "61-80%", "81-100%"];

/// Histogram bin for a confidence percentage. Upper bounds are inclusive.
pub fn bucket_index(confidence_percent: u8) -> usize {
    match confidence_percent {
        0..=20 => 0,
        21..=40 => 1,
        41..=60 => 2,
        61..=80 => 3,
        _ => 4,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub total_predictions: u64,
    /// Mean of the retained history, 0 when the history is empty.
    pub average_confidence: f64,
    pub confidence_buckets: [u32; 5],
}

impl MetricsSnapshot {
    pub fn average_percent(&self) -> u32 {
        self.average_confidence.round() as u32
    }

    pub fn labelled_buckets(&self) -> impl Iterator<Item = (&'static str, u32)> + '_ {
        BUCKET_LABELS
            .iter()
            .copied()
            .zip(self.confidence_buckets.iter().copied())
    }
}

pub struct MetricsStore<S: KeyValueStore> {
    store: S,
    total_predictions: u64,
    history: VecDeque<u8>,
}

impl<S: KeyValueStore> MetricsStore<S> {
    /// Restores persisted state. Unreadable entries are logged and start empty
    /// rather than failing the client.
    pub fn load(store: S) -> Self {
        let total_predictions = match store.load::<u64>(TOTAL_KEY) {
            Ok(total) => total.unwrap_or(0),
            Err(e) => {
                log::warn!("Discarding stored prediction count: {}", e);
                0
            }
        };

        let stored: Vec<f64> = match store.load(HISTORY_KEY) {
            Ok(history) => history.unwrap_or_default(),
            Err(e) => {
                log::warn!("Discarding stored confidence history: {}", e);
                Vec::new()
            }
        };
        let skip = stored.len().saturating_sub(HISTORY_CAPACITY);
        let history = stored
            .into_iter()
            .skip(skip)
            .filter(|c| c.is_finite())
            .map(|c| c.round().clamp(0.0, 100.0) as u8)
            .collect();

        Self {
            store,
            total_predictions,
            history,
        }
    }

    /// Appends one confidence value and persists the new state.
    ///
    /// A confidence of 0 is not a usable outcome and is ignored entirely, so
    /// the counter and the history never disagree about it. Returns whether
    /// the value was counted.
    pub fn record(&mut self, confidence_percent: u8) -> Result<bool, StorageError> {
        if confidence_percent == 0 {
            log::debug!("Ignoring zero confidence outcome");
            return Ok(false);
        }

        self.history.push_back(confidence_percent.min(100));
        while self.history.len() > HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.total_predictions = self.total_predictions.saturating_add(1);

        self.persist()?;
        Ok(true)
    }

    pub fn record_outcome(&mut self, outcome: &PredictionOutcome) -> Result<bool, StorageError> {
        self.record(outcome.confidence_percent)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut confidence_buckets = [0u32; 5];
        for &c in &self.history {
            confidence_buckets[bucket_index(c)] += 1;
        }

        let average_confidence = if self.history.is_empty() {
            0.0
        } else {
            self.history.iter().map(|&c| f64::from(c)).sum::<f64>() / self.history.len() as f64
        };

        MetricsSnapshot {
            total_predictions: self.total_predictions,
            average_confidence,
            confidence_buckets,
        }
    }

    pub fn total_predictions(&self) -> u64 {
        self.total_predictions
    }

    pub fn history(&self) -> impl Iterator<Item = u8> + '_ {
        self.history.iter().copied()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn persist(&mut self) -> Result<(), StorageError> {
        self.store.save(TOTAL_KEY, &self.total_predictions)?;
        let history: Vec<u8> = self.history.iter().copied().collect();
        self.store.save(HISTORY_KEY, &history)
    }
}
