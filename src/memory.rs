//! Fractal Memory: an indexed pattern store with cosine-similarity
//! nearest-neighbor retrieval, the same-regime bucket scanned first.
//!
//! The capacity-bound-then-evict-oldest discipline generalizes the ring
//! buffer's eviction rule to a keyed store that also has to keep three
//! secondary indices consistent.

use crate::learning::TradeOutcome;
use crate::meta_controller::RegimeLabel;
use crate::numerics;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

const FINGERPRINT_DIMS: usize = 13;
const RECENT_ID_CAPACITY: usize = 1000;
const PARALLEL_SCAN_THRESHOLD: usize = 256;

pub type Fingerprint = [f64; FINGERPRINT_DIMS];

/// Raw, pre-normalization inputs to a fingerprint; kept separate from the
/// normalized `Fingerprint` so eviction/insertion can re-normalize the
/// whole store consistently.
#[derive(Debug, Clone, Copy, Default)]
pub struct FingerprintInputs {
    pub momentum: f64,
    pub trend_strength: f64,
    pub implied_vol_fraction: f64,
    pub vol_spread_fraction: f64,
    pub skew_fraction: f64,
    pub pull_direction: f64,
    pub pull_magnitude: f64,
    pub liquidity_imbalance: f64,
    pub absorption: f64,
    pub hedging_pressure: f64,
    pub dealer_confidence: f64,
    pub regime_confidence: f64,
    pub transition_probability: f64,
}

impl FingerprintInputs {
    fn as_array(&self) -> [f64; FINGERPRINT_DIMS] {
        [
            self.momentum,
            self.trend_strength,
            self.implied_vol_fraction,
            self.vol_spread_fraction,
            self.skew_fraction,
            self.pull_direction,
            self.pull_magnitude,
            self.liquidity_imbalance,
            self.absorption,
            self.hedging_pressure,
            self.dealer_confidence,
            self.regime_confidence,
            self.transition_probability,
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalPattern {
    pub id: Uuid,
    pub timestamp: i64,
    pub fingerprint: Fingerprint,
    pub outcome_positive: bool,
    pub regime: RegimeLabel,
}

/// Flat snapshot of one stored pattern, used for import/export round trips.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternRecord {
    pub id: Uuid,
    pub timestamp: i64,
    pub fingerprint: Fingerprint,
    pub outcome_positive: bool,
    pub regime: RegimeLabel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarPattern {
    pub pattern: HistoricalPattern,
    pub similarity: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_patterns: usize,
    pub positive_count: usize,
    pub negative_count: usize,
    pub per_regime: HashMap<RegimeLabel, usize>,
}

/// Min-max normalizes raw inputs column-wise across the whole store so
/// fingerprints stay comparable under cosine similarity. A degenerate
/// (zero-range) column normalizes to `0.0` for every row, matching
/// `numerics::min_max_normalize`'s divide-by-zero-yields-0 rule — not `0.5`,
/// which would falsely add shared signal to every fingerprint's zero axes and
/// pull otherwise-orthogonal patterns' cosine similarity off of 0.
fn normalize_columns(raw: &[[f64; FINGERPRINT_DIMS]]) -> Vec<Fingerprint> {
    if raw.is_empty() {
        return Vec::new();
    }
    let mut mins = raw[0];
    let mut maxs = raw[0];
    for row in raw.iter().skip(1) {
        for d in 0..FINGERPRINT_DIMS {
            mins[d] = mins[d].min(row[d]);
            maxs[d] = maxs[d].max(row[d]);
        }
    }
    raw.iter()
        .map(|row| {
            let mut out = [0.0; FINGERPRINT_DIMS];
            for d in 0..FINGERPRINT_DIMS {
                let range = maxs[d] - mins[d];
                out[d] = if range.abs() < f64::EPSILON {
                    0.0
                } else {
                    (row[d] - mins[d]) / range
                };
            }
            out
        })
        .collect()
}

pub struct FractalMemory {
    capacity: usize,
    patterns: HashMap<Uuid, HistoricalPattern>,
    raw_inputs: HashMap<Uuid, [f64; FINGERPRINT_DIMS]>,
    recent_ids: crate::ring_buffer::RingBuffer<Uuid>,
    by_regime: HashMap<RegimeLabel, Vec<Uuid>>,
    by_outcome_positive: Vec<Uuid>,
    by_outcome_negative: Vec<Uuid>,
    by_hour_bucket: HashMap<i64, Vec<Uuid>>,
}

impl FractalMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            patterns: HashMap::new(),
            raw_inputs: HashMap::new(),
            recent_ids: crate::ring_buffer::RingBuffer::new(RECENT_ID_CAPACITY.max(capacity.max(1))),
            by_regime: HashMap::new(),
            by_outcome_positive: Vec::new(),
            by_outcome_negative: Vec::new(),
            by_hour_bucket: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    fn hour_bucket(timestamp_ms: i64) -> i64 {
        timestamp_ms / 3_600_000
    }

    fn remove_from_indices(&mut self, id: Uuid, pattern: &HistoricalPattern) {
        if let Some(bucket) = self.by_regime.get_mut(&pattern.regime) {
            bucket.retain(|&p| p != id);
        }
        if pattern.outcome_positive {
            self.by_outcome_positive.retain(|&p| p != id);
        } else {
            self.by_outcome_negative.retain(|&p| p != id);
        }
        let hour = Self::hour_bucket(pattern.timestamp);
        if let Some(bucket) = self.by_hour_bucket.get_mut(&hour) {
            bucket.retain(|&p| p != id);
        }
    }

    fn insert_into_indices(&mut self, id: Uuid, pattern: &HistoricalPattern) {
        self.by_regime.entry(pattern.regime).or_default().push(id);
        if pattern.outcome_positive {
            self.by_outcome_positive.push(id);
        } else {
            self.by_outcome_negative.push(id);
        }
        let hour = Self::hour_bucket(pattern.timestamp);
        self.by_hour_bucket.entry(hour).or_default().push(id);
    }

    /// Evicts oldest-by-timestamp patterns until within capacity, keeping
    /// every index consistent.
    fn evict_if_over_capacity(&mut self) {
        while self.patterns.len() > self.capacity {
            let oldest_id = self
                .patterns
                .values()
                .min_by_key(|p| p.timestamp)
                .map(|p| p.id);
            if let Some(id) = oldest_id {
                if let Some(pattern) = self.patterns.remove(&id) {
                    self.remove_from_indices(id, &pattern);
                    self.raw_inputs.remove(&id);
                    tracing::warn!(pattern_id = %id, "evicting oldest fractal memory pattern over capacity");
                }
            } else {
                break;
            }
        }
    }

    /// Stores a new pattern from raw fingerprint inputs, re-normalizing the
    /// whole store so every stored fingerprint stays comparable.
    pub fn store(&mut self, timestamp: i64, inputs: FingerprintInputs, outcome: &TradeOutcome, regime: RegimeLabel) -> Uuid {
        let id = Uuid::new_v4();
        self.raw_inputs.insert(id, inputs.as_array());
        self.recent_ids.push(id);

        let mut ids: Vec<Uuid> = self.raw_inputs.keys().copied().collect();
        ids.sort();
        let raw: Vec<[f64; FINGERPRINT_DIMS]> = ids.iter().map(|i| self.raw_inputs[i]).collect();
        let normalized = normalize_columns(&raw);

        for (candidate_id, fingerprint) in ids.iter().zip(normalized.iter()) {
            if let Some(existing) = self.patterns.get_mut(candidate_id) {
                existing.fingerprint = *fingerprint;
            }
        }

        let fingerprint = ids
            .iter()
            .zip(normalized.iter())
            .find(|(candidate_id, _)| **candidate_id == id)
            .map(|(_, fp)| *fp)
            .unwrap_or([0.0; FINGERPRINT_DIMS]);

        let pattern = HistoricalPattern {
            id,
            timestamp,
            fingerprint,
            outcome_positive: outcome.pnl > 0.0,
            regime,
        };
        self.insert_into_indices(id, &pattern);
        self.patterns.insert(id, pattern);

        self.evict_if_over_capacity();
        id
    }

    /// Same-regime bucket scanned first by cosine similarity; if that
    /// yields fewer than `limit` candidates, the remaining patterns are
    /// scanned too. Large candidate pools are scored in parallel.
    pub fn retrieve_similar(&self, query: &Fingerprint, regime: RegimeLabel, limit: usize) -> Vec<SimilarPattern> {
        let same_regime_ids: Vec<Uuid> = self.by_regime.get(&regime).cloned().unwrap_or_default();
        let mut scored = self.score_ids(&same_regime_ids, query);
        scored.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));

        if scored.len() < limit {
            let seen: std::collections::HashSet<Uuid> = same_regime_ids.into_iter().collect();
            let remaining_ids: Vec<Uuid> = self.patterns.keys().copied().filter(|id| !seen.contains(id)).collect();
            let mut rest = self.score_ids(&remaining_ids, query);
            rest.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
            scored.extend(rest);
        }

        scored.truncate(limit);
        scored
    }

    fn score_ids(&self, ids: &[Uuid], query: &Fingerprint) -> Vec<SimilarPattern> {
        let score_one = |id: &Uuid| {
            self.patterns.get(id).map(|pattern| SimilarPattern {
                pattern: pattern.clone(),
                similarity: numerics::cosine_similarity(query, &pattern.fingerprint),
            })
        };
        if ids.len() >= PARALLEL_SCAN_THRESHOLD {
            ids.par_iter().filter_map(score_one).collect()
        } else {
            ids.iter().filter_map(score_one).collect()
        }
    }

    pub fn by_outcome(&self, positive: bool, limit: usize) -> Vec<HistoricalPattern> {
        let ids = if positive { &self.by_outcome_positive } else { &self.by_outcome_negative };
        ids.iter()
            .rev()
            .take(limit)
            .filter_map(|id| self.patterns.get(id).cloned())
            .collect()
    }

    pub fn by_regime(&self, regime: RegimeLabel) -> Vec<HistoricalPattern> {
        self.by_regime
            .get(&regime)
            .map(|ids| ids.iter().filter_map(|id| self.patterns.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> MemoryStats {
        let mut per_regime = HashMap::new();
        for (regime, ids) in &self.by_regime {
            per_regime.insert(*regime, ids.len());
        }
        MemoryStats {
            total_patterns: self.patterns.len(),
            positive_count: self.by_outcome_positive.len(),
            negative_count: self.by_outcome_negative.len(),
            per_regime,
        }
    }

    /// Flat snapshot suitable for round-tripping through `import_patterns`.
    pub fn export_patterns(&self) -> Vec<PatternRecord> {
        self.patterns
            .values()
            .map(|p| PatternRecord {
                id: p.id,
                timestamp: p.timestamp,
                fingerprint: p.fingerprint,
                outcome_positive: p.outcome_positive,
                regime: p.regime,
            })
            .collect()
    }

    /// Rebuilds an equivalent store (same patterns, same index membership)
    /// from a flat snapshot. Fails on duplicate ids.
    pub fn import_patterns(&mut self, records: Vec<PatternRecord>) -> anyhow::Result<()> {
        self.patterns.clear();
        self.raw_inputs.clear();
        self.by_regime.clear();
        self.by_outcome_positive.clear();
        self.by_outcome_negative.clear();
        self.by_hour_bucket.clear();
        self.recent_ids.clear();

        for record in records {
            if self.patterns.contains_key(&record.id) {
                anyhow::bail!("duplicate pattern id {} in import", record.id);
            }
            let pattern = HistoricalPattern {
                id: record.id,
                timestamp: record.timestamp,
                fingerprint: record.fingerprint,
                outcome_positive: record.outcome_positive,
                regime: record.regime,
            };
            self.recent_ids.push(pattern.id);
            self.insert_into_indices(pattern.id, &pattern);
            self.patterns.insert(pattern.id, pattern);
        }
        self.evict_if_over_capacity();
        Ok(())
    }
}
