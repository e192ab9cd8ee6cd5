//! Eligibility selection: which pool entries become drafts this run.
//!
//! Unhandled entries are narrowed to the lookback window, collapsed to one
//! per target, and then sampled uniformly so that every eligible target has
//! the same chance of being chosen regardless of sync order.

use std::cmp::Ordering;
use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rand::Rng;

use engage_types::Candidate;

use crate::db::repositories::PoolRepository;

/// Newest `created_at` first (unknown sorts last), then most recently seen
fn newer(a: &Candidate, b: &Candidate) -> Ordering {
    a.entry
        .created_at
        .cmp(&b.entry.created_at)
        .then_with(|| a.entry.last_seen_at.cmp(&b.entry.last_seen_at))
}

/// Keep candidates inside the window. Entries with unknown `created_at` were
/// retained deliberately and stay in.
pub fn within_window(candidates: Vec<Candidate>, cutoff: Option<DateTime<Utc>>) -> Vec<Candidate> {
    match cutoff {
        None => candidates,
        Some(cutoff) => candidates
            .into_iter()
            .filter(|c| c.entry.created_at.map_or(true, |created| created >= cutoff))
            .collect(),
    }
}

/// At most one candidate per target, preserving first-seen target order
pub fn one_per_target(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut order: Vec<String> = Vec::new();
    let mut best: HashMap<String, Candidate> = HashMap::new();
    for candidate in candidates {
        let key = candidate.entry.target_identifier.clone();
        match best.get(&key) {
            Some(current) if newer(&candidate, current) != Ordering::Greater => {}
            Some(_) => {
                best.insert(key, candidate);
            }
            None => {
                order.push(key.clone());
                best.insert(key, candidate);
            }
        }
    }
    order
        .into_iter()
        .filter_map(|key| best.remove(&key))
        .collect()
}

/// Uniform sample of `n` without replacement; everything when `n` covers the set
pub fn sample<R: Rng + ?Sized>(mut candidates: Vec<Candidate>, n: usize, rng: &mut R) -> Vec<Candidate> {
    if n >= candidates.len() {
        return candidates;
    }
    let mut picked: Vec<usize> = rand::seq::index::sample(rng, candidates.len(), n).into_vec();
    // Take from the back so earlier indices stay valid
    picked.sort_unstable_by(|a, b| b.cmp(a));
    picked
        .into_iter()
        .map(|i| candidates.swap_remove(i))
        .collect()
}

/// Full selection over the pool
pub fn select<R: Rng + ?Sized>(
    pool: &PoolRepository,
    cutoff: Option<DateTime<Utc>>,
    budget: usize,
    rng: &mut R,
) -> Result<Vec<Candidate>> {
    let eligible = one_per_target(within_window(pool.unhandled()?, cutoff));
    Ok(sample(eligible, budget, rng))
}
