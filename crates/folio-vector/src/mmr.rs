//! Similarity scoring and maximal marginal relevance selection.

use std::cmp::Ordering;

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();

    let mag_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}

/// Rank every vector against the query, highest score first.
///
/// Returns `(position, score)` pairs. The sort is stable, so equal scores
/// keep their original order.
pub fn rank_by_similarity(query: &[f32], vectors: &[Vec<f32>]) -> Vec<(usize, f64)> {
    let mut scored: Vec<(usize, f64)> = vectors
        .iter()
        .enumerate()
        .map(|(pos, v)| (pos, cosine_similarity(query, v)))
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored
}

/// Greedy maximal marginal relevance over a candidate pool.
///
/// `candidates` holds `(position, relevance)` pairs, typically the top
/// `fetch_k` entries of [`rank_by_similarity`]. Each round picks the
/// candidate maximising
/// `lambda_mult * relevance - (1 - lambda_mult) * max_sim_to_selected`.
/// Ties go to the lowest position. Returns `(position, relevance)` pairs in
/// selection order.
pub fn maximal_marginal_relevance(
    vectors: &[Vec<f32>],
    candidates: &[(usize, f64)],
    k: usize,
    lambda_mult: f64,
) -> Vec<(usize, f64)> {
    let target = k.min(candidates.len());
    let mut selected: Vec<(usize, f64)> = Vec::with_capacity(target);
    let mut remaining: Vec<(usize, f64)> = candidates.to_vec();

    // Largest similarity between each remaining candidate and the selected set.
    let mut redundancy: Vec<f64> = vec![f64::NEG_INFINITY; remaining.len()];

    while selected.len() < target {
        let mut best: Option<(usize, f64)> = None;
        for (idx, &(pos, relevance)) in remaining.iter().enumerate() {
            let penalty = if selected.is_empty() { 0.0 } else { redundancy[idx] };
            let score = lambda_mult * relevance - (1.0 - lambda_mult) * penalty;
            let better = match best {
                None => true,
                Some((best_idx, best_score)) => {
                    score > best_score
                        || (score == best_score && pos < remaining[best_idx].0)
                }
            };
            if better {
                best = Some((idx, score));
            }
        }

        let Some((best_idx, _)) = best else { break };
        let chosen = remaining.remove(best_idx);
        redundancy.remove(best_idx);

        let chosen_vec = &vectors[chosen.0];
        for (slot, &(pos, _)) in redundancy.iter_mut().zip(remaining.iter()) {
            let sim = cosine_similarity(&vectors[pos], chosen_vec);
            if sim > *slot {
                *slot = sim;
            }
        }

        selected.push(chosen);
    }

    selected
}
