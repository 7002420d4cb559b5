//! Corpus-level translation quality scorers.
//!
//! Scores are on a 0–100 scale. Sentences are split on whitespace; callers
//! that need a specific tokenization should pre-tokenize their files.

use std::collections::HashMap;

const BLEU_MAX_ORDER: usize = 4;
const CHRF_MAX_ORDER: usize = 6;
const CHRF_BETA: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scorer {
    Bleu,
    Chrf,
    ExactMatch,
}

impl Scorer {
    /// Resolve a metric name. `sacrebleu_corpus_*` names are accepted so
    /// existing result files keep their metric labels.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "bleu" | "sacrebleu_corpus_bleu" => Some(Self::Bleu),
            "chrf" | "sacrebleu_corpus_chrf" => Some(Self::Chrf),
            "exact_match" | "exact-match" => Some(Self::ExactMatch),
            _ => None,
        }
    }

    pub fn score(&self, hypotheses: &[String], references: &[String]) -> f64 {
        match self {
            Self::Bleu => corpus_bleu(hypotheses, references),
            Self::Chrf => corpus_chrf(hypotheses, references),
            Self::ExactMatch => exact_match(hypotheses, references),
        }
    }
}

fn ngram_counts<T: Eq + std::hash::Hash + Clone>(items: &[T], n: usize) -> HashMap<Vec<T>, usize> {
    let mut counts = HashMap::new();
    if items.len() >= n {
        for window in items.windows(n) {
            *counts.entry(window.to_vec()).or_insert(0) += 1;
        }
    }
    counts
}

/// Clipped matches and hypothesis n-gram total for one order.
fn clipped<T: Eq + std::hash::Hash + Clone>(hyp: &[T], reference: &[T], n: usize) -> (usize, usize, usize) {
    let hyp_counts = ngram_counts(hyp, n);
    let ref_counts = ngram_counts(reference, n);
    let matches = hyp_counts
        .iter()
        .map(|(gram, count)| (*count).min(ref_counts.get(gram).copied().unwrap_or(0)))
        .sum();
    let hyp_total = hyp.len().saturating_sub(n - 1);
    let ref_total = reference.len().saturating_sub(n - 1);
    (matches, hyp_total, ref_total)
}

/// Corpus BLEU with brevity penalty and exponential smoothing of empty orders.
pub fn corpus_bleu(hypotheses: &[String], references: &[String]) -> f64 {
    let mut correct = [0usize; BLEU_MAX_ORDER];
    let mut total = [0usize; BLEU_MAX_ORDER];
    let mut hyp_len = 0usize;
    let mut ref_len = 0usize;

    for (hyp, reference) in hypotheses.iter().zip(references) {
        let hyp: Vec<&str> = hyp.split_whitespace().collect();
        let reference: Vec<&str> = reference.split_whitespace().collect();
        hyp_len += hyp.len();
        ref_len += reference.len();
        for n in 1..=BLEU_MAX_ORDER {
            let (matches, hyp_total, _) = clipped(&hyp, &reference, n);
            correct[n - 1] += matches;
            total[n - 1] += hyp_total;
        }
    }

    if hyp_len == 0 {
        return 0.0;
    }

    let mut smooth = 1.0;
    let mut log_sum = 0.0;
    let mut orders = 0;
    for n in 0..BLEU_MAX_ORDER {
        if total[n] == 0 {
            break;
        }
        let precision = if correct[n] == 0 {
            smooth *= 2.0;
            1.0 / (smooth * total[n] as f64)
        } else {
            correct[n] as f64 / total[n] as f64
        };
        log_sum += precision.ln();
        orders += 1;
    }
    if orders == 0 {
        return 0.0;
    }

    let brevity = if hyp_len < ref_len {
        (1.0 - ref_len as f64 / hyp_len as f64).exp()
    } else {
        1.0
    };
    100.0 * brevity * (log_sum / orders as f64).exp()
}

/// Corpus chrF (character n-grams up to 6, beta 2), whitespace ignored.
pub fn corpus_chrf(hypotheses: &[String], references: &[String]) -> f64 {
    let mut matches = [0usize; CHRF_MAX_ORDER];
    let mut hyp_totals = [0usize; CHRF_MAX_ORDER];
    let mut ref_totals = [0usize; CHRF_MAX_ORDER];

    for (hyp, reference) in hypotheses.iter().zip(references) {
        let hyp: Vec<char> = hyp.chars().filter(|c| !c.is_whitespace()).collect();
        let reference: Vec<char> = reference.chars().filter(|c| !c.is_whitespace()).collect();
        for n in 1..=CHRF_MAX_ORDER {
            let (m, h, r) = clipped(&hyp, &reference, n);
            matches[n - 1] += m;
            hyp_totals[n - 1] += h;
            ref_totals[n - 1] += r;
        }
    }

    let mut precision_sum = 0.0;
    let mut recall_sum = 0.0;
    let mut orders = 0;
    for n in 0..CHRF_MAX_ORDER {
        if hyp_totals[n] == 0 || ref_totals[n] == 0 {
            continue;
        }
        precision_sum += matches[n] as f64 / hyp_totals[n] as f64;
        recall_sum += matches[n] as f64 / ref_totals[n] as f64;
        orders += 1;
    }
    if orders == 0 {
        return 0.0;
    }

    let precision = precision_sum / orders as f64;
    let recall = recall_sum / orders as f64;
    let beta2 = CHRF_BETA * CHRF_BETA;
    let denominator = beta2 * precision + recall;
    if denominator == 0.0 {
        return 0.0;
    }
    100.0 * (1.0 + beta2) * precision * recall / denominator
}

/// Percentage of lines identical after trimming.
pub fn exact_match(hypotheses: &[String], references: &[String]) -> f64 {
    if references.is_empty() {
        return 0.0;
    }
    let hits = hypotheses
        .iter()
        .zip(references)
        .filter(|(h, r)| h.trim() == r.trim())
        .count();
    100.0 * hits as f64 / references.len() as f64
}
