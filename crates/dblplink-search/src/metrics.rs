//! Entity linking evaluation metrics.
//!
//! Gold entities are `<uri>`-wrapped IRIs as they appear in DBLP-QuAD, so
//! predicted URIs are wrapped the same way before comparison. Only person
//! and publication spans take part in evaluation.

use std::collections::HashSet;

use serde::Serialize;

use dblplink_core::{LinkingResult, RankedSpanResult, SpanType};

fn is_evaluated(result: &RankedSpanResult) -> bool {
    matches!(result.span_type, SpanType::Person | SpanType::Publication)
}

fn wrap(uri: &str) -> String {
    format!("<{uri}>")
}

/// Top-ranked URI of every evaluated span, without duplicates.
pub fn extract_top_uris(result: &LinkingResult) -> Vec<String> {
    let mut seen = HashSet::new();
    result
        .ranked_results
        .iter()
        .filter(|r| is_evaluated(r))
        .filter_map(|r| r.candidates.first())
        .map(|c| wrap(&c.uri))
        .filter(|uri| seen.insert(uri.clone()))
        .collect()
}

/// Ranked URIs of every evaluated span; spans without candidates are skipped.
pub fn extract_candidate_lists(result: &LinkingResult) -> Vec<Vec<String>> {
    result
        .ranked_results
        .iter()
        .filter(|r| is_evaluated(r) && !r.candidates.is_empty())
        .map(|r| r.candidates.iter().map(|c| wrap(&c.uri)).collect())
        .collect()
}

/// Set-based F1 of predicted against gold URIs; 0 when nothing matches.
pub fn f1(predicted: &[String], gold: &[String]) -> f64 {
    let predicted: HashSet<&str> = predicted.iter().map(String::as_str).collect();
    let gold: HashSet<&str> = gold.iter().map(String::as_str).collect();

    let true_positives = predicted.intersection(&gold).count() as f64;
    let precision = if predicted.is_empty() {
        0.0
    } else {
        true_positives / predicted.len() as f64
    };
    let recall = if gold.is_empty() {
        0.0
    } else {
        true_positives / gold.len() as f64
    };

    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// Mean reciprocal rank of each gold URI's best position across all lists.
pub fn mrr(candidate_lists: &[Vec<String>], gold: &[String]) -> f64 {
    if gold.is_empty() {
        return 0.0;
    }
    let total: f64 = gold
        .iter()
        .map(|g| {
            candidate_lists
                .iter()
                .filter_map(|list| list.iter().position(|uri| uri == g))
                .min()
                .map_or(0.0, |rank| 1.0 / (rank + 1) as f64)
        })
        .sum();
    total / gold.len() as f64
}

/// Fraction of gold URIs appearing within the first `k` of some list.
pub fn hits_at_k(candidate_lists: &[Vec<String>], gold: &[String], k: usize) -> f64 {
    if gold.is_empty() {
        return 0.0;
    }
    let hits = gold
        .iter()
        .filter(|g| {
            candidate_lists
                .iter()
                .any(|list| list.iter().take(k).any(|uri| uri == *g))
        })
        .count();
    hits as f64 / gold.len() as f64
}

/// Metrics for one evaluated question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionMetrics {
    pub f1: f64,
    pub mrr: f64,
    /// `(k, hits@k)` pairs.
    pub hits: Vec<(usize, f64)>,
    pub gold_count: usize,
}

impl QuestionMetrics {
    /// Score a linking result against the question's gold entities.
    pub fn evaluate(result: &LinkingResult, gold: &[String], cutoffs: &[usize]) -> Self {
        let top = extract_top_uris(result);
        let lists = extract_candidate_lists(result);
        Self {
            f1: f1(&top, gold),
            mrr: mrr(&lists, gold),
            hits: cutoffs
                .iter()
                .map(|&k| (k, hits_at_k(&lists, gold, k)))
                .collect(),
            gold_count: gold.len(),
        }
    }
}

/// Running totals over a dataset.
///
/// F1 and MRR are averaged per question; hits@k are weighted by each
/// question's number of gold entities.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub questions: usize,
    pub gold_entities: usize,
    f1_total: f64,
    mrr_total: f64,
    hits_totals: Vec<(usize, f64)>,
}

impl MetricsSummary {
    pub fn new(cutoffs: &[usize]) -> Self {
        Self {
            hits_totals: cutoffs.iter().map(|&k| (k, 0.0)).collect(),
            ..Default::default()
        }
    }

    pub fn add(&mut self, metrics: &QuestionMetrics) {
        self.questions += 1;
        self.gold_entities += metrics.gold_count;
        self.f1_total += metrics.f1;
        self.mrr_total += metrics.mrr;
        for (total, (_, value)) in self.hits_totals.iter_mut().zip(&metrics.hits) {
            total.1 += value * metrics.gold_count as f64;
        }
    }

    pub fn f1(&self) -> f64 {
        ratio(self.f1_total, self.questions)
    }

    pub fn mrr(&self) -> f64 {
        ratio(self.mrr_total, self.questions)
    }

    /// `(k, hits@k)` over all gold entities seen so far.
    pub fn hits(&self) -> Vec<(usize, f64)> {
        self.hits_totals
            .iter()
            .map(|&(k, total)| (k, ratio(total, self.gold_entities)))
            .collect()
    }
}

fn ratio(total: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}
