//! Multi-criteria impact scoring and top-N selection.
//!
//! Scoring is a pure function of a lead's metadata and the configured
//! weights: recency (exponential decay), source trust, and category priority,
//! each on a 0–10 scale. Ranking sorts descending by score with ties broken
//! by earliest discovery timestamp, so the selection is deterministic for
//! fixed inputs.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use newsreel_shared::{CurationConfig, Lead, ScoredLead, StageError};

/// Scores and ranks unique leads, selecting a top-N subset for research.
pub struct Curator {
    config: CurationConfig,
}

impl Curator {
    pub fn new(config: CurationConfig) -> Self {
        Self { config }
    }

    /// Compute a lead's weighted impact score on a 0–10 scale.
    ///
    /// Pure in the lead's metadata and the configured weights, except that
    /// recency is measured against `now`. Malformed metadata (empty text,
    /// non-finite trust/priority entries) is a validation error; the lead is
    /// then excluded from ranking rather than aborting the stage.
    pub fn score_at(&self, lead: &Lead, now: DateTime<Utc>) -> Result<f64, StageError> {
        if lead.text.trim().is_empty() {
            return Err(StageError::validation("lead has no text to score"));
        }

        let recency = self.recency_score(lead.metadata.discovered_at, now);
        let trust = self.table_score(
            &self.config.source_trust,
            Some(&lead.metadata.source),
            self.config.default_trust,
            "source_trust",
        )?;
        let priority = self.table_score(
            &self.config.category_priority,
            lead.metadata.category.as_deref(),
            self.config.default_priority,
            "category_priority",
        )?;

        let w = &self.config.weights;
        let total = w.recency + w.source_trust + w.category_priority;
        let score =
            (w.recency * recency + w.source_trust * trust + w.category_priority * priority) / total;

        debug!(
            lead_id = %lead.id,
            recency,
            trust,
            priority,
            score,
            "lead scored"
        );
        Ok(score)
    }

    /// Score against the current time.
    pub fn score(&self, lead: &Lead) -> Result<f64, StageError> {
        self.score_at(lead, Utc::now())
    }

    /// Rank scored leads descending, ties by earliest `discovered_at`, and
    /// return at most `n` as [`ScoredLead`]s with 1-based ranks.
    ///
    /// Leads without a score (scoring failed upstream) are skipped. When a
    /// `min_score` floor is configured and nothing clears it, the top
    /// `min_select` by score are taken instead of selecting nothing. The
    /// input is never mutated.
    pub fn rank_and_select(&self, leads: &[Lead], n: usize) -> Vec<ScoredLead> {
        let mut scored: Vec<(&Lead, f64)> = leads
            .iter()
            .filter_map(|lead| lead.metadata.score.map(|s| (lead, s)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.metadata.discovered_at.cmp(&b.0.metadata.discovered_at))
        });

        let selected: Vec<(&Lead, f64)> = match self.config.min_score {
            Some(floor) => {
                let qualified: Vec<_> = scored
                    .iter()
                    .copied()
                    .filter(|(_, s)| *s >= floor)
                    .collect();
                if qualified.is_empty() && !scored.is_empty() {
                    warn!(
                        floor,
                        fallback = self.config.min_select,
                        "no leads cleared the score floor, falling back to top leads"
                    );
                    scored
                        .iter()
                        .copied()
                        .take(self.config.min_select)
                        .collect()
                } else {
                    qualified
                }
            }
            None => scored,
        };

        selected
            .into_iter()
            .take(n)
            .enumerate()
            .map(|(i, (lead, score))| ScoredLead {
                lead: lead.clone(),
                score,
                rank: i + 1,
            })
            .collect()
    }

    /// Recency on a 0–10 scale: halves every `recency_half_life_hours`.
    fn recency_score(&self, discovered_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let age_hours = (now - discovered_at).num_seconds().max(0) as f64 / 3600.0;
        10.0 * 0.5_f64.powf(age_hours / self.config.recency_half_life_hours)
    }

    fn table_score(
        &self,
        table: &std::collections::HashMap<String, f64>,
        key: Option<&str>,
        default: f64,
        table_name: &str,
    ) -> Result<f64, StageError> {
        let value = key.and_then(|k| table.get(k)).copied().unwrap_or(default);
        if !value.is_finite() {
            return Err(StageError::validation(format!(
                "non-finite {table_name} entry for {:?}",
                key.unwrap_or("<default>")
            )));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use newsreel_shared::CriteriaWeights;

    use super::*;

    fn config() -> CurationConfig {
        let mut config = CurationConfig::default();
        config.source_trust.insert("reuters".into(), 9.0);
        config.source_trust.insert("blog".into(), 2.0);
        config.category_priority.insert("politics".into(), 8.0);
        config
    }

    fn lead_at(text: &str, source: &str, category: Option<&str>, age_hours: i64) -> Lead {
        let mut lead = Lead::discovered(text, source, category.map(String::from));
        lead.metadata.discovered_at = Utc::now() - Duration::hours(age_hours);
        lead
    }

    #[test]
    fn fresh_trusted_lead_outscores_stale_untrusted() {
        let curator = Curator::new(config());
        let fresh = lead_at("rate cut", "reuters", Some("politics"), 0);
        let stale = lead_at("old rumor", "blog", None, 72);

        let fresh_score = curator.score(&fresh).unwrap();
        let stale_score = curator.score(&stale).unwrap();
        assert!(fresh_score > stale_score);
        assert!((0.0..=10.0).contains(&fresh_score));
    }

    #[test]
    fn scoring_is_deterministic_for_fixed_now() {
        let curator = Curator::new(config());
        let lead = lead_at("summit announced", "reuters", Some("politics"), 6);
        let now = Utc::now();

        let a = curator.score_at(&lead, now).unwrap();
        let b = curator.score_at(&lead, now).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_text_is_a_validation_error() {
        let curator = Curator::new(config());
        let lead = lead_at("   ", "reuters", None, 0);
        let err = curator.score(&lead).unwrap_err();
        assert_eq!(err.kind, newsreel_shared::ErrorKind::Validation);
    }

    #[test]
    fn non_finite_table_entry_is_a_validation_error() {
        let mut cfg = config();
        cfg.source_trust.insert("reuters".into(), f64::NAN);
        let curator = Curator::new(cfg);
        let lead = lead_at("story", "reuters", None, 0);
        assert!(curator.score(&lead).is_err());
    }

    #[test]
    fn rank_sorts_descending_and_assigns_ranks() {
        let curator = Curator::new(config());
        let mut low = lead_at("low", "blog", None, 48);
        let mut high = lead_at("high", "reuters", Some("politics"), 1);
        let mut mid = lead_at("mid", "reuters", None, 24);
        low.metadata.score = Some(2.0);
        high.metadata.score = Some(8.0);
        mid.metadata.score = Some(5.0);

        let ranked = curator.rank_and_select(&[low, high, mid], 10);
        let texts: Vec<&str> = ranked.iter().map(|s| s.lead.text.as_str()).collect();
        assert_eq!(texts, ["high", "mid", "low"]);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[2].rank, 3);
    }

    #[test]
    fn ties_break_by_earliest_discovery() {
        let curator = Curator::new(config());
        let mut earlier = lead_at("earlier", "reuters", None, 5);
        let mut later = lead_at("later", "reuters", None, 1);
        earlier.metadata.score = Some(6.0);
        later.metadata.score = Some(6.0);

        let ranked = curator.rank_and_select(&[later.clone(), earlier.clone()], 2);
        assert_eq!(ranked[0].lead.id, earlier.id);
        assert_eq!(ranked[1].lead.id, later.id);
    }

    #[test]
    fn selection_truncates_to_n_without_mutating_input() {
        let curator = Curator::new(config());
        let leads: Vec<Lead> = (0..5)
            .map(|i| {
                let mut l = lead_at(&format!("lead {i}"), "reuters", None, i);
                l.metadata.score = Some(10.0 - i as f64);
                l
            })
            .collect();

        let before = leads.clone();
        let ranked = curator.rank_and_select(&leads, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(leads, before);

        // Fewer than n available: all returned
        let ranked = curator.rank_and_select(&leads, 20);
        assert_eq!(ranked.len(), 5);
    }

    #[test]
    fn unscored_leads_are_skipped() {
        let curator = Curator::new(config());
        let mut scored = lead_at("scored", "reuters", None, 0);
        scored.metadata.score = Some(7.0);
        let unscored = lead_at("unscored", "reuters", None, 0);

        let ranked = curator.rank_and_select(&[unscored, scored.clone()], 10);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].lead.id, scored.id);
    }

    #[test]
    fn score_floor_with_fallback() {
        let mut cfg = config();
        cfg.min_score = Some(9.5);
        cfg.min_select = 2;
        let curator = Curator::new(cfg);

        let leads: Vec<Lead> = (0..4)
            .map(|i| {
                let mut l = lead_at(&format!("lead {i}"), "reuters", None, i);
                l.metadata.score = Some(5.0 + i as f64 * 0.5);
                l
            })
            .collect();

        // Nothing clears 9.5; fall back to top min_select
        let ranked = curator.rank_and_select(&leads, 10);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].lead.text, "lead 3");
    }

    #[test]
    fn weights_shift_the_ranking() {
        let mut recency_heavy = config();
        recency_heavy.weights = CriteriaWeights {
            recency: 1.0,
            source_trust: 0.0,
            category_priority: 0.0,
        };
        let curator = Curator::new(recency_heavy);

        let fresh_untrusted = lead_at("fresh", "blog", None, 0);
        let stale_trusted = lead_at("stale", "reuters", None, 48);

        let fresh_score = curator.score(&fresh_untrusted).unwrap();
        let stale_score = curator.score(&stale_trusted).unwrap();
        assert!(fresh_score > stale_score, "pure recency ignores trust");
    }
}
