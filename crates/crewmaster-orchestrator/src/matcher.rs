use crate::config::ReuseConfig;
use crewmaster_core::{
    AgentRecord, AgentReference, AgentSpec, Decision, Domain, ReuseDecision,
};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;
use uuid::Uuid;

/// Decides whether a designed agent can be satisfied by a stored one.
///
/// Pure: it only reads the records it is given. Usage bookkeeping belongs
/// to the store.
#[derive(Debug, Clone)]
pub struct ReuseMatcher {
    config: ReuseConfig,
}

impl ReuseMatcher {
    pub fn new(config: ReuseConfig) -> Self {
        Self { config }
    }

    pub fn threshold(&self) -> f64 {
        self.config.threshold
    }

    /// Weighted similarity in `[0, 1]`.
    pub fn score(&self, candidate: &AgentSpec, domain: Domain, existing: &AgentRecord) -> f64 {
        let tools = jaccard(&candidate.tool_set(), &existing.spec.tool_set());
        let text = jaccard(&text_tokens(candidate), &text_tokens(&existing.spec));
        let domain_match = if existing.domain == domain { 1.0 } else { 0.0 };

        let c = &self.config;
        let total = c.tool_weight + c.text_weight + c.domain_weight;
        if total <= 0.0 {
            return 0.0;
        }
        let raw = c.tool_weight * tools + c.text_weight * text + c.domain_weight * domain_match;
        (raw / total).clamp(0.0, 1.0)
    }

    /// Compare `candidate` against `existing`, skipping ids in `exclude`.
    ///
    /// Reuse requires a score at or above the threshold and a tool set that
    /// covers every tool the candidate needs. Among eligible agents the best
    /// score wins, then the most recently used.
    pub fn evaluate(
        &self,
        candidate: &AgentSpec,
        domain: Domain,
        existing: &[AgentRecord],
        exclude: &HashSet<Uuid>,
    ) -> ReuseDecision {
        let needed = candidate.tool_set();
        let mut best_seen = 0.0_f64;
        let mut winner: Option<(&AgentRecord, f64)> = None;

        for record in existing.iter().filter(|r| !exclude.contains(&r.id)) {
            let score = self.score(candidate, domain, record);
            best_seen = best_seen.max(score);

            let covers = needed.is_subset(&record.spec.tool_set());
            if !covers || score < self.config.threshold {
                continue;
            }
            let better = match winner {
                None => true,
                Some((current, current_score)) => {
                    score > current_score
                        || (score == current_score
                            && (record.recency(), std::cmp::Reverse(record.id))
                                > (current.recency(), std::cmp::Reverse(current.id)))
                }
            };
            if better {
                winner = Some((record, score));
            }
        }

        match winner {
            Some((record, score)) => {
                debug!(
                    role = %candidate.role,
                    matched = %record.id,
                    score,
                    "Reusing stored agent"
                );
                ReuseDecision {
                    candidate: candidate.clone(),
                    matched_existing: Some(AgentReference {
                        id: record.id,
                        role: record.spec.role.clone(),
                    }),
                    similarity_score: score,
                    decision: Decision::Reuse,
                }
            }
            None => {
                debug!(role = %candidate.role, best_score = best_seen, "Creating new agent");
                ReuseDecision {
                    similarity_score: best_seen,
                    ..ReuseDecision::create(candidate.clone())
                }
            }
        }
    }
}

impl Default for ReuseMatcher {
    fn default() -> Self {
        Self::new(ReuseConfig::default())
    }
}

fn jaccard<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let shared = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    shared / union
}

/// Lowercased alphanumeric tokens of role and goal.
fn text_tokens(spec: &AgentSpec) -> BTreeSet<String> {
    format!("{} {}", spec.role, spec.goal)
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn spec(role: &str, goal: &str, tools: &[&str]) -> AgentSpec {
        AgentSpec::new(role, goal).with_tools(tools.iter().copied())
    }

    fn stored(spec: AgentSpec, domain: Domain) -> AgentRecord {
        AgentRecord::new(spec, domain)
    }

    fn none() -> HashSet<Uuid> {
        HashSet::new()
    }

    #[test]
    fn test_exact_copy_scores_one_and_is_reused() {
        let candidate = spec("Research Specialist", "Gather sources", &["web_search"]);
        let existing = vec![stored(candidate.clone(), Domain::Research)];
        let decision =
            ReuseMatcher::default().evaluate(&candidate, Domain::Research, &existing, &none());
        assert_eq!(decision.decision, Decision::Reuse);
        assert_eq!(decision.similarity_score, 1.0);
        assert_eq!(decision.matched_existing.unwrap().id, existing[0].id);
    }

    #[test]
    fn test_superset_agent_at_threshold_is_reused() {
        let candidate = spec("Research Specialist", "Gather sources", &["web_search"]);
        let existing = vec![stored(
            spec(
                "Research Specialist",
                "Gather sources",
                &["web_search", "document_search"],
            ),
            Domain::Research,
        )];
        let matcher = ReuseMatcher::default();
        let score = matcher.score(&candidate, Domain::Research, &existing[0]);
        assert!(score >= matcher.threshold());

        let decision = matcher.evaluate(&candidate, Domain::Research, &existing, &none());
        assert_eq!(decision.decision, Decision::Reuse);
    }

    #[test]
    fn test_missing_tool_forces_create() {
        let candidate = spec(
            "Research Specialist",
            "Gather sources",
            &["web_search", "code_execution"],
        );
        let existing = vec![stored(
            spec(
                "Research Specialist",
                "Gather sources",
                &["web_search", "document_search"],
            ),
            Domain::Research,
        )];
        let lenient = ReuseMatcher::new(ReuseConfig {
            threshold: 0.0,
            ..ReuseConfig::default()
        });
        let decision = lenient.evaluate(&candidate, Domain::Research, &existing, &none());
        assert_eq!(decision.decision, Decision::Create);
        assert!(decision.matched_existing.is_none());
        assert!(decision.similarity_score > 0.0);
    }

    #[test]
    fn test_raising_threshold_only_moves_to_create() {
        let candidate = spec("Data Analyst", "Crunch numbers", &["data_processing"]);
        let existing = vec![stored(
            spec("Data Analyst", "Crunch sales numbers", &["data_processing"]),
            Domain::Analysis,
        )];
        let mut last_was_create = false;
        for step in 0..=20 {
            let matcher = ReuseMatcher::new(ReuseConfig {
                threshold: f64::from(step) / 20.0,
                ..ReuseConfig::default()
            });
            let decision = matcher.evaluate(&candidate, Domain::Analysis, &existing, &none());
            let is_create = decision.decision == Decision::Create;
            assert!(!(last_was_create && !is_create));
            last_was_create = is_create;
        }
        assert!(last_was_create);
    }

    #[test]
    fn test_recency_breaks_exact_ties() {
        let candidate = spec("Research Specialist", "Gather sources", &["web_search"]);
        let mut cold = stored(candidate.clone(), Domain::Research);
        let mut warm = stored(candidate.clone(), Domain::Research);
        cold.last_used = Some(Utc::now() - Duration::days(3));
        warm.last_used = Some(Utc::now());

        let decision = ReuseMatcher::default().evaluate(
            &candidate,
            Domain::Research,
            &[cold, warm.clone()],
            &none(),
        );
        assert_eq!(decision.matched_existing.unwrap().id, warm.id);
    }

    #[test]
    fn test_excluded_agents_are_skipped() {
        let candidate = spec("Research Specialist", "Gather sources", &["web_search"]);
        let existing = vec![stored(candidate.clone(), Domain::Research)];
        let exclude = HashSet::from([existing[0].id]);
        let decision =
            ReuseMatcher::default().evaluate(&candidate, Domain::Research, &existing, &exclude);
        assert_eq!(decision.decision, Decision::Create);
    }

    #[test]
    fn test_empty_store_creates() {
        let candidate = spec("Vision Specialist", "Read charts", &["vision"]);
        let decision = ReuseMatcher::default().evaluate(&candidate, Domain::Other, &[], &none());
        assert_eq!(decision.decision, Decision::Create);
        assert_eq!(decision.similarity_score, 0.0);
    }
}
