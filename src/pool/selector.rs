//! Agent selection — capability, freshness, and reliability scoring.
//!
//! Scoring per candidate:
//! - +10 per capability shared with the task's inferred requirements
//! - +5 for an agent that has never completed a task, otherwise −0.1 per completion
//! - +5 × success ratio once the agent has any history
//!
//! Highest score wins; ties go to the earliest candidate.

use std::collections::BTreeSet;
use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use super::agent::Agent;
use super::task::Task;

const CAPABILITY_WEIGHT: f64 = 10.0;
const FRESH_AGENT_BONUS: f64 = 5.0;
const COMPLETION_DECAY: f64 = 0.1;
const RELIABILITY_WEIGHT: f64 = 5.0;

/// Capability used when no rule matches.
pub const GENERAL_CAPABILITY: &str = "general";

/// Derives the capabilities a task needs.
pub trait CapabilityInference: Send + Sync {
    fn required_capabilities(&self, task: &Task) -> BTreeSet<String>;
}

/// A description pattern and the capability it implies.
#[derive(Debug, Clone)]
pub struct KeywordRule {
    pub regex: Regex,
    pub capability: String,
}

/// Keyword heuristic over the task description.
#[derive(Debug, Clone)]
pub struct KeywordInference {
    rules: Vec<KeywordRule>,
}

impl KeywordInference {
    /// The stock keyword table.
    pub fn default_rules() -> Self {
        let rules = vec![
            KeywordRule {
                regex: Regex::new(r"(?i)form").unwrap(),
                capability: "form_filling".into(),
            },
            KeywordRule {
                regex: Regex::new(r"(?i)scrape|extract").unwrap(),
                capability: "scraping".into(),
            },
            KeywordRule {
                regex: Regex::new(r"(?i)test").unwrap(),
                capability: "testing".into(),
            },
            KeywordRule {
                regex: Regex::new(r"(?i)monitor").unwrap(),
                capability: "monitoring".into(),
            },
        ];

        Self { rules }
    }

    /// An inference with no rules; every task needs only `general`.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Add a custom pattern → capability rule.
    pub fn add_rule(&mut self, pattern: &str, capability: &str) -> Result<(), regex::Error> {
        self.rules.push(KeywordRule {
            regex: Regex::new(pattern)?,
            capability: capability.into(),
        });
        Ok(())
    }
}

impl Default for KeywordInference {
    fn default() -> Self {
        Self::default_rules()
    }
}

impl CapabilityInference for KeywordInference {
    fn required_capabilities(&self, task: &Task) -> BTreeSet<String> {
        let mut required: BTreeSet<String> = self
            .rules
            .iter()
            .filter(|rule| rule.regex.is_match(&task.description))
            .map(|rule| rule.capability.clone())
            .collect();

        if required.is_empty() {
            required.insert(GENERAL_CAPABILITY.to_string());
        }
        required
    }
}

/// Picks the best idle agent for a task. Stateless apart from the inference strategy.
#[derive(Clone)]
pub struct Selector {
    inference: Arc<dyn CapabilityInference>,
}

impl Selector {
    pub fn new(inference: Arc<dyn CapabilityInference>) -> Self {
        Self { inference }
    }

    pub fn required_capabilities(&self, task: &Task) -> BTreeSet<String> {
        self.inference.required_capabilities(task)
    }

    /// Score one candidate against a precomputed requirement set.
    pub fn score(required: &BTreeSet<String>, agent: &Agent) -> f64 {
        let matching = agent.capabilities.intersection(required).count();
        let mut score = matching as f64 * CAPABILITY_WEIGHT;

        if agent.completed_tasks == 0 {
            score += FRESH_AGENT_BONUS;
        } else {
            score -= agent.completed_tasks as f64 * COMPLETION_DECAY;
        }

        let finished = agent.completed_tasks + agent.failed_tasks;
        if finished > 0 {
            score += RELIABILITY_WEIGHT * (agent.completed_tasks as f64 / finished as f64);
        }

        score
    }

    /// Choose an agent id from `candidates`, or `None` if there are none.
    pub fn select(&self, task: &Task, candidates: &[&Agent]) -> Option<String> {
        let required = self.required_capabilities(task);

        let mut best: Option<(&Agent, f64)> = None;
        for &agent in candidates {
            let score = Self::score(&required, agent);
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((agent, score)),
            }
        }

        let (agent, score) = best?;
        debug!(
            task_id = %task.id,
            agent_id = %agent.id,
            score,
            "Selected agent"
        );
        Some(agent.id.clone())
    }
}

impl Default for Selector {
    fn default() -> Self {
        Self::new(Arc::new(KeywordInference::default_rules()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::agent::AgentProfile;
    use crate::pool::task::TaskSpec;

    fn agent(id: &str, capabilities: &[&str]) -> Agent {
        Agent::from_profile(id, AgentProfile::new(id, capabilities.iter().copied()))
    }

    fn task(description: &str) -> Task {
        Task::from_spec(TaskSpec::new("task", description)).unwrap()
    }

    fn required(caps: &[&str]) -> BTreeSet<String> {
        caps.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn keyword_inference_matches_description() {
        let inference = KeywordInference::default_rules();
        assert_eq!(
            inference.required_capabilities(&task("Extract product prices")),
            required(&["scraping"])
        );
        assert_eq!(
            inference.required_capabilities(&task("Fill the Form and test it")),
            required(&["form_filling", "testing"])
        );
        assert_eq!(
            inference.required_capabilities(&task("Check system health")),
            required(&["general"])
        );
    }

    #[test]
    fn default_rules_cover_every_keyword() {
        let inference = KeywordInference::default_rules();
        assert_eq!(inference.rules.len(), 4);
        for (keyword, capability) in [
            ("FORM", "form_filling"),
            ("scrape", "scraping"),
            ("Extract", "scraping"),
            ("test", "testing"),
            ("Monitor", "monitoring"),
        ] {
            assert!(
                inference
                    .rules
                    .iter()
                    .any(|r| r.regex.is_match(keyword) && r.capability == capability),
                "{keyword} should map to {capability}"
            );
        }
    }

    #[test]
    fn keyword_inference_matches_inside_words() {
        let inference = KeywordInference::default_rules();
        // "perFORMance" and "inFORMation" both contain "form".
        assert_eq!(
            inference.required_capabilities(&task("Run performance tests on landing page")),
            required(&["form_filling", "testing"])
        );
        assert_eq!(
            inference.required_capabilities(&task("Extract product information")),
            required(&["form_filling", "scraping"])
        );
    }

    #[test]
    fn custom_rule_extends_inference() {
        let mut inference = KeywordInference::empty();
        inference.add_rule(r"(?i)\blogin\b", "authentication").unwrap();
        assert_eq!(
            inference.required_capabilities(&task("Login to the portal")),
            required(&["authentication"])
        );
        assert!(inference.add_rule("(", "broken").is_err());
    }

    #[test]
    fn prefers_capability_match() {
        let selector = Selector::default();
        let scraper = agent("scraper", &["scraping"]);
        let general = agent("general", &["general"]);

        let chosen = selector.select(&task("scrape the catalogue"), &[&general, &scraper]);
        assert_eq!(chosen.as_deref(), Some("scraper"));
    }

    #[test]
    fn prefers_fresh_agent_over_loaded_one() {
        let selector = Selector::default();
        let fresh = agent("a", &["general"]);
        let mut loaded = agent("b", &["general"]);
        loaded.completed_tasks = 10;

        // fresh: 10 + 5 = 15; loaded: 10 - 1 + 5 = 14
        let req = required(&["general"]);
        assert_eq!(Selector::score(&req, &fresh), 15.0);
        assert!((Selector::score(&req, &loaded) - 14.0).abs() < 1e-9);

        let chosen = selector.select(&task("do something"), &[&loaded, &fresh]);
        assert_eq!(chosen.as_deref(), Some("a"));
    }

    #[test]
    fn reliability_counts_failures() {
        let req = required(&["general"]);
        let mut flaky = agent("flaky", &["general"]);
        flaky.failed_tasks = 4;
        // never completed: fresh bonus, reliability 0
        assert_eq!(Selector::score(&req, &flaky), 15.0);

        let mut solid = agent("solid", &["general"]);
        solid.completed_tasks = 1;
        solid.failed_tasks = 1;
        assert!((Selector::score(&req, &solid) - (10.0 - 0.1 + 2.5)).abs() < 1e-9);
    }

    #[test]
    fn ties_go_to_first_candidate() {
        let selector = Selector::default();
        let a = agent("a", &["general"]);
        let b = agent("b", &["general"]);
        assert_eq!(selector.select(&task("x"), &[&a, &b]).as_deref(), Some("a"));
        assert_eq!(selector.select(&task("x"), &[&b, &a]).as_deref(), Some("b"));
    }

    #[test]
    fn negative_scores_still_select() {
        let selector = Selector::default();
        let mut worn = agent("worn", &["unrelated"]);
        worn.completed_tasks = 200;
        worn.failed_tasks = 800;
        assert!(Selector::score(&required(&["general"]), &worn) < 0.0);
        assert_eq!(selector.select(&task("x"), &[&worn]).as_deref(), Some("worn"));
    }

    #[test]
    fn empty_candidates_select_none() {
        let selector = Selector::default();
        assert!(selector.select(&task("x"), &[]).is_none());
    }
}
