use heshbon_core::{DictionaryRule, MatchType};

/// One rule with its regex compiled up front. A pattern that fails to
/// compile stays in the list but can never match.
struct CompiledRule {
    rule: DictionaryRule,
    regex: Option<regex::Regex>,
}

/// Categorization engine over a user's rule dictionary.
///
/// Match tiers are strict: every exact rule is tried before any contains
/// rule, and every contains rule before any regex rule. Within a tier the
/// highest priority wins; on equal priority the older rule (lower id) wins.
/// Matching is case-sensitive against the transaction's business name.
pub struct RuleEngine {
    tiers: [Vec<CompiledRule>; 3],
    regex_errors: usize,
}

impl RuleEngine {
    pub fn new(rules: Vec<DictionaryRule>) -> Self {
        let mut tiers: [Vec<CompiledRule>; 3] = Default::default();
        let mut regex_errors = 0;

        for rule in rules {
            let regex = if rule.match_type == MatchType::Regex {
                match regex::Regex::new(&rule.pattern) {
                    Ok(regex) => Some(regex),
                    Err(err) => {
                        tracing::warn!(
                            rule_id = ?rule.id,
                            pattern = %rule.pattern,
                            error = %err,
                            "dictionary rule has an invalid regex"
                        );
                        regex_errors += 1;
                        None
                    }
                }
            } else {
                None
            };

            let tier = match rule.match_type {
                MatchType::Exact => 0,
                MatchType::Contains => 1,
                MatchType::Regex => 2,
            };
            tiers[tier].push(CompiledRule { rule, regex });
        }

        // Stable sort keeps insertion (id) order within equal priorities.
        for tier in &mut tiers {
            tier.sort_by(|a, b| b.rule.priority.cmp(&a.rule.priority));
        }

        Self { tiers, regex_errors }
    }

    /// Rules whose regex failed to compile. Surfaced so callers can warn
    /// once per import instead of per transaction.
    pub fn regex_error_count(&self) -> usize {
        self.regex_errors
    }

    pub fn categorize(&self, business_name: &str) -> Option<&DictionaryRule> {
        self.tiers
            .iter()
            .flat_map(|tier| tier.iter())
            .find(|cr| matches(cr, business_name))
            .map(|cr| &cr.rule)
    }
}

fn matches(cr: &CompiledRule, business_name: &str) -> bool {
    match cr.rule.match_type {
        MatchType::Exact => business_name == cr.rule.pattern,
        MatchType::Contains => business_name.contains(&cr.rule.pattern),
        MatchType::Regex => cr
            .regex
            .as_ref()
            .is_some_and(|regex| regex.is_match(business_name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rule(id: i64, match_type: MatchType, pattern: &str, category: &str, priority: i64) -> DictionaryRule {
        DictionaryRule {
            id: Some(id),
            owner_id: 1,
            match_type,
            pattern: pattern.to_string(),
            category: category.to_string(),
            priority,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn exact_tier_beats_contains_despite_priority() {
        let engine = RuleEngine::new(vec![
            rule(1, MatchType::Contains, "סופר", "קניות", 999),
            rule(2, MatchType::Exact, "סופר יוחננוף", "מזון", 1),
        ]);
        let hit = engine.categorize("סופר יוחננוף").unwrap();
        assert_eq!(hit.category, "מזון");
    }

    #[test]
    fn priority_orders_within_a_tier() {
        let engine = RuleEngine::new(vec![
            rule(1, MatchType::Contains, "דלק", "רכב", 10),
            rule(2, MatchType::Contains, "דלק", "תחבורה", 50),
        ]);
        assert_eq!(engine.categorize("תחנת דלק פז").unwrap().category, "תחבורה");
    }

    #[test]
    fn equal_priority_prefers_older_rule() {
        let engine = RuleEngine::new(vec![
            rule(1, MatchType::Contains, "קפה", "בתי קפה", 10),
            rule(2, MatchType::Contains, "קפה", "פנאי", 10),
        ]);
        assert_eq!(engine.categorize("קפה גרג").unwrap().id, Some(1));
    }

    #[test]
    fn regex_tier_matches_last() {
        let engine = RuleEngine::new(vec![rule(1, MatchType::Regex, r"^PAYPAL \*", "אונליין", 0)]);
        assert_eq!(engine.categorize("PAYPAL *STEAM").unwrap().category, "אונליין");
        assert!(engine.categorize("steam paypal").is_none());
    }

    #[test]
    fn invalid_regex_never_matches_and_is_counted() {
        let engine = RuleEngine::new(vec![
            rule(1, MatchType::Regex, "([unclosed", "broken", 100),
            rule(2, MatchType::Contains, "paypal", "אונליין", 0),
        ]);
        assert_eq!(engine.regex_error_count(), 1);
        assert_eq!(engine.categorize("paypal eu").unwrap().id, Some(2));
    }

    #[test]
    fn matching_is_case_sensitive() {
        let engine = RuleEngine::new(vec![rule(1, MatchType::Contains, "PAYPAL", "אונליין", 0)]);
        assert!(engine.categorize("paypal eu").is_none());
        assert!(engine.categorize("PAYPAL EU").is_some());
    }

    #[test]
    fn no_rules_no_match() {
        let engine = RuleEngine::new(Vec::new());
        assert!(engine.categorize("anything").is_none());
    }
}
