//! Property tests: the constitutional-intent root is unconditionally
//! protected, whatever the rules, mode or impact.

use charter_policy::{GuardConfig, IntentGuard, HARD_INVARIANT_RULE};
use charter_types::{Authority, Impact, PolicyRule, RuleSeverity};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

fn arb_segments() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z][a-z0-9_]{0,8}(\\.yaml)?", 0..5)
}

/// Ways of spelling a path that normalises to `.intent/<rest>`.
fn arb_intent_path() -> impl Strategy<Value = String> {
    (arb_segments(), 0usize..4, "[a-z]{1,6}").prop_map(|(segments, style, detour)| {
        let rest = segments.join("/");
        let base = if rest.is_empty() {
            ".intent".to_string()
        } else {
            format!(".intent/{rest}")
        };
        match style {
            0 => base,
            1 => format!("./{base}"),
            2 => format!("{detour}/../{base}"),
            _ => base.replace('/', "\\"),
        }
    })
}

fn arb_impact() -> impl Strategy<Value = Option<Impact>> {
    prop_oneof![Just(None), Just(Some(Impact::Code)), Just(Some(Impact::MetadataOnly))]
}

/// An advisory catch-all rule, which must never soften the invariant.
fn catch_all() -> PolicyRule {
    PolicyRule {
        id: "standards.everything".into(),
        path_pattern: "**".into(),
        authority: Authority::Policy,
        severity: RuleSeverity::Advisory,
        owning_policy_id: "code_standards".into(),
        precedence_rank: 0,
        declaration_index: 0,
        engine: None,
        static_analysis: false,
        message: None,
        suggested_fix: None,
    }
}

fn guard(strict_mode: bool, with_rules: bool) -> IntentGuard {
    let rules = if with_rules { vec![catch_all()] } else { Vec::new() };
    IntentGuard::new(
        rules,
        GuardConfig {
            strict_mode,
            ..GuardConfig::default()
        },
    )
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn intent_paths_always_block(
        path in arb_intent_path(),
        strict in any::<bool>(),
        with_rules in any::<bool>(),
        impact in arb_impact(),
    ) {
        let result = guard(strict, with_rules).evaluate(&[path.as_str()], impact);
        prop_assert!(!result.is_valid);
        prop_assert!(result.hard_invariant_fired());
        prop_assert_eq!(result.blocking().count(), 1);
        prop_assert_eq!(&result.violations[0].rule_name, HARD_INVARIANT_RULE);
    }

    #[test]
    fn one_intent_path_poisons_the_transaction(
        path in arb_intent_path(),
        others in prop::collection::vec("src/[a-z]{1,8}\\.py", 0..5),
    ) {
        let mut paths = others;
        paths.push(path);
        let result = guard(false, false).evaluate(&paths, None);
        prop_assert!(!result.is_valid);
    }

    #[test]
    fn ordinary_paths_never_hit_the_invariant(segments in arb_segments()) {
        prop_assume!(!segments.is_empty());
        let path = format!("src/{}", segments.join("/"));
        let result = guard(true, true).evaluate(&[path.as_str()], None);
        prop_assert!(!result.hard_invariant_fired());
        prop_assert!(result.is_valid);
    }
}
