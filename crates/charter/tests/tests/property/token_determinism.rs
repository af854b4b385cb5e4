//! Property tests: approval tokens depend only on the logical content.

use charter_types::ApprovalToken;
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

/// Lines of printable text without carriage returns.
fn arb_lines() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[ -~]{0,40}", 0..12)
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn token_is_deterministic(content in any::<String>()) {
        prop_assert_eq!(
            ApprovalToken::for_content(&content),
            ApprovalToken::for_content(&content)
        );
    }

    #[test]
    fn token_always_parses(content in any::<String>()) {
        let token = ApprovalToken::for_content(&content);
        let parsed = ApprovalToken::parse(token.as_str()).unwrap();
        prop_assert_eq!(parsed, token);
    }

    #[test]
    fn line_endings_do_not_change_the_token(lines in arb_lines()) {
        let lf = lines.join("\n");
        let crlf = lines.join("\r\n");
        let cr = lines.join("\r");
        let token = ApprovalToken::for_content(&lf);
        prop_assert_eq!(&ApprovalToken::for_content(&crlf), &token);
        prop_assert_eq!(&ApprovalToken::for_content(&cr), &token);
    }

    #[test]
    fn distinct_content_gets_distinct_tokens(a in "[ -~\n]{0,64}", b in "[ -~\n]{0,64}") {
        prop_assume!(a != b);
        prop_assert_ne!(ApprovalToken::for_content(&a), ApprovalToken::for_content(&b));
    }
}
