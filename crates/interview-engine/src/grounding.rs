//! Grounding checks: proof that an expected answer is an exact excerpt of
//! retrieved documentation, and a quality gate for retrieval contexts.

use interview_types::RetrievalContext;

/// `true` only if `expected` is non-empty and occurs verbatim in `context`,
/// and so does every non-empty key point. No normalisation of any kind.
pub fn is_grounded_answer(expected: &str, key_points: &[String], context: &str) -> bool {
    if expected.trim().is_empty() || context.is_empty() {
        return false;
    }
    if !context.contains(expected) {
        return false;
    }
    key_points
        .iter()
        .filter(|kp| !kp.trim().is_empty())
        .all(|kp| context.contains(kp.as_str()))
}

/// A context is usable when it carries at least one source-tagged chunk and
/// at least `min_chars` characters.
pub fn is_context_good(context: &RetrievalContext, min_chars: usize) -> bool {
    context.has_source_tag() && context.char_len() >= min_chars
}

#[cfg(test)]
mod tests {
    use super::*;
    use interview_types::ContextChunk;

    const CTX: &str = "[Source: go/parser]\nPackage parser implements a parser for Go source files. \
                       Input may be provided in a variety of forms; the output is an abstract syntax tree.";

    fn kp(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exact_substring_is_grounded() {
        assert!(is_grounded_answer(
            "Package parser implements a parser for Go source files.",
            &kp(&["abstract syntax tree", "parser"]),
            CTX
        ));
    }

    #[test]
    fn empty_expected_never_passes() {
        assert!(!is_grounded_answer("", &[], CTX));
        assert!(!is_grounded_answer("   ", &[], CTX));
    }

    #[test]
    fn near_miss_is_rejected() {
        // Case and whitespace differences are not tolerated.
        assert!(!is_grounded_answer("package parser implements", &[], CTX));
        assert!(!is_grounded_answer("Package  parser", &[], CTX));
    }

    #[test]
    fn one_missing_key_point_fails() {
        assert!(!is_grounded_answer(
            "abstract syntax tree",
            &kp(&["parser", "bytecode"]),
            CTX
        ));
    }

    #[test]
    fn empty_key_points_are_skipped() {
        assert!(is_grounded_answer("abstract syntax tree", &kp(&["", "  "]), CTX));
    }

    #[test]
    fn empty_context_never_grounds() {
        assert!(!is_grounded_answer("x", &[], ""));
    }

    #[test]
    fn quality_gate_needs_tag_and_length() {
        let long = RetrievalContext::from_chunks(vec![ContextChunk::new("u", "x".repeat(250))]);
        assert!(is_context_good(&long, 220));
        // Idempotent: a pure function of its input.
        assert_eq!(is_context_good(&long, 220), is_context_good(&long, 220));

        let short = RetrievalContext::from_chunks(vec![ContextChunk::new("u", "x".repeat(30))]);
        assert!(short.char_len() < 220);
        assert!(!is_context_good(&short, 220));

        assert!(!is_context_good(&RetrievalContext::empty(), 0));
    }

    #[test]
    fn quality_gate_counts_characters() {
        // 212 characters, 412 bytes.
        let ctx = RetrievalContext::from_chunks(vec![ContextChunk::new("u", "я".repeat(200))]);
        assert!(ctx.text().len() > 220);
        assert!(!is_context_good(&ctx, 220));
        assert!(is_context_good(&ctx, 210));
    }
}
