use super::*;

use crate::{ParseError, Rules};

use expect_test::expect;
use std::rc::Rc;

fn no_parse(g: &impl Rules<String>, head: &str, input: &str) -> ParseError<String> {
    match parse(g, head, lex(input)) {
        Err(e @ ParseError::NoParse { .. }) => e,
        Err(other) => panic!("expected NoParse, got {}", other),
        Ok(_) => panic!("expected NoParse, but the input parsed"),
    }
}

fn debug_set(symbols: &[Symbol<String>]) -> Vec<String> {
    let mut out: Vec<String> = symbols.iter().map(|s| format!("{:?}", s)).collect();
    out.sort();
    out.dedup();
    out
}

#[test]
fn failure_is_localised_to_the_offending_token() {
    let mut g = RuleSet::new();
    g.add(Rule::new("s", vec![t("a"), t("b")]));
    let e = no_parse(&g, "s", "a c");
    match &e {
        ParseError::NoParse {
            start_index,
            end_index,
            encountered,
            expected_terminals,
            expected,
            ..
        } => {
            assert_eq!((*start_index, *end_index), (1, 1));
            assert_eq!(encountered.as_deref(), Some("c"));
            assert_eq!(debug_set(expected_terminals), vec![r#"Terminal("b")"#]);
            assert_eq!(debug_set(expected), vec![r#"Terminal("b")"#]);
        }
        _ => unreachable!(),
    }
    expect![[r#"Unexpected "c", was expecting "b"."#]].assert_eq(e.message());
}

#[test]
fn empty_input_reports_no_token() {
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![nt("a")]));
    g.add(Rule::new("a", vec![t("a")]));
    let e = no_parse(&g, "top", "");
    match &e {
        ParseError::NoParse {
            start_index,
            end_index,
            encountered,
            expected_terminals,
            expected,
            ..
        } => {
            assert_eq!((*start_index, *end_index), (0, 0));
            assert!(encountered.is_none());
            assert_eq!(debug_set(expected_terminals), vec![r#"Terminal("a")"#]);
            // The terminal opens rule <a>, so the head is reported instead.
            assert_eq!(debug_set(expected), vec![r#"NonTerminal("a")"#]);
        }
        _ => unreachable!(),
    }
    expect![[r#"Unexpected end of input, was expecting <a>."#]].assert_eq(e.message());
}

#[test]
fn skippable_first_symbol_widens_the_expectation() {
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![nt("a").optional(), nt("b")]));
    g.add(Rule::new("a", vec![t("a")]));
    g.add(Rule::new("b", vec![t("b")]));
    let e = no_parse(&g, "top", "c");
    match &e {
        ParseError::NoParse {
            expected_terminals,
            expected,
            ..
        } => {
            assert_eq!(
                debug_set(expected_terminals),
                vec![r#"Terminal("a")"#, r#"Terminal("b")"#]
            );
            assert_eq!(
                debug_set(expected),
                vec![r#"NonTerminal("a")"#, r#"NonTerminal("b")"#]
            );
        }
        _ => unreachable!(),
    }
}

/// Heads starting with an underscore are bookkeeping; error reports name
/// their contents instead.
struct Underscored(RuleSet<String>);

impl Rules<String> for Underscored {
    fn rules_for(&self, head: &str) -> Vec<Rc<Rule<String>>> {
        self.0.rules_for(head)
    }

    fn is_anonymous(&self, head: &str) -> bool {
        head.starts_with('_')
    }
}

#[test]
fn anonymous_heads_expand_in_expectations() {
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![nt("_letter")]));
    g.add(Rule::new("_letter", vec![t("a")]));
    g.add(Rule::new("_letter", vec![t("b")]));

    let e = no_parse(&Underscored(g), "top", "c");
    match &e {
        ParseError::NoParse { expected, .. } => {
            assert_eq!(
                debug_set(expected),
                vec![r#"Terminal("a")"#, r#"Terminal("b")"#]
            );
        }
        _ => unreachable!(),
    }

    // Without the anonymity override the head itself is reported.
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![nt("_letter")]));
    g.add(Rule::new("_letter", vec![t("a")]));
    g.add(Rule::new("_letter", vec![t("b")]));
    let e = no_parse(&g, "top", "c");
    match &e {
        ParseError::NoParse { expected, .. } => {
            assert_eq!(debug_set(expected), vec![r#"NonTerminal("_letter")"#]);
        }
        _ => unreachable!(),
    }
}

#[test]
fn ambiguity_reports_the_span_and_alternatives() {
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![t("a")]));
    g.add(Rule::new("top", vec![nt("top"), nt("top")]));
    let forest = parse(&g, "top", lex("a a a")).unwrap();
    match forest.single() {
        Err(ParseError::Ambiguous {
            start_index,
            end_index,
            alternatives,
            ..
        }) => {
            assert_eq!((start_index, end_index), (0, 3));
            assert_eq!(alternatives.len(), 2);
        }
        other => panic!("expected Ambiguous, got {:?}", other),
    }
}

#[test]
fn self_loop_is_infinite() {
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![t("a")]));
    g.add(Rule::new("top", vec![nt("top")]));
    assert_infinite(&g, "top", "a");
}

#[test]
fn longer_loop_is_infinite() {
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![t("a")]));
    g.add(Rule::new("top", vec![nt("b")]));
    g.add(Rule::new("b", vec![nt("top")]));
    assert_infinite(&g, "top", "a");
}

#[test]
fn symmetric_loops_are_infinite() {
    // No single edge removal makes this finite.
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![nt("b")]));
    g.add(Rule::new("top", vec![nt("b")]));
    g.add(Rule::new("c", vec![nt("b")]));
    g.add(Rule::new("b", vec![nt("c")]));
    g.add(Rule::new("b", vec![t("a")]));
    g.add(Rule::new("c", vec![t("a")]));
    assert_infinite(&g, "top", "a");
}

#[test]
fn star_over_a_nullable_rule_is_infinite() {
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![nt("a").star()]));
    g.add(Rule::new("a", vec![t("a")]));
    g.add(Rule::new("a", vec![]));
    assert_infinite(&g, "top", "a");
}

#[test]
fn penalty_can_cut_a_loop() {
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![t("a")]));
    g.add(Rule::new("top", vec![nt("b")]).with_penalty(1));
    g.add(Rule::new("b", vec![nt("top")]));
    assert_roundtrip(&g, "top", "a");
}

#[test]
fn penalty_on_the_exit_keeps_the_loop() {
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![t("a")]).with_penalty(1));
    g.add(Rule::new("top", vec![nt("b")]));
    g.add(Rule::new("b", vec![nt("top")]));
    assert_infinite(&g, "top", "a");
}

#[test]
fn prefer_early_can_cut_a_loop() {
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![t("a")]));
    g.add(Rule::new("top", vec![nt("b")]));
    g.add(Rule::new("b", vec![nt("top").prefer_early()]));
    assert_eq!(
        all_strs(&g, "top", "a"),
        vec![r#"(top "a")"#, r#"(top (b (top "a")))"#]
    );
}

#[test]
fn prefer_late_towards_the_loop_stays_infinite() {
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![t("a")]));
    g.add(Rule::new("top", vec![nt("b")]));
    g.add(Rule::new("b", vec![nt("top").prefer_late()]));
    assert_infinite(&g, "top", "a");
}

#[test]
fn penalised_zero_width_repetition_is_trimmed_under_star() {
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![nt("x").star(), t("w")]));
    g.add(Rule::new("x", vec![]).with_penalty(1));
    expect![[r#"(top () "w")"#]].assert_eq(&single_str(&g, "top", "w"));
}

#[test]
fn penalised_nullable_alternative_does_not_pump() {
    // The nullable a-rule costs 2, so repeating it zero-width can never
    // tie the chosen parse; the star stays finite.
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![nt("a").star()]));
    g.add(Rule::new("a", vec![t("a")]));
    g.add(Rule::new("a", vec![]).with_penalty(2));
    expect![[r#"(top ((a "a")))"#]].assert_eq(&single_str(&g, "top", "a"));
}

#[test]
fn penalised_zero_width_repetition_under_plus_is_infinite() {
    // plus must take the nullable once; a second zero-width round costs no
    // more than the first, so the repetition never bottoms out.
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![nt("x").plus(), t("w")]));
    g.add(Rule::new("x", vec![]).with_penalty(1));
    assert_infinite(&g, "top", "w");
}

#[test]
fn lazy_star_over_a_nullable_rule_is_finite() {
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![nt("x").star().lazy(), t("w")]));
    g.add(Rule::new("x", vec![]));
    expect![[r#"(top () "w")"#]].assert_eq(&single_str(&g, "top", "w"));
}

#[test]
fn greedy_star_over_a_nullable_rule_is_infinite() {
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![nt("x").star().greedy(), t("w")]));
    g.add(Rule::new("x", vec![]));
    assert_infinite(&g, "top", "w");
}

#[test]
fn errors_carry_their_span_accessors() {
    let mut g = RuleSet::new();
    g.add(Rule::new("s", vec![t("a"), t("b")]));
    let e = no_parse(&g, "s", "a c");
    assert_eq!(e.start_index(), 1);
    assert_eq!(e.end_index(), 1);
    assert!(!e.message().is_empty());
}
