use super::*;

use expect_test::expect;

#[test]
fn single_word() {
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![t("a")]));
    assert_roundtrip(&g, "top", "a");
}

#[test]
fn alternatives() {
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![t("a")]));
    g.add(Rule::new("top", vec![t("b")]));
    assert_roundtrip(&g, "top", "a");
    assert_roundtrip(&g, "top", "b");
}

#[test]
fn identical_rules_are_distinct_alternatives() {
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![t("a")]));
    g.add(Rule::new("top", vec![t("a")]));
    assert_ambiguous(&g, "top", "a");
}

#[test]
fn man_bites_dog() {
    let g = sentence_grammar();
    expect![[r#"(sentence (noun "man") (verb "bites") (noun "dog"))"#]]
        .assert_eq(&single_str(&g, "sentence", "man bites dog"));
    assert_roundtrip(&g, "sentence", "dog bites man");
}

#[test]
fn optional_symbol() {
    let mut g = RuleSet::new();
    g.add(Rule::new("relative", vec![t("step").optional(), t("sister")]));
    expect![[r#"(relative None "sister")"#]].assert_eq(&single_str(&g, "relative", "sister"));
    expect![[r#"(relative "step" "sister")"#]]
        .assert_eq(&single_str(&g, "relative", "step sister"));
}

#[test]
fn star_symbol() {
    let mut g = RuleSet::new();
    g.add(Rule::new("relative", vec![t("great").star(), t("grandfather")]));
    expect![[r#"(relative () "grandfather")"#]]
        .assert_eq(&single_str(&g, "relative", "grandfather"));
    expect![[r#"(relative ("great", "great") "grandfather")"#]]
        .assert_eq(&single_str(&g, "relative", "great great grandfather"));
}

#[test]
fn plus_symbol() {
    let mut g = RuleSet::new();
    g.add(Rule::new("relative", vec![t("great").plus(), t("grandfather")]));
    expect![[r#"(relative ("great") "grandfather")"#]]
        .assert_eq(&single_str(&g, "relative", "great grandfather"));
    assert!(parse(&g, "relative", lex("grandfather")).is_err());
}

#[test]
fn nonterminal_star_groups_subtrees() {
    let mut g = RuleSet::new();
    g.add(Rule::new("list", vec![nt("word").star()]));
    g.add(Rule::new("word", vec![t("a")]));
    g.add(Rule::new("word", vec![t("b")]));
    expect![[r#"(list ((word "a"), (word "b"), (word "a")))"#]]
        .assert_eq(&single_str(&g, "list", "a b a"));
}

#[test]
fn empty_rule() {
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![]));
    expect![[r#"(top)"#]].assert_eq(&single_str(&g, "top", ""));
}

#[test]
fn optional_matches_empty_input() {
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![t("a").optional()]));
    expect![[r#"(top None)"#]].assert_eq(&single_str(&g, "top", ""));
}

#[test]
fn classic_binary_ambiguity() {
    // top -> "a" | top top over "a a a": the two bracketings.
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![t("a")]));
    g.add(Rule::new("top", vec![nt("top"), nt("top")]));
    assert_eq!(
        all_strs(&g, "top", "a a a"),
        vec![
            r#"(top (top "a") (top (top "a") (top "a")))"#,
            r#"(top (top (top "a") (top "a")) (top "a"))"#,
        ]
    );
}

#[test]
fn classic_ternary_ambiguity() {
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![t("a")]));
    g.add(Rule::new("top", vec![nt("top"), nt("top")]));
    g.add(Rule::new("top", vec![nt("top"), nt("top"), nt("top")]));
    assert_eq!(
        all_strs(&g, "top", "a a a"),
        vec![
            r#"(top (top "a") (top "a") (top "a"))"#,
            r#"(top (top "a") (top (top "a") (top "a")))"#,
            r#"(top (top (top "a") (top "a")) (top "a"))"#,
        ]
    );
}

#[test]
fn diamond() {
    // Two routes to the same sub-parse; both must come out.
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![nt("a")]));
    g.add(Rule::new("top", vec![nt("b")]));
    g.add(Rule::new("a", vec![nt("c")]));
    g.add(Rule::new("b", vec![nt("c")]));
    g.add(Rule::new("c", vec![t("a")]));
    assert_eq!(
        all_strs(&g, "top", "a"),
        vec![r#"(top (a (c "a")))"#, r#"(top (b (c "a")))"#]
    );
}

#[test]
fn diamond_through_empty_rule() {
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![nt("a"), t("a")]));
    g.add(Rule::new("top", vec![nt("b"), t("a")]));
    g.add(Rule::new("a", vec![nt("c")]));
    g.add(Rule::new("b", vec![nt("c")]));
    g.add(Rule::new("c", vec![]));
    assert_eq!(
        all_strs(&g, "top", "a"),
        vec![r#"(top (a (c)) "a")"#, r#"(top (b (c)) "a")"#]
    );
}

#[test]
fn predicate_terminal() {
    let digits = || {
        Symbol::terminal_matching("number", |tok: &String| {
            !tok.is_empty() && tok.chars().all(|c| c.is_ascii_digit())
        })
    };
    let mut g = RuleSet::new();
    g.add(Rule::new("expr", vec![digits().plus()]));
    expect![[r#"(expr ("1", "23", "4"))"#]].assert_eq(&single_str(&g, "expr", "1 23 4"));
    assert!(parse(&g, "expr", lex("1 x")).is_err());
}

#[test]
fn soundness_every_tree_unparses_to_the_input() {
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![t("a")]));
    g.add(Rule::new("top", vec![nt("top"), nt("top")]));
    let tokens = lex("a a a a");
    let forest = parse(&g, "top", tokens.clone()).unwrap();
    let trees = forest.all().unwrap();
    assert_eq!(trees.len(), 5);
    for tree in &trees {
        assert_eq!(unparse(tree), tokens);
    }
}

#[test]
fn iter_yields_the_same_trees_as_all() {
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![t("a")]));
    g.add(Rule::new("top", vec![nt("top"), nt("top")]));
    let forest = parse(&g, "top", lex("a a")).unwrap();
    let from_iter: Vec<String> = forest.iter().unwrap().map(|t| t.to_string()).collect();
    let from_all: Vec<String> = forest.all().unwrap().iter().map(|t| t.to_string()).collect();
    assert_eq!(from_iter, from_all);
}

#[test]
fn adding_a_rule_never_removes_parses() {
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![t("a"), t("b")]));
    let before = all_strs(&g, "top", "a b");
    g.add(Rule::new("top", vec![t("a"), t("c")]));
    g.add(Rule::new("top", vec![nt("top")]).with_penalty(1));
    let after = all_strs(&g, "top", "a b");
    for tree in &before {
        assert!(after.contains(tree), "lost parse {}", tree);
    }
}

#[test]
fn left_recursive_chain_counts_once() {
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![nt("top"), t("a")]));
    g.add(Rule::new("top", vec![]));
    let n = 300;
    let forest = parse(&g, "top", vec!["a".to_string(); n]).unwrap();
    assert_eq!(forest.count(), 1);
    assert!(forest.node_count() <= 4 * n + 4);
}

#[test]
fn right_recursive_chain_counts_once() {
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![t("a"), nt("top")]));
    g.add(Rule::new("top", vec![]));
    let n = 300;
    let forest = parse(&g, "top", vec!["a".to_string(); n]).unwrap();
    assert_eq!(forest.count(), 1);
    assert!(forest.node_count() <= 4 * n + 4);
}

#[test]
fn exponential_ambiguity_in_a_linear_forest() {
    // Two identical word rules: 2^n parses, counted without enumerating.
    let mut g = RuleSet::new();
    g.add(Rule::new("top", vec![nt("a").star()]));
    g.add(Rule::new("a", vec![t("a")]));
    g.add(Rule::new("a", vec![t("a")]));
    let n = 60;
    let forest = parse(&g, "top", vec!["a".to_string(); n]).unwrap();
    assert_eq!(forest.count(), 1u64 << n);
    assert!(forest.node_count() <= 6 * n + 6);
}

#[test]
fn tokens_are_kept_on_the_forest() {
    let g = sentence_grammar();
    let forest = parse(&g, "sentence", lex("man bites dog")).unwrap();
    assert_eq!(forest.tokens(), lex("man bites dog").as_slice());
}
