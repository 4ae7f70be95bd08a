//! A general context-free parser built on Earley's algorithm, with three
//! extensions the standard textbook chart does not have:
//!
//! * `optional` / `star` / `plus` quantifiers directly on rule symbols,
//!   handled inline by the recognizer (no grammar rewriting, so parse
//!   trees keep one child per written symbol);
//! * ambiguity preferences -- per-rule penalties, `greedy`/`lazy` on
//!   quantifiers, `prefer_early`/`prefer_late` on non-terminal call sites
//!   -- applied in that order as forest pruning;
//! * a shared-packed parse forest folded through a visitor (`Builder`),
//!   so clients can count, enumerate, or evaluate every parse without
//!   materialising each tree.
//!
//! Tokens are opaque: matching is delegated to each terminal's `Matcher`.
//! Lexing is the caller's business.
//!
//! ```
//! use silva::{parse, Rule, RuleSet, Symbol};
//!
//! let mut g = RuleSet::new();
//! g.add(Rule::new("sentence", vec![
//!     Symbol::nonterminal("noun"),
//!     Symbol::terminal("bites"),
//!     Symbol::nonterminal("noun"),
//! ]));
//! g.add(Rule::new("noun", vec![Symbol::terminal("man")]));
//! g.add(Rule::new("noun", vec![Symbol::terminal("dog")]));
//!
//! let forest = parse(&g, "sentence", ["man", "bites", "dog"]).unwrap();
//! let tree = forest.single().unwrap();
//! assert_eq!(
//!     tree.to_string(),
//!     r#"(sentence (noun "man") "bites" (noun "dog"))"#
//! );
//! ```

mod builder;
mod display;
mod earley;
mod error;
mod forest;
mod grammar;
mod prune;
mod tree;

pub use builder::{Builder, Context, CountingBuilder, ListBuilder, TreeBuilder};
pub use earley::parse;
pub use error::ParseError;
pub use forest::ParseForest;
pub use grammar::{Matcher, Repeat, Rule, RuleSet, Rules, Symbol};
pub use tree::{unparse, ParseTree, TreeChild};
