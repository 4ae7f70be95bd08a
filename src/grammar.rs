use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A terminal's capability to accept tokens.
///
/// Either a literal payload compared by equality, or a client-supplied
/// predicate. The label stands in for the payload wherever the matcher has
/// to be shown to a human (rule displays, "expected ..." error messages).
#[derive(Clone)]
pub struct Matcher<T> {
    label: String,
    accept: Rc<dyn Fn(&T) -> bool>,
}

impl<T> Matcher<T> {
    pub fn literal(payload: T) -> Self
    where
        T: PartialEq + Clone + fmt::Debug + 'static,
    {
        let label = format!("{:?}", payload);
        Matcher {
            label,
            accept: Rc::new(move |token| *token == payload),
        }
    }

    pub fn predicate(
        label: impl Into<String>,
        accept: impl Fn(&T) -> bool + 'static,
    ) -> Self {
        Matcher {
            label: label.into(),
            accept: Rc::new(accept),
        }
    }

    pub fn accepts(&self, token: &T) -> bool {
        (self.accept)(token)
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// How often a right-hand-side symbol may match.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Repeat {
    Once,
    Optional,
    Star,
    Plus,
}

impl Repeat {
    pub(crate) fn multiple(self) -> bool {
        matches!(self, Repeat::Star | Repeat::Plus)
    }
}

#[derive(Clone)]
pub(crate) enum SymbolKind<T> {
    Terminal(Matcher<T>),
    NonTerminal {
        head: String,
        prefer_early: bool,
        prefer_late: bool,
    },
}

/// One position of a rule's right-hand side: a terminal or a non-terminal,
/// plus its quantifier and preference flags.
///
/// Invariants, checked at construction: at most one of
/// `optional`/`star`/`plus`; `greedy` and `lazy` are mutually exclusive and
/// require a quantifier; `prefer_early`/`prefer_late` are mutually
/// exclusive and only apply to non-terminals.
#[derive(Clone)]
pub struct Symbol<T> {
    kind: SymbolKind<T>,
    repeat: Repeat,
    greedy: bool,
    lazy: bool,
}

impl<T> Symbol<T> {
    /// A terminal matching tokens equal to `payload`.
    pub fn terminal(payload: T) -> Self
    where
        T: PartialEq + Clone + fmt::Debug + 'static,
    {
        Symbol {
            kind: SymbolKind::Terminal(Matcher::literal(payload)),
            repeat: Repeat::Once,
            greedy: false,
            lazy: false,
        }
    }

    /// A terminal matching whatever `accept` accepts; `label` is used in
    /// rule displays and error messages.
    pub fn terminal_matching(
        label: impl Into<String>,
        accept: impl Fn(&T) -> bool + 'static,
    ) -> Self {
        Symbol {
            kind: SymbolKind::Terminal(Matcher::predicate(label, accept)),
            repeat: Repeat::Once,
            greedy: false,
            lazy: false,
        }
    }

    pub fn nonterminal(head: impl Into<String>) -> Self {
        Symbol {
            kind: SymbolKind::NonTerminal {
                head: head.into(),
                prefer_early: false,
                prefer_late: false,
            },
            repeat: Repeat::Once,
            greedy: false,
            lazy: false,
        }
    }

    fn quantified(mut self, repeat: Repeat) -> Self {
        assert!(
            self.repeat == Repeat::Once,
            "symbol already carries a quantifier"
        );
        self.repeat = repeat;
        self
    }

    pub fn optional(self) -> Self {
        self.quantified(Repeat::Optional)
    }

    pub fn star(self) -> Self {
        self.quantified(Repeat::Star)
    }

    pub fn plus(self) -> Self {
        self.quantified(Repeat::Plus)
    }

    pub fn greedy(mut self) -> Self {
        assert!(!self.lazy, "greedy and lazy are mutually exclusive");
        assert!(
            self.repeat != Repeat::Once,
            "greedy requires optional, star, or plus"
        );
        self.greedy = true;
        self
    }

    pub fn lazy(mut self) -> Self {
        assert!(!self.greedy, "greedy and lazy are mutually exclusive");
        assert!(
            self.repeat != Repeat::Once,
            "lazy requires optional, star, or plus"
        );
        self.lazy = true;
        self
    }

    pub fn prefer_early(mut self) -> Self {
        match &mut self.kind {
            SymbolKind::NonTerminal {
                prefer_early,
                prefer_late,
                ..
            } => {
                assert!(
                    !*prefer_late,
                    "prefer_early and prefer_late are mutually exclusive"
                );
                *prefer_early = true;
            }
            SymbolKind::Terminal(_) => panic!("prefer_early only applies to non-terminals"),
        }
        self
    }

    pub fn prefer_late(mut self) -> Self {
        match &mut self.kind {
            SymbolKind::NonTerminal {
                prefer_early,
                prefer_late,
                ..
            } => {
                assert!(
                    !*prefer_early,
                    "prefer_early and prefer_late are mutually exclusive"
                );
                *prefer_late = true;
            }
            SymbolKind::Terminal(_) => panic!("prefer_late only applies to non-terminals"),
        }
        self
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, SymbolKind::Terminal(_))
    }

    /// The head this symbol calls, if it is a non-terminal.
    pub fn head(&self) -> Option<&str> {
        match &self.kind {
            SymbolKind::NonTerminal { head, .. } => Some(head),
            SymbolKind::Terminal(_) => None,
        }
    }

    pub fn matcher(&self) -> Option<&Matcher<T>> {
        match &self.kind {
            SymbolKind::Terminal(m) => Some(m),
            SymbolKind::NonTerminal { .. } => None,
        }
    }

    pub fn repeat(&self) -> Repeat {
        self.repeat
    }

    pub fn is_greedy(&self) -> bool {
        self.greedy
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    pub fn is_prefer_early(&self) -> bool {
        matches!(
            self.kind,
            SymbolKind::NonTerminal {
                prefer_early: true,
                ..
            }
        )
    }

    pub fn is_prefer_late(&self) -> bool {
        matches!(
            self.kind,
            SymbolKind::NonTerminal {
                prefer_late: true,
                ..
            }
        )
    }
}

/// A single production. Rules are shared as `Rc<Rule<T>>` and compared by
/// identity, never structurally: two textually identical rules added to a
/// `RuleSet` stay distinct alternatives.
pub struct Rule<T> {
    head: String,
    rhs: Vec<Symbol<T>>,
    penalty: u32,
}

impl<T> Rule<T> {
    pub fn new(head: impl Into<String>, rhs: Vec<Symbol<T>>) -> Self {
        Rule {
            head: head.into(),
            rhs,
            penalty: 0,
        }
    }

    pub fn with_penalty(mut self, penalty: u32) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn head(&self) -> &str {
        &self.head
    }

    pub fn rhs(&self) -> &[Symbol<T>] {
        &self.rhs
    }

    pub fn penalty(&self) -> u32 {
        self.penalty
    }
}

/// Rule lookup, overridable so clients can synthesize rules on demand or
/// hide bookkeeping heads from error reports.
pub trait Rules<T> {
    /// All rules for `head`, in priority order: the position in the
    /// returned list is what `prefer_early`/`prefer_late` choose by.
    fn rules_for(&self, head: &str) -> Vec<Rc<Rule<T>>>;

    /// Anonymous heads are expanded into their constituents instead of
    /// being named in `NoParse` error reports.
    fn is_anonymous(&self, _head: &str) -> bool {
        false
    }
}

/// The default `Rules` implementation: rules grouped by head, insertion
/// order preserved.
pub struct RuleSet<T> {
    by_head: HashMap<String, Vec<Rc<Rule<T>>>>,
}

impl<T> RuleSet<T> {
    pub fn new() -> Self {
        RuleSet {
            by_head: HashMap::new(),
        }
    }

    /// Adds a rule and returns the shared handle under which it will appear
    /// in parse trees.
    pub fn add(&mut self, rule: Rule<T>) -> Rc<Rule<T>> {
        let rule = Rc::new(rule);
        self.by_head
            .entry(rule.head().to_string())
            .or_insert(vec![])
            .push(rule.clone());
        rule
    }
}

impl<T> Default for RuleSet<T> {
    fn default() -> Self {
        RuleSet::new()
    }
}

impl<T> Rules<T> for RuleSet<T> {
    fn rules_for(&self, head: &str) -> Vec<Rc<Rule<T>>> {
        self.by_head.get(head).cloned().unwrap_or_default()
    }
}
