//! The recognizer: a classic Earley chart, with one twist. Quantified
//! symbols (`optional`, `star`, `plus`) are not pre-expanded into helper
//! rules; instead the dot advances through a small per-symbol state machine
//! (`Before` -> `Inside` -> past, where "past" is simply the dot moving on).
//!
//! Items are canonicalized per column so that rediscovering one merges its
//! provenance rather than duplicating work. Completions of zero-width
//! items are kept in a separate per-column table and replayed at
//! prediction time; that is the classic "problem of epsilon" (Aycock &
//! Horspool, "Practical Earley Parsing", have a slicker fix that needs
//! grammar pre-computation, which we deliberately avoid).

use crate::error::ParseError;
use crate::forest::ParseForest;
use crate::grammar::{Repeat, Rule, Rules, Symbol};

use linear_map::LinearMap;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

pub(crate) type ItemId = usize;

/// Head of the synthesized start rule. Never shows up in forests or error
/// reports; it only exists so "any rule for the start head" has a single
/// item to hang provenance off.
const START_HEAD: &str = "\u{27e8}start\u{27e9}";

/// Sub-state of the symbol under the dot.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub(crate) enum QuantState {
    /// The symbol has matched nothing yet.
    Before,
    /// A `star`/`plus` symbol has matched at least once and may match again.
    Inside,
}

/// Why an item exists, paired with the item it was derived from.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub(crate) enum Extension {
    /// Quantifier skipped: an optional matched nothing, or a star/plus
    /// group was closed.
    Skip,
    /// A terminal consumed the token at this index.
    Token(usize),
    /// A completed child item satisfied the non-terminal under the dot.
    Child(ItemId),
}

pub(crate) struct Item<T> {
    pub(crate) rule: Rc<Rule<T>>,
    pub(crate) dot: usize,
    pub(crate) quant: QuantState,
    pub(crate) origin: usize,
    pub(crate) end: usize,
    /// Deduplicated `(previous item, extension)` provenance. Appended to
    /// when a rediscovered item brings a new derivation.
    pub(crate) sources: Vec<(ItemId, Extension)>,
}

impl<T> Item<T> {
    pub(crate) fn is_complete(&self) -> bool {
        self.dot == self.rule.rhs().len()
    }

    pub(crate) fn next_symbol(&self) -> Option<&Symbol<T>> {
        self.rule.rhs().get(self.dot)
    }
}

/// The finished chart: every item ever added, the token vector, and an
/// index of completed items by `(origin, end, head)` for forest assembly.
pub(crate) struct Chart<T> {
    pub(crate) items: Vec<Item<T>>,
    pub(crate) tokens: Vec<T>,
    pub(crate) completed: HashMap<(usize, usize, String), Vec<ItemId>>,
}

type ItemKey = (usize, usize, QuantState, usize);

fn rule_identity<T>(rule: &Rc<Rule<T>>) -> usize {
    Rc::as_ptr(rule) as usize
}

fn can_skip<T>(sym: &Symbol<T>, quant: QuantState) -> bool {
    match sym.repeat() {
        Repeat::Optional | Repeat::Star => true,
        Repeat::Plus => quant == QuantState::Inside,
        Repeat::Once => false,
    }
}

struct Recognizer<'r, T, R: Rules<T> + ?Sized> {
    rules: &'r R,
    gamma: Rc<Rule<T>>,
    items: Vec<Item<T>>,
    tokens: Vec<T>,
    /// Canonical item per key, one map per end column.
    canon: Vec<HashMap<ItemKey, ItemId>>,
    /// Items waiting on a head, per column. A column only ever mentions a
    /// handful of heads, hence the linear maps.
    pending: Vec<LinearMap<String, Vec<ItemId>>>,
    /// Zero-width completed items per column, by head.
    completed_eps: Vec<LinearMap<String, Vec<ItemId>>>,
}

impl<'r, T, R> Recognizer<'r, T, R>
where
    T: Clone + fmt::Debug,
    R: Rules<T> + ?Sized,
{
    /// Adds the item to column `end` unless it is already there, in which
    /// case the new provenance is merged into the canonical item. Returns
    /// the id only for genuinely new items, which the caller enqueues.
    fn add(
        &mut self,
        end: usize,
        rule: Rc<Rule<T>>,
        dot: usize,
        quant: QuantState,
        origin: usize,
        source: Option<(ItemId, Extension)>,
    ) -> Option<ItemId> {
        let key = (rule_identity(&rule), dot, quant, origin);
        if let Some(&id) = self.canon[end].get(&key) {
            if let Some(src) = source {
                let sources = &mut self.items[id].sources;
                if !sources.contains(&src) {
                    sources.push(src);
                }
            }
            return None;
        }
        let id = self.items.len();
        self.items.push(Item {
            rule,
            dot,
            quant,
            origin,
            end,
            sources: source.into_iter().collect(),
        });
        self.canon[end].insert(key, id);
        Some(id)
    }

    /// Advances `prev` over a match of the symbol under its dot. A
    /// `star`/`plus` symbol keeps the dot and moves `Inside`; anything else
    /// moves the dot on.
    fn extend(&mut self, prev: ItemId, ext: Extension, end: usize) -> Option<ItemId> {
        let (rule, dot, origin) = {
            let it = &self.items[prev];
            (it.rule.clone(), it.dot, it.origin)
        };
        let multiple = rule.rhs()[dot].repeat().multiple();
        if multiple {
            self.add(end, rule, dot, QuantState::Inside, origin, Some((prev, ext)))
        } else {
            self.add(end, rule, dot + 1, QuantState::Before, origin, Some((prev, ext)))
        }
    }

    /// Advances `prev` past the symbol under its dot without a match.
    fn skip(&mut self, prev: ItemId, end: usize) -> Option<ItemId> {
        let (rule, dot, origin) = {
            let it = &self.items[prev];
            (it.rule.clone(), it.dot, it.origin)
        };
        self.add(
            end,
            rule,
            dot + 1,
            QuantState::Before,
            origin,
            Some((prev, Extension::Skip)),
        )
    }

    /// Runs predict/scan/complete/skip to fixpoint, column by column.
    fn run(&mut self) -> Result<ItemId, ParseError<T>> {
        let n = self.tokens.len();
        let mut current: Vec<ItemId> = Vec::new();
        let mut next: Vec<ItemId> = Vec::new();
        let mut final_item: Option<ItemId> = None;

        let gamma = self.gamma.clone();
        if let Some(id) = self.add(0, gamma, 0, QuantState::Before, 0, None) {
            current.push(id);
        }

        for index in 0..=n {
            self.pending.push(LinearMap::new());
            self.completed_eps.push(LinearMap::new());
            self.canon.push(HashMap::new());
            let token = self.tokens.get(index).cloned();
            let mut terminal_items: Vec<ItemId> = Vec::new();

            while let Some(id) = current.pop() {
                let (rule, dot, quant, origin) = {
                    let it = &self.items[id];
                    (it.rule.clone(), it.dot, it.quant, it.origin)
                };
                if dot == rule.rhs().len() {
                    // Completion.
                    if index == n && Rc::ptr_eq(&rule, &self.gamma) && origin == 0 {
                        final_item = Some(id);
                    }
                    let head = rule.head().to_string();
                    let waiters = self.pending[origin].get(&head).cloned().unwrap_or_default();
                    for w in waiters {
                        if let Some(new_id) = self.extend(w, Extension::Child(id), index) {
                            current.push(new_id);
                        }
                    }
                    if origin == index {
                        self.completed_eps[index]
                            .entry(head)
                            .or_insert(vec![])
                            .push(id);
                    }
                } else {
                    let sym = rule.rhs()[dot].clone();
                    match sym.head() {
                        Some(h) => {
                            // Prediction. The item registers as pending on
                            // the head, every rule for the head is seeded,
                            // and zero-width completions already made at
                            // this column are replayed against the item.
                            let h = h.to_string();
                            self.pending[index]
                                .entry(h.clone())
                                .or_insert(vec![])
                                .push(id);
                            for r in self.rules.rules_for(&h) {
                                if let Some(new_id) =
                                    self.add(index, r, 0, QuantState::Before, index, None)
                                {
                                    current.push(new_id);
                                }
                            }
                            let eps =
                                self.completed_eps[index].get(&h).cloned().unwrap_or_default();
                            for c in eps {
                                if let Some(new_id) =
                                    self.extend(id, Extension::Child(c), index)
                                {
                                    current.push(new_id);
                                }
                            }
                        }
                        None => {
                            // Scanning.
                            if let Some(tok) = &token {
                                let hit = sym.matcher().map_or(false, |m| m.accepts(tok));
                                if hit {
                                    if let Some(new_id) =
                                        self.extend(id, Extension::Token(index), index + 1)
                                    {
                                        next.push(new_id);
                                    }
                                }
                            }
                            terminal_items.push(id);
                        }
                    }
                    // Skipping.
                    if can_skip(&sym, quant) {
                        if let Some(new_id) = self.skip(id, index) {
                            current.push(new_id);
                        }
                    }
                }
            }

            std::mem::swap(&mut current, &mut next);
            if current.is_empty() && final_item.is_none() {
                return Err(self.no_parse(index, token, &terminal_items));
            }
        }

        // The loop either found the completed start item at the final
        // column or bailed out with NoParse above.
        match final_item {
            Some(id) => Ok(id),
            None => unreachable!("empty worklist without a final item reports NoParse"),
        }
    }

    /// Localizes a dead parse: which token stopped us, which terminals were
    /// tried against it, and a head-level summary of what was expected.
    ///
    /// The summary walks rule-initial items up through the items that
    /// predicted them, then expands anonymous heads (and the internal start
    /// rule) back into their constituents, so clients see `<expr>` rather
    /// than the first terminal of every expr rule.
    fn no_parse(
        &self,
        index: usize,
        token: Option<T>,
        terminal_items: &[ItemId],
    ) -> ParseError<T> {
        let mut open: Vec<ItemId> = terminal_items.to_vec();
        let mut visited: HashSet<ItemId> = HashSet::new();
        let mut children: HashMap<ItemId, Vec<ItemId>> = HashMap::new();
        let mut exits: Vec<ItemId> = Vec::new();

        while let Some(id) = open.pop() {
            if !visited.insert(id) {
                continue;
            }
            let it = &self.items[id];
            if Rc::ptr_eq(&it.rule, &self.gamma) {
                exits.push(id);
            } else if it.dot == 0 && it.quant == QuantState::Before {
                let head = it.rule.head().to_string();
                let parents = self.pending[index].get(&head).cloned().unwrap_or_default();
                for p in parents {
                    children.entry(p).or_insert(vec![]).push(id);
                    open.push(p);
                }
            } else {
                exits.push(id);
            }
        }

        let mut expanded: HashSet<ItemId> = HashSet::new();
        let mut keep: Vec<ItemId> = Vec::new();
        while let Some(id) = exits.pop() {
            if !expanded.insert(id) {
                continue;
            }
            let it = &self.items[id];
            let sym = match it.next_symbol() {
                Some(sym) => sym,
                None => continue,
            };
            let expand = match sym.head() {
                Some(h) => self.rules.is_anonymous(h) || Rc::ptr_eq(&it.rule, &self.gamma),
                None => false,
            };
            if expand {
                if let Some(cs) = children.get(&id) {
                    exits.extend(cs.iter().copied());
                }
            } else {
                keep.push(id);
            }
        }

        let next_symbol = |id: &ItemId| -> Option<Symbol<T>> {
            self.items[*id].next_symbol().cloned()
        };
        let expected_terminals: Vec<Symbol<T>> =
            terminal_items.iter().filter_map(next_symbol).collect();
        let expected: Vec<Symbol<T>> = keep.iter().filter_map(next_symbol).collect();

        let mut names: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
        names.sort();
        names.dedup();
        let encountered = match &token {
            Some(t) => format!("{:?}", t),
            None => "end of input".to_string(),
        };
        let message = format!(
            "Unexpected {}, was expecting {}.",
            encountered,
            names.join(", ")
        );
        ParseError::NoParse {
            message,
            start_index: index,
            end_index: index,
            encountered: token,
            expected_terminals,
            expected,
        }
    }
}

/// Parses `tokens` against the grammar in `rules`, matching the
/// non-terminal `start`. Returns the shared forest of every parse, or the
/// classified failure.
pub fn parse<T, R>(
    rules: &R,
    start: &str,
    tokens: impl IntoIterator<Item = T>,
) -> Result<ParseForest<T>, ParseError<T>>
where
    T: Clone + fmt::Debug,
    R: Rules<T> + ?Sized,
{
    let tokens: Vec<T> = tokens.into_iter().collect();
    let n = tokens.len();
    let gamma = Rc::new(Rule::new(START_HEAD, vec![Symbol::nonterminal(start)]));

    let mut rec = Recognizer {
        rules,
        gamma: gamma.clone(),
        items: Vec::new(),
        tokens,
        canon: vec![HashMap::new()],
        pending: Vec::new(),
        completed_eps: Vec::new(),
    };
    rec.run()?;

    let mut completed: HashMap<(usize, usize, String), Vec<ItemId>> = HashMap::new();
    for (id, it) in rec.items.iter().enumerate() {
        if it.is_complete() && !Rc::ptr_eq(&it.rule, &gamma) {
            completed
                .entry((it.origin, it.end, it.rule.head().to_string()))
                .or_insert(vec![])
                .push(id);
        }
    }
    let chart = Chart {
        items: rec.items,
        tokens: rec.tokens,
        completed,
    };

    let (mut forest, root) = crate::forest::assemble(&chart, start, n);
    crate::prune::prune(&mut forest, root, rules)?;
    Ok(ParseForest::new(chart, forest, root))
}
