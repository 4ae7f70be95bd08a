//! The shared-packed forest: an arena of OR nodes (one per head and span,
//! holding every way that head matched the span) and AND nodes (one
//! concrete factoring of a rule into child matches). Nodes are interned by
//! content, so identical sub-parses are represented once no matter how many
//! parses reference them, and builder values can be memoised per node.
//!
//! The one thing the flat AND shape cannot hold is a zero-width repetition
//! (a nullable symbol matched again and again under a star or plus without
//! consuming input) -- that is an unbounded family of factorings. The chart
//! represents it as an item that is its own source; assembly turns it into
//! a `PumpCycle` record which pruning later judges: trimmed away, or
//! reported as an infinite parse.

use crate::builder::{apply_builder, Builder, CountingBuilder, ListBuilder, TreeBuilder};
use crate::earley::{Chart, Extension, ItemId, QuantState};
use crate::error::ParseError;
use crate::grammar::{Rule, Symbol};
use crate::tree::{ParseTree, TreeChild};

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

pub(crate) type OrId = usize;
pub(crate) type AndId = usize;
pub(crate) type CycleId = usize;

/// The preference the call site put on a non-terminal. Part of the OR-node
/// interning key: a `prefer_early` call site and a neutral one looking at
/// the same head and span must not share pruning decisions.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub(crate) enum Pref {
    Neutral,
    Early,
    Late,
}

pub(crate) fn pref_of<T>(sym: &Symbol<T>) -> Pref {
    if sym.is_prefer_early() {
        Pref::Early
    } else if sym.is_prefer_late() {
        Pref::Late
    } else {
        Pref::Neutral
    }
}

/// One child position of an AND node.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub(crate) enum Edge {
    /// A terminal consumed this token.
    Token(usize),
    /// A non-terminal matched; the OR node holds every way it did.
    Node(OrId),
    /// An optional symbol matched nothing.
    Skipped,
    /// The occurrences of a star/plus symbol, in order.
    Group(Vec<GroupEdge>),
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub(crate) enum GroupEdge {
    Token(usize),
    Node(OrId),
}

impl Edge {
    /// How many occurrences this edge stands for; what greedy/lazy compare.
    pub(crate) fn match_count(&self) -> usize {
        match self {
            Edge::Skipped => 0,
            Edge::Token(_) | Edge::Node(_) => 1,
            Edge::Group(g) => g.len(),
        }
    }

    pub(crate) fn push_or_children(&self, out: &mut Vec<OrId>) {
        match self {
            Edge::Node(o) => out.push(*o),
            Edge::Group(g) => {
                for ge in g {
                    if let GroupEdge::Node(o) = ge {
                        out.push(*o);
                    }
                }
            }
            Edge::Token(_) | Edge::Skipped => {}
        }
    }
}

pub(crate) struct OrNode {
    pub(crate) head: String,
    pub(crate) start: usize,
    pub(crate) end: usize,
    pub(crate) pref: Pref,
    /// Surviving alternatives, in discovery order. Pruning only ever
    /// shrinks this, never to empty.
    pub(crate) alts: Vec<AndId>,
    /// Cheapest total penalty below this node; filled in by pruning.
    pub(crate) min_penalty: u64,
}

pub(crate) struct AndNode<T> {
    pub(crate) rule: Rc<Rule<T>>,
    pub(crate) start: usize,
    pub(crate) end: usize,
    /// One edge per right-hand-side symbol.
    pub(crate) children: Vec<Edge>,
    /// Pump cycles this factoring participates in.
    pub(crate) cycles: Vec<CycleId>,
}

impl<T> AndNode<T> {
    pub(crate) fn or_children(&self) -> Vec<OrId> {
        let mut out = Vec::new();
        for e in &self.children {
            e.push_or_children(&mut out);
        }
        out
    }
}

/// A zero-width repetition site. `pump` is the nullable OR node that could
/// be matched once more without consuming input; `prefix` holds the
/// OR-edges of each factoring of the looping item, whose cheapest total
/// (plus the rule penalty) is what one more repetition has to not exceed.
pub(crate) struct PumpCycle {
    pub(crate) pump: OrId,
    pub(crate) lazy: bool,
    pub(crate) rule_penalty: u64,
    pub(crate) prefix: Vec<Vec<OrId>>,
    pub(crate) span: (usize, usize),
}

pub(crate) struct Forest<T> {
    pub(crate) ors: Vec<OrNode>,
    pub(crate) ands: Vec<AndNode<T>>,
    pub(crate) cycles: Vec<PumpCycle>,
}

/// A factoring in progress while walking an item's source chain: completed
/// child edges plus the still-open star/plus group, if any.
#[derive(Clone)]
struct Factoring {
    children: Vec<Edge>,
    open: Option<Vec<GroupEdge>>,
    cycles: Vec<CycleId>,
}

struct Assembler<'c, T> {
    chart: &'c Chart<T>,
    forest: Forest<T>,
    or_index: HashMap<(String, usize, usize, Pref), OrId>,
    and_index: HashMap<(usize, usize, Vec<Edge>), AndId>,
    factorings: HashMap<ItemId, Rc<Vec<Factoring>>>,
}

impl<'c, T> Assembler<'c, T> {
    /// Interns the OR node for `(head, start, end, pref)`, building its
    /// alternatives from the completed items of the chart. Inserting the
    /// index before recursing lets cyclic grammars (`s -> s`) close the
    /// loop instead of recursing forever.
    fn or_node(&mut self, head: &str, start: usize, end: usize, pref: Pref) -> OrId {
        let key = (head.to_string(), start, end, pref);
        if let Some(&id) = self.or_index.get(&key) {
            return id;
        }
        let id = self.forest.ors.len();
        self.forest.ors.push(OrNode {
            head: head.to_string(),
            start,
            end,
            pref,
            alts: Vec::new(),
            min_penalty: 0,
        });
        self.or_index.insert(key, id);

        let completed = self
            .chart
            .completed
            .get(&(start, end, head.to_string()))
            .cloned()
            .unwrap_or_default();
        let mut alts: Vec<AndId> = Vec::new();
        for item in completed {
            let rule = self.chart.items[item].rule.clone();
            let fs = self.item_factorings(item);
            for f in fs.iter() {
                debug_assert!(f.open.is_none(), "completed item with an open group");
                let and = self.and_node(&rule, start, end, f.children.clone(), &f.cycles);
                if !alts.contains(&and) {
                    alts.push(and);
                }
            }
        }
        self.forest.ors[id].alts = alts;
        id
    }

    fn and_node(
        &mut self,
        rule: &Rc<Rule<T>>,
        start: usize,
        end: usize,
        children: Vec<Edge>,
        cycles: &[CycleId],
    ) -> AndId {
        let key = (Rc::as_ptr(rule) as usize, start, children);
        if let Some(&id) = self.and_index.get(&key) {
            let known = &mut self.forest.ands[id].cycles;
            for &c in cycles {
                if !known.contains(&c) {
                    known.push(c);
                }
            }
            return id;
        }
        let id = self.forest.ands.len();
        self.forest.ands.push(AndNode {
            rule: rule.clone(),
            start,
            end,
            children: key.2.clone(),
            cycles: cycles.to_vec(),
        });
        self.and_index.insert(key, id);
        id
    }

    /// Every way `item`'s source chain factors into child edges, walked
    /// right to left, deduplicated structurally (two chains often converge
    /// on the same shape once child ambiguity is folded into OR nodes).
    fn item_factorings(&mut self, item: ItemId) -> Rc<Vec<Factoring>> {
        if let Some(fs) = self.factorings.get(&item) {
            return fs.clone();
        }
        let (rule, dot, origin, end, sources) = {
            let it = &self.chart.items[item];
            (
                it.rule.clone(),
                it.dot,
                it.origin,
                it.end,
                it.sources.clone(),
            )
        };

        let mut out: Vec<Factoring> = Vec::new();
        let mut seen: HashMap<(Vec<Edge>, Option<Vec<GroupEdge>>), usize> = HashMap::new();
        let mut pumps: Vec<(OrId, bool)> = Vec::new();

        if sources.is_empty() {
            // A freshly predicted item: the empty prefix.
            out.push(Factoring {
                children: Vec::new(),
                open: None,
                cycles: Vec::new(),
            });
        }

        for (prev_id, ext) in sources {
            if prev_id == item {
                // The item is its own source: a zero-width repetition of
                // the quantified symbol under the dot. Not walkable;
                // recorded for the post-pruning infinite-parse check.
                if let Extension::Child(c) = ext {
                    let (c_head, c_start, c_end) = {
                        let child = &self.chart.items[c];
                        (child.rule.head().to_string(), child.origin, child.end)
                    };
                    debug_assert_eq!(c_start, c_end);
                    let sym = &rule.rhs()[dot];
                    let pref = pref_of(sym);
                    let lazy = sym.is_lazy();
                    let pump = self.or_node(&c_head, c_start, c_end, pref);
                    pumps.push((pump, lazy));
                }
                continue;
            }

            let (prev_dot, prev_quant) = {
                let p = &self.chart.items[prev_id];
                (p.dot, p.quant)
            };
            let prev_fs = self.item_factorings(prev_id);
            for pf in prev_fs.iter() {
                let mut nf = pf.clone();
                if prev_dot == dot {
                    // Another occurrence for the star/plus symbol at `dot`.
                    debug_assert_eq!(prev_quant == QuantState::Inside, pf.open.is_some());
                    let member = self.group_member(&rule, dot, ext);
                    match &mut nf.open {
                        Some(g) => g.push(member),
                        None => nf.open = Some(vec![member]),
                    }
                } else {
                    // The symbol at prev_dot was finished one way or another.
                    debug_assert_eq!(prev_dot + 1, dot);
                    let sym = &rule.rhs()[prev_dot];
                    match ext {
                        Extension::Skip => {
                            if sym.repeat().multiple() {
                                let g = nf.open.take().unwrap_or_default();
                                nf.children.push(Edge::Group(g));
                            } else {
                                nf.children.push(Edge::Skipped);
                            }
                        }
                        Extension::Token(i) => nf.children.push(Edge::Token(i)),
                        Extension::Child(c) => {
                            let (c_head, c_start, c_end) = {
                                let child = &self.chart.items[c];
                                (child.rule.head().to_string(), child.origin, child.end)
                            };
                            let pref = pref_of(sym);
                            let node = self.or_node(&c_head, c_start, c_end, pref);
                            nf.children.push(Edge::Node(node));
                        }
                    }
                }

                let key = (nf.children.clone(), nf.open.clone());
                match seen.get(&key).copied() {
                    Some(pos) => {
                        for c in nf.cycles {
                            if !out[pos].cycles.contains(&c) {
                                out[pos].cycles.push(c);
                            }
                        }
                    }
                    None => {
                        seen.insert(key, out.len());
                        out.push(nf);
                    }
                }
            }
        }

        if !pumps.is_empty() {
            let prefix: Vec<Vec<OrId>> = out
                .iter()
                .map(|f| {
                    let mut os = Vec::new();
                    for e in &f.children {
                        e.push_or_children(&mut os);
                    }
                    if let Some(g) = &f.open {
                        for ge in g {
                            if let GroupEdge::Node(o) = ge {
                                os.push(*o);
                            }
                        }
                    }
                    os
                })
                .collect();
            for (pump, lazy) in pumps {
                let cid = self.forest.cycles.len();
                self.forest.cycles.push(PumpCycle {
                    pump,
                    lazy,
                    rule_penalty: rule.penalty() as u64,
                    prefix: prefix.clone(),
                    span: (origin, end),
                });
                for f in &mut out {
                    f.cycles.push(cid);
                }
            }
        }

        let fs = Rc::new(out);
        self.factorings.insert(item, fs.clone());
        fs
    }

    fn group_member(&mut self, rule: &Rc<Rule<T>>, dot: usize, ext: Extension) -> GroupEdge {
        match ext {
            Extension::Token(i) => GroupEdge::Token(i),
            Extension::Child(c) => {
                let (c_head, c_start, c_end) = {
                    let child = &self.chart.items[c];
                    (child.rule.head().to_string(), child.origin, child.end)
                };
                let pref = pref_of(&rule.rhs()[dot]);
                GroupEdge::Node(self.or_node(&c_head, c_start, c_end, pref))
            }
            Extension::Skip => unreachable!("a skip advances the dot"),
        }
    }
}

/// Builds the forest rooted at `(start, 0, n)` from a finished chart.
pub(crate) fn assemble<T>(chart: &Chart<T>, start: &str, n: usize) -> (Forest<T>, OrId) {
    let mut asm = Assembler {
        chart,
        forest: Forest {
            ors: Vec::new(),
            ands: Vec::new(),
            cycles: Vec::new(),
        },
        or_index: HashMap::new(),
        and_index: HashMap::new(),
        factorings: HashMap::new(),
    };
    let root = asm.or_node(start, 0, n, Pref::Neutral);
    (asm.forest, root)
}

/// Every parse of the input, shared. The chart stays alive behind it: the
/// forest's token references point into it.
pub struct ParseForest<T> {
    pub(crate) chart: Chart<T>,
    pub(crate) forest: Forest<T>,
    pub(crate) root: OrId,
}

impl<T: Clone + fmt::Debug> ParseForest<T> {
    pub(crate) fn new(chart: Chart<T>, forest: Forest<T>, root: OrId) -> Self {
        ParseForest {
            chart,
            forest,
            root,
        }
    }

    /// Folds the forest through `builder`, memoising per node so shared
    /// sub-parses are visited exactly once.
    pub fn apply<B: Builder<T>>(&self, builder: &mut B) -> Result<B::Value, ParseError<T>> {
        apply_builder(self, builder)
    }

    /// The unique parse tree, or `Ambiguous` if pruning left a choice.
    pub fn single(&self) -> Result<ParseTree<T>, ParseError<T>> {
        match self.apply(&mut TreeBuilder)? {
            TreeChild::Tree(tree) => Ok(tree),
            other => unreachable!("a rule folds to a tree, got {:?}", other),
        }
    }

    /// Every parse tree.
    pub fn all(&self) -> Result<Vec<ParseTree<T>>, ParseError<T>> {
        let values = self.apply(&mut ListBuilder::new(TreeBuilder))?;
        Ok(values
            .into_iter()
            .map(|v| match v {
                TreeChild::Tree(tree) => tree,
                other => unreachable!("a rule folds to a tree, got {:?}", other),
            })
            .collect())
    }

    /// Iterator over every parse tree.
    pub fn iter(&self) -> Result<std::vec::IntoIter<ParseTree<T>>, ParseError<T>> {
        Ok(self.all()?.into_iter())
    }

    /// How many parses the forest holds (saturating at `u64::MAX`).
    pub fn count(&self) -> u64 {
        match self.apply(&mut CountingBuilder) {
            Ok(n) => n,
            Err(_) => unreachable!("counting merges every ambiguity"),
        }
    }

    /// Number of nodes in the pruned forest; linear for unambiguous and
    /// boundedly ambiguous grammars even when the parse count is not.
    pub fn node_count(&self) -> usize {
        self.forest.ors.len() + self.forest.ands.len()
    }

    pub fn tokens(&self) -> &[T] {
        &self.chart.tokens
    }
}
