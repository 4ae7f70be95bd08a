//! The visitor ("builder") protocol: clients fold the forest into their
//! own values without ever materialising every tree. The dispatcher
//! memoises per forest node, so a shared sub-parse fires its callbacks
//! once no matter how many parses reference it; builders get owned values
//! and hand back fresh ones, and the dispatcher clones memoised values at
//! every reuse site.

use crate::error::ParseError;
use crate::forest::{Edge, GroupEdge, OrId, ParseForest};
use crate::grammar::Rule;
use crate::tree::{ParseTree, TreeChild};

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Where a callback is firing: the rule being folded (absent exactly for
/// `merge_vertical`, whose alternatives come from different rules), the
/// symbol position within it, and the token span involved.
pub struct Context<'a, T> {
    pub rule: Option<&'a Rc<Rule<T>>>,
    pub symbol_index: usize,
    pub start_index: usize,
    pub end_index: usize,
}

fn ctx_at<'a, T>(
    rule: &'a Rc<Rule<T>>,
    symbol_index: usize,
    start_index: usize,
    end_index: usize,
) -> Context<'a, T> {
    Context {
        rule: Some(rule),
        symbol_index,
        start_index,
        end_index,
    }
}

/// Folds parses into values of type `Value`.
///
/// Per rule the dispatcher calls `start_rule`, then per symbol position:
/// `terminal` + `extend` for a matched terminal, a recursive descent +
/// `extend` for a matched non-terminal, `skip_optional` for an optional
/// that matched nothing, and `begin_multiple`, one descent + `extend` per
/// occurrence, `end_multiple` for a star/plus. `merge_horizontal` combines
/// different factorings of one rule, `merge_vertical` different rules for
/// one head; both default to `merge`, which refuses and reports ambiguity.
/// `end_rule` closes a rule's fold and defaults to identity.
pub trait Builder<T> {
    type Value: Clone + fmt::Debug;

    fn start_rule(&mut self, context: &Context<T>) -> Result<Self::Value, ParseError<T>>;

    fn end_rule(
        &mut self,
        _context: &Context<T>,
        prev: Self::Value,
    ) -> Result<Self::Value, ParseError<T>> {
        Ok(prev)
    }

    fn terminal(&mut self, context: &Context<T>, token: &T)
        -> Result<Self::Value, ParseError<T>>;

    fn skip_optional(
        &mut self,
        context: &Context<T>,
        prev: Self::Value,
    ) -> Result<Self::Value, ParseError<T>>;

    fn begin_multiple(
        &mut self,
        context: &Context<T>,
        prev: Self::Value,
    ) -> Result<Self::Value, ParseError<T>>;

    fn end_multiple(
        &mut self,
        context: &Context<T>,
        prev: Self::Value,
    ) -> Result<Self::Value, ParseError<T>>;

    fn extend(
        &mut self,
        context: &Context<T>,
        prev: Self::Value,
        extension: Self::Value,
    ) -> Result<Self::Value, ParseError<T>>;

    fn merge(
        &mut self,
        context: &Context<T>,
        values: Vec<Self::Value>,
    ) -> Result<Self::Value, ParseError<T>> {
        let alternatives = values.iter().map(|v| format!("{:?}", v)).collect();
        Err(ParseError::ambiguous(
            context.start_index,
            context.end_index,
            alternatives,
        ))
    }

    fn merge_vertical(
        &mut self,
        context: &Context<T>,
        values: Vec<Self::Value>,
    ) -> Result<Self::Value, ParseError<T>> {
        self.merge(context, values)
    }

    fn merge_horizontal(
        &mut self,
        context: &Context<T>,
        values: Vec<Self::Value>,
    ) -> Result<Self::Value, ParseError<T>> {
        self.merge(context, values)
    }
}

pub(crate) fn apply_builder<T, B>(
    forest: &ParseForest<T>,
    builder: &mut B,
) -> Result<B::Value, ParseError<T>>
where
    T: Clone + fmt::Debug,
    B: Builder<T>,
{
    let mut walk = Walk {
        forest,
        or_memo: HashMap::new(),
        and_memo: HashMap::new(),
    };
    walk.or_value(forest.root, builder)
}

struct Walk<'f, T, V> {
    forest: &'f ParseForest<T>,
    or_memo: HashMap<OrId, V>,
    and_memo: HashMap<usize, V>,
}

impl<'f, T, V> Walk<'f, T, V>
where
    T: Clone + fmt::Debug,
    V: Clone + fmt::Debug,
{
    fn or_value<B>(&mut self, or: OrId, builder: &mut B) -> Result<V, ParseError<T>>
    where
        B: Builder<T, Value = V>,
    {
        if let Some(v) = self.or_memo.get(&or) {
            return Ok(v.clone());
        }
        let (start, end, alts) = {
            let node = &self.forest.forest.ors[or];
            (node.start, node.end, node.alts.clone())
        };

        // Alternatives grouped by rule, first-seen order: factorings of one
        // rule merge horizontally, different rules merge vertically.
        let mut groups: Vec<(Rc<Rule<T>>, Vec<usize>)> = Vec::new();
        for a in alts {
            let rule = self.forest.forest.ands[a].rule.clone();
            match groups.iter_mut().find(|(r, _)| Rc::ptr_eq(r, &rule)) {
                Some((_, g)) => g.push(a),
                None => groups.push((rule, vec![a])),
            }
        }

        let mut group_values: Vec<V> = Vec::new();
        for (rule, ands) in groups {
            let mut values = Vec::with_capacity(ands.len());
            for a in ands {
                values.push(self.and_value(a, builder)?);
            }
            let context = ctx_at(&rule, rule.rhs().len(), start, end);
            let mut value = if values.len() > 1 {
                builder.merge_horizontal(&context, values)?
            } else {
                values.pop().unwrap()
            };
            value = builder.end_rule(&context, value)?;
            group_values.push(value);
        }

        let value = if group_values.len() > 1 {
            let context = Context {
                rule: None,
                symbol_index: 0,
                start_index: start,
                end_index: end,
            };
            builder.merge_vertical(&context, group_values)?
        } else {
            group_values.pop().unwrap()
        };
        self.or_memo.insert(or, value.clone());
        Ok(value)
    }

    fn and_value<B>(&mut self, and: usize, builder: &mut B) -> Result<V, ParseError<T>>
    where
        B: Builder<T, Value = V>,
    {
        if let Some(v) = self.and_memo.get(&and) {
            return Ok(v.clone());
        }
        let (rule, start, children) = {
            let node = &self.forest.forest.ands[and];
            (node.rule.clone(), node.start, node.children.clone())
        };

        let mut value = builder.start_rule(&ctx_at(&rule, 0, start, start))?;
        let mut pos = start;
        for (k, edge) in children.iter().enumerate() {
            match edge {
                Edge::Token(i) => {
                    let token = &self.forest.chart.tokens[*i];
                    let tv = builder.terminal(&ctx_at(&rule, k, *i, *i + 1), token)?;
                    value = builder.extend(&ctx_at(&rule, k, start, pos), value, tv)?;
                    pos = *i + 1;
                }
                Edge::Node(o) => {
                    let child_end = self.forest.forest.ors[*o].end;
                    let cv = self.or_value(*o, builder)?;
                    value = builder.extend(&ctx_at(&rule, k, start, pos), value, cv)?;
                    pos = child_end;
                }
                Edge::Skipped => {
                    value = builder.skip_optional(&ctx_at(&rule, k, start, pos), value)?;
                }
                Edge::Group(members) => {
                    value = builder.begin_multiple(&ctx_at(&rule, k, start, pos), value)?;
                    for member in members {
                        let mv = match member {
                            GroupEdge::Token(i) => {
                                let token = &self.forest.chart.tokens[*i];
                                builder.terminal(&ctx_at(&rule, k, *i, *i + 1), token)?
                            }
                            GroupEdge::Node(o) => self.or_value(*o, builder)?,
                        };
                        value = builder.extend(&ctx_at(&rule, k, start, pos), value, mv)?;
                        pos = match member {
                            GroupEdge::Token(i) => *i + 1,
                            GroupEdge::Node(o) => self.forest.forest.ors[*o].end,
                        };
                    }
                    value = builder.end_multiple(&ctx_at(&rule, k, start, pos), value)?;
                }
            }
        }
        debug_assert_eq!(pos, self.forest.forest.ands[and].end);
        self.and_memo.insert(and, value.clone());
        Ok(value)
    }
}

/// Counts parses: one per leaf, product along a rule, sum across
/// alternatives. Saturates instead of overflowing.
pub struct CountingBuilder;

impl<T> Builder<T> for CountingBuilder {
    type Value = u64;

    fn start_rule(&mut self, _context: &Context<T>) -> Result<u64, ParseError<T>> {
        Ok(1)
    }

    fn terminal(&mut self, _context: &Context<T>, _token: &T) -> Result<u64, ParseError<T>> {
        Ok(1)
    }

    fn skip_optional(&mut self, _context: &Context<T>, prev: u64) -> Result<u64, ParseError<T>> {
        Ok(prev)
    }

    fn begin_multiple(&mut self, _context: &Context<T>, prev: u64) -> Result<u64, ParseError<T>> {
        Ok(prev)
    }

    fn end_multiple(&mut self, _context: &Context<T>, prev: u64) -> Result<u64, ParseError<T>> {
        Ok(prev)
    }

    fn extend(
        &mut self,
        _context: &Context<T>,
        prev: u64,
        extension: u64,
    ) -> Result<u64, ParseError<T>> {
        Ok(prev.saturating_mul(extension))
    }

    fn merge(&mut self, _context: &Context<T>, values: Vec<u64>) -> Result<u64, ParseError<T>> {
        Ok(values.into_iter().fold(0, u64::saturating_add))
    }
}

/// Builds the default `ParseTree`. Any ambiguity that survives pruning
/// falls into the default `merge` and comes back as `Ambiguous`.
pub struct TreeBuilder;

impl<T: Clone + fmt::Debug> Builder<T> for TreeBuilder {
    type Value = TreeChild<T>;

    fn start_rule(&mut self, context: &Context<T>) -> Result<TreeChild<T>, ParseError<T>> {
        match context.rule {
            Some(rule) => Ok(TreeChild::Tree(ParseTree {
                rule: rule.clone(),
                children: Vec::new(),
            })),
            None => unreachable!("start_rule always carries a rule"),
        }
    }

    fn terminal(
        &mut self,
        _context: &Context<T>,
        token: &T,
    ) -> Result<TreeChild<T>, ParseError<T>> {
        Ok(TreeChild::Token(token.clone()))
    }

    fn skip_optional(
        &mut self,
        _context: &Context<T>,
        prev: TreeChild<T>,
    ) -> Result<TreeChild<T>, ParseError<T>> {
        match prev {
            TreeChild::Tree(mut tree) => {
                tree.children.push(TreeChild::Skipped);
                Ok(TreeChild::Tree(tree))
            }
            other => unreachable!("folding into a non-tree value {:?}", other),
        }
    }

    fn begin_multiple(
        &mut self,
        _context: &Context<T>,
        prev: TreeChild<T>,
    ) -> Result<TreeChild<T>, ParseError<T>> {
        match prev {
            TreeChild::Tree(mut tree) => {
                tree.children.push(TreeChild::Group(Vec::new()));
                Ok(TreeChild::Tree(tree))
            }
            other => unreachable!("folding into a non-tree value {:?}", other),
        }
    }

    fn end_multiple(
        &mut self,
        _context: &Context<T>,
        prev: TreeChild<T>,
    ) -> Result<TreeChild<T>, ParseError<T>> {
        Ok(prev)
    }

    fn extend(
        &mut self,
        context: &Context<T>,
        prev: TreeChild<T>,
        extension: TreeChild<T>,
    ) -> Result<TreeChild<T>, ParseError<T>> {
        let multiple = context
            .rule
            .map_or(false, |r| r.rhs()[context.symbol_index].repeat().multiple());
        match prev {
            TreeChild::Tree(mut tree) => {
                if multiple {
                    match tree.children.last_mut() {
                        Some(TreeChild::Group(group)) => group.push(extension),
                        _ => unreachable!("begin_multiple opens the group before any extend"),
                    }
                } else {
                    tree.children.push(extension);
                }
                Ok(TreeChild::Tree(tree))
            }
            other => unreachable!("folding into a non-tree value {:?}", other),
        }
    }
}

/// Lifts an ambiguity-free builder into one producing the value of every
/// parse: extends are cross products, merges concatenate.
pub struct ListBuilder<B> {
    inner: B,
}

impl<B> ListBuilder<B> {
    pub fn new(inner: B) -> Self {
        ListBuilder { inner }
    }
}

impl<T, B: Builder<T>> Builder<T> for ListBuilder<B> {
    type Value = Vec<B::Value>;

    fn start_rule(&mut self, context: &Context<T>) -> Result<Self::Value, ParseError<T>> {
        Ok(vec![self.inner.start_rule(context)?])
    }

    fn end_rule(
        &mut self,
        context: &Context<T>,
        prev: Self::Value,
    ) -> Result<Self::Value, ParseError<T>> {
        prev.into_iter()
            .map(|v| self.inner.end_rule(context, v))
            .collect()
    }

    fn terminal(
        &mut self,
        context: &Context<T>,
        token: &T,
    ) -> Result<Self::Value, ParseError<T>> {
        Ok(vec![self.inner.terminal(context, token)?])
    }

    fn skip_optional(
        &mut self,
        context: &Context<T>,
        prev: Self::Value,
    ) -> Result<Self::Value, ParseError<T>> {
        prev.into_iter()
            .map(|v| self.inner.skip_optional(context, v))
            .collect()
    }

    fn begin_multiple(
        &mut self,
        context: &Context<T>,
        prev: Self::Value,
    ) -> Result<Self::Value, ParseError<T>> {
        prev.into_iter()
            .map(|v| self.inner.begin_multiple(context, v))
            .collect()
    }

    fn end_multiple(
        &mut self,
        context: &Context<T>,
        prev: Self::Value,
    ) -> Result<Self::Value, ParseError<T>> {
        prev.into_iter()
            .map(|v| self.inner.end_multiple(context, v))
            .collect()
    }

    fn extend(
        &mut self,
        context: &Context<T>,
        prev: Self::Value,
        extension: Self::Value,
    ) -> Result<Self::Value, ParseError<T>> {
        let mut out = Vec::with_capacity(prev.len() * extension.len());
        for p in &prev {
            for e in &extension {
                out.push(self.inner.extend(context, p.clone(), e.clone())?);
            }
        }
        Ok(out)
    }

    fn merge(
        &mut self,
        _context: &Context<T>,
        values: Vec<Self::Value>,
    ) -> Result<Self::Value, ParseError<T>> {
        Ok(values.into_iter().flatten().collect())
    }
}
