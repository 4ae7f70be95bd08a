//! Ambiguity pruning, in its fixed order: penalty, then greedy/lazy, then
//! prefer-early/prefer-late, and only then infinite-parse detection. Every
//! layer trims alternatives out of OR nodes and never empties one, so
//! preferences can never turn an accepted input into a rejected one.

use crate::error::ParseError;
use crate::forest::{Edge, Forest, OrId, Pref};
use crate::grammar::Rules;

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

pub(crate) fn prune<T, R>(
    forest: &mut Forest<T>,
    root: OrId,
    rules: &R,
) -> Result<(), ParseError<T>>
where
    R: Rules<T> + ?Sized,
{
    trim_penalty(forest, root);
    trim_quantifier_prefs(forest);
    trim_rule_prefs(forest, rules);
    detect_infinite(forest, root)
}

/// Drops alternatives whose cheapest derivation costs more than the
/// node's minimum. Depth-first from the root; a back-edge into a node
/// still being scored contributes nothing, so loops neither accumulate
/// penalty nor block scoring.
fn trim_penalty<T>(forest: &mut Forest<T>, root: OrId) {
    let mut memo: HashMap<OrId, u64> = HashMap::new();
    let mut on_stack: HashSet<OrId> = HashSet::new();
    penalty_of(forest, root, &mut memo, &mut on_stack);
    // Nodes the root no longer reaches still need scores: pump-cycle
    // liveness reads the pumped node's minimum penalty.
    for o in 0..forest.ors.len() {
        if !memo.contains_key(&o) {
            penalty_of(forest, o, &mut memo, &mut on_stack);
        }
    }
}

fn penalty_of<T>(
    forest: &mut Forest<T>,
    or: OrId,
    memo: &mut HashMap<OrId, u64>,
    on_stack: &mut HashSet<OrId>,
) -> u64 {
    if let Some(&p) = memo.get(&or) {
        return p;
    }
    if !on_stack.insert(or) {
        return 0;
    }
    let alts = forest.ors[or].alts.clone();
    let mut pens: Vec<u64> = Vec::with_capacity(alts.len());
    for &a in &alts {
        let mut p = forest.ands[a].rule.penalty() as u64;
        for c in forest.ands[a].or_children() {
            p = p.saturating_add(penalty_of(forest, c, memo, on_stack));
        }
        pens.push(p);
    }
    let min = pens.iter().copied().min().unwrap_or(0);
    if pens.iter().any(|&p| p != min) {
        let kept: Vec<usize> = alts
            .iter()
            .zip(&pens)
            .filter(|&(_, &p)| p == min)
            .map(|(&a, _)| a)
            .collect();
        forest.ors[or].alts = kept;
    }
    on_stack.remove(&or);
    memo.insert(or, min);
    forest.ors[or].min_penalty = min;
    min
}

/// Greedy/lazy, per OR node, among alternatives that share a rule (the
/// only ones whose child sequences line up symbol by symbol).
fn trim_quantifier_prefs<T>(forest: &mut Forest<T>) {
    for or in 0..forest.ors.len() {
        if forest.ors[or].alts.len() < 2 {
            continue;
        }
        let alts = forest.ors[or].alts.clone();
        let mut groups: Vec<(usize, Vec<usize>)> = Vec::new();
        for a in alts {
            let rid = Rc::as_ptr(&forest.ands[a].rule) as usize;
            match groups.iter_mut().find(|(r, _)| *r == rid) {
                Some((_, g)) => g.push(a),
                None => groups.push((rid, vec![a])),
            }
        }
        let mut kept: Vec<usize> = Vec::new();
        for (_, group) in groups {
            kept.extend(refine_group(forest, group, 0));
        }
        forest.ors[or].alts = kept;
    }
}

/// Left-to-right scoping: the alternatives arrive sharing their child
/// prefix `[0, k)`. If the symbol at `k` is greedy (lazy), alternatives
/// with fewer (more) occurrences there are dropped; survivors are then
/// refined position by position within clusters that still agree.
fn refine_group<T>(forest: &Forest<T>, mut alts: Vec<usize>, k: usize) -> Vec<usize> {
    if alts.len() <= 1 {
        return alts;
    }
    let rule = forest.ands[alts[0]].rule.clone();
    if k == rule.rhs().len() {
        return alts;
    }
    let sym = &rule.rhs()[k];
    if sym.is_greedy() || sym.is_lazy() {
        let counts: Vec<usize> = alts
            .iter()
            .map(|&a| forest.ands[a].children[k].match_count())
            .collect();
        let best = if sym.is_greedy() {
            counts.iter().copied().max()
        } else {
            counts.iter().copied().min()
        };
        if let Some(best) = best {
            alts = alts
                .into_iter()
                .zip(counts)
                .filter(|&(_, c)| c == best)
                .map(|(a, _)| a)
                .collect();
        }
    }
    let mut clusters: Vec<(Edge, Vec<usize>)> = Vec::new();
    for a in alts {
        let e = forest.ands[a].children[k].clone();
        match clusters.iter_mut().find(|(ce, _)| *ce == e) {
            Some((_, v)) => v.push(a),
            None => clusters.push((e, vec![a])),
        }
    }
    let mut out = Vec::new();
    for (_, cluster) in clusters {
        out.extend(refine_group(forest, cluster, k + 1));
    }
    out
}

/// Prefer-early/late: an OR node whose call site stated a preference keeps
/// only the alternatives whose rule sits earliest (latest) in the rule
/// set's order for that head.
fn trim_rule_prefs<T, R>(forest: &mut Forest<T>, rules: &R)
where
    R: Rules<T> + ?Sized,
{
    for or in 0..forest.ors.len() {
        let pref = forest.ors[or].pref;
        if pref == Pref::Neutral || forest.ors[or].alts.len() < 2 {
            continue;
        }
        let order = rules.rules_for(&forest.ors[or].head);
        let alts = forest.ors[or].alts.clone();
        let prios: Vec<usize> = alts
            .iter()
            .map(|&a| {
                let rule = &forest.ands[a].rule;
                order
                    .iter()
                    .position(|r| Rc::ptr_eq(r, rule))
                    .unwrap_or(usize::MAX)
            })
            .collect();
        let best = match pref {
            Pref::Early => prios.iter().copied().min(),
            Pref::Late => prios.iter().copied().max(),
            Pref::Neutral => None,
        };
        if let Some(best) = best {
            if prios.iter().any(|&p| p != best) {
                let kept: Vec<usize> = alts
                    .into_iter()
                    .zip(prios)
                    .filter(|&(_, p)| p == best)
                    .map(|(a, _)| a)
                    .collect();
                forest.ors[or].alts = kept;
            }
        }
    }
}

fn or_successors<T>(forest: &Forest<T>, or: OrId) -> Vec<OrId> {
    let mut out = Vec::new();
    for &a in &forest.ors[or].alts {
        out.extend(forest.ands[a].or_children());
    }
    out
}

/// Infinite-parse detection over what pruning left behind.
///
/// Two shapes exist. A cycle through OR nodes (`s -> s`) is found by a
/// grey-node depth-first walk -- any cycle in the forest spans a fixed
/// token range, so a back-edge is exactly the zero-width strongly
/// connected component the chart can produce. A pump cycle (zero-width
/// quantifier repetition) is live when a surviving, reachable alternative
/// carries it, the symbol is not lazy, and one more repetition costs no
/// more than the factoring it would extend.
fn detect_infinite<T>(forest: &Forest<T>, root: OrId) -> Result<(), ParseError<T>> {
    let mut reach_or: HashSet<OrId> = HashSet::new();
    let mut reach_and: HashSet<usize> = HashSet::new();
    let mut stack = vec![root];
    while let Some(o) = stack.pop() {
        if !reach_or.insert(o) {
            continue;
        }
        for &a in &forest.ors[o].alts {
            reach_and.insert(a);
            for c in forest.ands[a].or_children() {
                stack.push(c);
            }
        }
    }

    let mut live: HashSet<usize> = HashSet::new();
    for &a in &reach_and {
        for &c in &forest.ands[a].cycles {
            live.insert(c);
        }
    }
    for (cid, cyc) in forest.cycles.iter().enumerate() {
        if !live.contains(&cid) || cyc.lazy {
            continue;
        }
        let pump_pen = forest.ors[cyc.pump].min_penalty;
        let item_pen = cyc
            .prefix
            .iter()
            .map(|edges| {
                edges
                    .iter()
                    .map(|&o| forest.ors[o].min_penalty)
                    .fold(0u64, u64::saturating_add)
            })
            .min()
            .unwrap_or(0)
            .saturating_add(cyc.rule_penalty);
        if pump_pen <= item_pen {
            return Err(ParseError::infinite(cyc.span.0, cyc.span.1));
        }
    }

    #[derive(Copy, Clone, PartialEq)]
    enum Color {
        White,
        Grey,
        Black,
    }
    let mut color: HashMap<OrId, Color> = HashMap::new();
    for o in 0..forest.ors.len() {
        if !reach_or.contains(&o) {
            continue;
        }
        if color.get(&o).copied().unwrap_or(Color::White) != Color::White {
            continue;
        }
        color.insert(o, Color::Grey);
        let mut dfs: Vec<(OrId, Vec<OrId>, usize)> = vec![(o, or_successors(forest, o), 0)];
        while let Some(top) = dfs.last_mut() {
            let node = top.0;
            if top.2 < top.1.len() {
                let next = top.1[top.2];
                top.2 += 1;
                match color.get(&next).copied().unwrap_or(Color::White) {
                    Color::Grey => {
                        let or = &forest.ors[next];
                        return Err(ParseError::infinite(or.start, or.end));
                    }
                    Color::Black => {}
                    Color::White => {
                        color.insert(next, Color::Grey);
                        let succs = or_successors(forest, next);
                        dfs.push((next, succs, 0));
                    }
                }
            } else {
                color.insert(node, Color::Black);
                dfs.pop();
            }
        }
    }
    Ok(())
}
