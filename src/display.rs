use crate::grammar::{Matcher, Repeat, Rule, Symbol};
use crate::tree::{ParseTree, TreeChild};

use std::fmt;

fn specifier<T>(sym: &Symbol<T>) -> &'static str {
    match (sym.repeat(), sym.is_lazy(), sym.is_greedy()) {
        (Repeat::Once, _, _) => "",
        (Repeat::Optional, false, false) => "?",
        (Repeat::Optional, true, _) => "??",
        // Not standard notation for greedy, but readable.
        (Repeat::Optional, _, true) => "?*",
        (Repeat::Star, false, false) => "*",
        (Repeat::Star, true, _) => "*?",
        (Repeat::Star, _, true) => "**",
        (Repeat::Plus, false, false) => "+",
        (Repeat::Plus, true, _) => "+?",
        (Repeat::Plus, _, true) => "+*",
    }
}

impl<T> fmt::Display for Symbol<T> {
    fn fmt(&self, w: &mut fmt::Formatter) -> fmt::Result {
        match self.head() {
            Some(head) => write!(w, "<{}>{}", head, specifier(self)),
            None => {
                let label = self.matcher().map(Matcher::label).unwrap_or("");
                write!(w, "{}{}", label, specifier(self))
            }
        }
    }
}

impl<T> fmt::Debug for Symbol<T> {
    fn fmt(&self, w: &mut fmt::Formatter) -> fmt::Result {
        match self.head() {
            Some(head) => write!(w, "NonTerminal({:?})", head),
            None => {
                let label = self.matcher().map(Matcher::label).unwrap_or("");
                write!(w, "Terminal({})", label)
            }
        }
    }
}

impl<T> fmt::Debug for Matcher<T> {
    fn fmt(&self, w: &mut fmt::Formatter) -> fmt::Result {
        write!(w, "Matcher({})", self.label())
    }
}

impl<T> fmt::Display for Rule<T> {
    fn fmt(&self, w: &mut fmt::Formatter) -> fmt::Result {
        write!(w, "<{}> ::=", self.head())?;
        for sym in self.rhs() {
            write!(w, " {}", sym)?;
        }
        Ok(())
    }
}

impl<T> fmt::Debug for Rule<T> {
    fn fmt(&self, w: &mut fmt::Formatter) -> fmt::Result {
        write!(w, "Rule({})", self)
    }
}

impl<T: fmt::Debug> fmt::Display for ParseTree<T> {
    fn fmt(&self, w: &mut fmt::Formatter) -> fmt::Result {
        write!(w, "({}", self.rule.head())?;
        for child in &self.children {
            write!(w, " {}", child)?;
        }
        write!(w, ")")
    }
}

impl<T: fmt::Debug> fmt::Display for TreeChild<T> {
    fn fmt(&self, w: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TreeChild::Token(token) => write!(w, "{:?}", token),
            TreeChild::Tree(tree) => write!(w, "{}", tree),
            TreeChild::Skipped => write!(w, "None"),
            TreeChild::Group(members) => {
                write!(w, "(")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(w, ", ")?;
                    }
                    write!(w, "{}", member)?;
                }
                write!(w, ")")
            }
        }
    }
}
