//! Grammar symbols and right-hand-side items.
//!
//! A rule expands a nonterminal into a sequence of [`Item`]s. An item is
//! either a bare symbol (a nonterminal, or a terminal literal) or a nested
//! sequence of items, which lets a rule produce structured literals such as
//! argument lists.

use std::fmt;
use std::rc::Rc;

/// A grammar symbol. Nonterminals and terminal literals share this type;
/// whether a symbol is a nonterminal depends on the rules currently visible.
pub type Symbol = Rc<str>;

/// One entry on the right-hand side of a rule.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Item {
    /// A single symbol
    Symbol(Symbol),
    /// A structured literal made of further items
    Seq(Vec<Item>),
}

impl Item {
    /// Create a symbol item.
    pub fn symbol(s: impl Into<Symbol>) -> Self {
        Item::Symbol(s.into())
    }

    /// Create a sequence item.
    pub fn seq(items: Vec<Item>) -> Self {
        Item::Seq(items)
    }

    /// Get the symbol if this is a bare symbol.
    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Item::Symbol(s) => Some(s),
            Item::Seq(_) => None,
        }
    }

    /// Visit every symbol in this item, depth first.
    pub fn for_each_symbol<'a>(&'a self, f: &mut impl FnMut(&'a Symbol)) {
        match self {
            Item::Symbol(s) => f(s),
            Item::Seq(items) => {
                for item in items {
                    item.for_each_symbol(f);
                }
            }
        }
    }
}

impl From<&str> for Item {
    fn from(s: &str) -> Self {
        Item::Symbol(s.into())
    }
}

impl From<Symbol> for Item {
    fn from(s: Symbol) -> Self {
        Item::Symbol(s)
    }
}

impl From<Vec<Item>> for Item {
    fn from(items: Vec<Item>) -> Self {
        Item::Seq(items)
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Symbol(s) => write_symbol(f, s),
            Item::Seq(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Whether a symbol can be written bare in the grammar text format.
pub(crate) fn is_bare_symbol(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '\'')
}

/// Write a symbol, quoting it when it is not a bare identifier.
pub(crate) fn write_symbol(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    if is_bare_symbol(s) {
        write!(f, "{}", s)
    } else {
        write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

/// Convenience for building a list of symbol items.
pub fn items<'a>(symbols: impl IntoIterator<Item = &'a str>) -> Vec<Item> {
    symbols.into_iter().map(Item::from).collect()
}
