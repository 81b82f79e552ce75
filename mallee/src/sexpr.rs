//! A small s-expression notation for trees.
//!
//! ```text
//! (Block
//!   (Call (Identifier "f") (Identifier "x"))
//!   (Return))
//! ```
//!
//! Each node is `(Type "label"? child*)`. Type names are any run of
//! characters other than whitespace, parentheses and `"`. Labels are double
//! quoted with `\"`, `\\`, `\n` and `\t` escapes; `""` is an empty label,
//! which is not the same as no label. Node spans are byte offsets into the
//! input.

use crate::interner::{NodeType, TypeInterner};
use crate::tree::{NodeData, Tree};
use compact_str::CompactString;
use core::fmt;
use indextree::{NodeEdge, NodeId};

/// Errors from [`parse_sexpr`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The input holds no tree at all.
    #[error("empty input")]
    Empty,
    /// The input ended inside a node or a label.
    #[error("unexpected end of input at byte {offset}")]
    UnexpectedEof {
        /// Byte offset where more input was expected.
        offset: usize,
    },
    /// A character that cannot start the expected token.
    #[error("unexpected character {found:?} at byte {offset}")]
    UnexpectedChar {
        /// Byte offset of the character.
        offset: usize,
        /// The character found.
        found: char,
    },
    /// A label is missing its closing quote.
    #[error("unterminated string starting at byte {offset}")]
    UnterminatedString {
        /// Byte offset of the opening quote.
        offset: usize,
    },
    /// A node was opened without a type name.
    #[error("missing node type at byte {offset}")]
    MissingType {
        /// Byte offset right after the opening parenthesis.
        offset: usize,
    },
    /// An escape sequence other than `\"`, `\\`, `\n` or `\t`.
    #[error("invalid escape {found:?} at byte {offset}")]
    InvalidEscape {
        /// Byte offset of the backslash.
        offset: usize,
        /// The character following the backslash.
        found: char,
    },
    /// Something follows the closing parenthesis of the root.
    #[error("trailing input at byte {offset}")]
    TrailingInput {
        /// Byte offset of the first trailing character.
        offset: usize,
    },
}

struct Cursor<'a> {
    text: &'a str,
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<char> {
        self.text[self.offset..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.offset += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn word(&mut self) -> &'a str {
        let start = self.offset;
        while self
            .peek()
            .is_some_and(|c| !c.is_whitespace() && !matches!(c, '(' | ')' | '"'))
        {
            self.bump();
        }
        &self.text[start..self.offset]
    }

    fn string(&mut self) -> Result<CompactString, ParseError> {
        let start = self.offset;
        self.bump();
        let mut out = CompactString::default();
        loop {
            let at = self.offset;
            match self.bump() {
                None => return Err(ParseError::UnterminatedString { offset: start }),
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('"') => out.push('"'),
                    Some('\\') => out.push('\\'),
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(found) => return Err(ParseError::InvalidEscape { offset: at, found }),
                    None => return Err(ParseError::UnterminatedString { offset: start }),
                },
                Some(c) => out.push(c),
            }
        }
    }
}

/// Parse one tree, interning its types in `interner`. Metrics are computed
/// on the result.
pub fn parse_sexpr(text: &str, interner: &TypeInterner) -> Result<Tree, ParseError> {
    let mut cursor = Cursor { text, offset: 0 };
    let mut tree: Option<Tree> = None;
    let mut open: Vec<NodeId> = Vec::new();

    loop {
        cursor.skip_ws();
        let offset = cursor.offset;
        match cursor.peek() {
            None if tree.is_none() => return Err(ParseError::Empty),
            None => return Err(ParseError::UnexpectedEof { offset }),
            Some('(') => {
                cursor.bump();
                cursor.skip_ws();
                let name = cursor.word();
                if name.is_empty() {
                    return Err(ParseError::MissingType {
                        offset: cursor.offset,
                    });
                }
                let mut data = NodeData::new(interner.intern(name)).with_span(offset, 0);
                cursor.skip_ws();
                if cursor.peek() == Some('"') {
                    data.label = Some(cursor.string()?);
                }

                let id = match tree.as_mut() {
                    Some(tree) => match open.last() {
                        Some(&parent) => tree.add_child(parent, data),
                        None => return Err(ParseError::TrailingInput { offset }),
                    },
                    None => {
                        let new_tree = Tree::new(data);
                        let root = new_tree.root;
                        tree = Some(new_tree);
                        root
                    }
                };
                open.push(id);
            }
            Some(')') => {
                cursor.bump();
                let (Some(id), Some(tree)) = (open.pop(), tree.as_mut()) else {
                    return Err(ParseError::UnexpectedChar { offset, found: ')' });
                };
                let node = tree.get_mut(id);
                node.length = cursor.offset - node.pos;
                if open.is_empty() {
                    break;
                }
            }
            Some(found) => return Err(ParseError::UnexpectedChar { offset, found }),
        }
    }

    cursor.skip_ws();
    if cursor.peek().is_some() {
        return Err(ParseError::TrailingInput {
            offset: cursor.offset,
        });
    }

    let mut tree = tree.ok_or(ParseError::Empty)?;
    tree.compute_metrics();
    Ok(tree)
}

/// Renders a subtree back into the s-expression notation.
pub struct SexprDisplay<'a> {
    tree: &'a Tree,
    node: NodeId,
    interner: &'a TypeInterner,
}

impl Tree {
    /// Parse a tree from its s-expression notation. See [`parse_sexpr`].
    pub fn parse_sexpr(text: &str, interner: &TypeInterner) -> Result<Tree, ParseError> {
        parse_sexpr(text, interner)
    }

    /// Display the whole tree as an s-expression, resolving type names
    /// through `interner`.
    pub fn display<'a>(&'a self, interner: &'a TypeInterner) -> SexprDisplay<'a> {
        self.display_node(self.root, interner)
    }

    /// Display the subtree rooted at `node`.
    pub fn display_node<'a>(
        &'a self,
        node: NodeId,
        interner: &'a TypeInterner,
    ) -> SexprDisplay<'a> {
        SexprDisplay {
            tree: self,
            node,
            interner,
        }
    }
}

pub(crate) fn write_type(
    f: &mut fmt::Formatter<'_>,
    kind: NodeType,
    interner: &TypeInterner,
) -> fmt::Result {
    match interner.resolve(kind) {
        Some(name) => f.write_str(&name),
        None => write!(f, "{kind}"),
    }
}

pub(crate) fn write_label(f: &mut fmt::Formatter<'_>, label: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in label.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

impl fmt::Display for SexprDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for edge in self.node.traverse(&self.tree.arena) {
            match edge {
                NodeEdge::Start(id) => {
                    if id != self.node {
                        f.write_str(" ")?;
                    }
                    f.write_str("(")?;
                    let data = self.tree.get(id);
                    write_type(f, data.kind, self.interner)?;
                    if let Some(label) = &data.label {
                        f.write_str(" ")?;
                        write_label(f, label)?;
                    }
                }
                NodeEdge::End(_) => f.write_str(")")?,
            }
        }
        Ok(())
    }
}
