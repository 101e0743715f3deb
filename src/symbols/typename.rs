//! Parser for type syntax as written in source (`Foo.Bar<Baz, Qux[]>?`).
//!
//! Only the shapes that show up in member declarations are understood:
//! dotted names, generic arguments on the last segment, and array or
//! nullable suffixes. Anything else (tuples, pointers, nested generic
//! qualifiers) is left to the caller as opaque text.

/// A parsed, unresolved type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeName {
    /// Dotted segments, the simple name last
    pub segments: Vec<String>,
    pub arguments: Vec<TypeName>,
    /// Number of generic parameters; differs from `arguments.len()` only
    /// for unbound forms such as `DbSet<>`
    pub arity: usize,
    /// Array and nullable decorations, verbatim without whitespace
    pub suffix: String,
}

impl TypeName {
    pub fn parse(text: &str) -> Option<TypeName> {
        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        let compact = compact.strip_prefix("global::").unwrap_or(&compact);
        let mut parser = Parser {
            chars: compact.chars().collect(),
            pos: 0,
        };
        let parsed = parser.type_name()?;
        if parser.pos == parser.chars.len() {
            Some(parsed)
        } else {
            None
        }
    }

    pub fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// Everything before the simple name, if the name was qualified.
    pub fn qualifier(&self) -> Option<String> {
        if self.segments.len() > 1 {
            Some(self.segments[..self.segments.len() - 1].join("."))
        } else {
            None
        }
    }

    pub fn dotted(&self) -> String {
        self.segments.join(".")
    }

    pub fn is_unbound(&self) -> bool {
        self.arity > 0 && self.arguments.is_empty()
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn identifier(&mut self) -> Option<String> {
        let start = self.pos;
        self.eat('@');
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let ident: String = self.chars[start..self.pos].iter().collect();
        let ident = ident.trim_start_matches('@');
        let first = ident.chars().next()?;
        if first.is_numeric() {
            return None;
        }
        Some(ident.to_string())
    }

    fn type_name(&mut self) -> Option<TypeName> {
        let mut segments = vec![self.identifier()?];
        while self.eat('.') {
            segments.push(self.identifier()?);
        }

        let mut arguments = Vec::new();
        let mut arity = 0;
        if self.eat('<') {
            if self.peek() == Some('>') || self.peek() == Some(',') {
                arity = 1;
                while self.eat(',') {
                    arity += 1;
                }
            } else {
                arguments.push(self.type_name()?);
                while self.eat(',') {
                    arguments.push(self.type_name()?);
                }
                arity = arguments.len();
            }
            if !self.eat('>') {
                return None;
            }
            if self.peek() == Some('.') {
                return None;
            }
        }

        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, '?' | '[' | ']' | '*') || (c == ',' && self.in_brackets(start)) {
                self.pos += 1;
            } else {
                break;
            }
        }
        let suffix = self.chars[start..self.pos].iter().collect();

        Some(TypeName {
            segments,
            arguments,
            arity,
            suffix,
        })
    }

    /// A comma belongs to the suffix only inside `[,]` rank specifiers.
    fn in_brackets(&self, start: usize) -> bool {
        let opened = self.chars[start..self.pos].iter().filter(|c| **c == '[').count();
        let closed = self.chars[start..self.pos].iter().filter(|c| **c == ']').count();
        opened > closed
    }
}
