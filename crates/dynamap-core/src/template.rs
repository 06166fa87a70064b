//! Key templates.
//!
//! A template such as `"ORDER#<CustomerId>#<OrderId>"` is a sequence of
//! literal text and `<Property>` placeholders. Parsing is a single pass over
//! the characters; resolution then checks every placeholder against the
//! model's property list (including inherited properties).

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

/// Errors produced while parsing or resolving a template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// A `<` without its closing `>`.
    #[error("unterminated placeholder starting at offset {offset} in '{pattern}'")]
    Unterminated {
        /// The whole template.
        pattern: String,
        /// Byte offset of the opening `<`.
        offset: usize,
    },
    /// A placeholder whose name is empty or not an identifier.
    #[error("invalid placeholder '<{name}>' in '{pattern}'")]
    InvalidPlaceholder {
        /// The whole template.
        pattern: String,
        /// The text between the delimiters.
        name: String,
    },
    /// A placeholder names a property the model does not have.
    #[error("property '{property}' referenced by '{pattern}' was not found on '{type_name}'")]
    PropertyNotFound {
        /// The unresolved property name.
        property: String,
        /// The whole template.
        pattern: String,
        /// The model type that was searched.
        type_name: String,
    },
}

/// One template segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Literal text copied to the output.
    Literal(String),
    /// A property whose value is substituted.
    Placeholder(String),
}

/// A parsed, not yet resolved, template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pattern: String,
    tokens: Vec<Token>,
}

impl Template {
    /// Tokenize a template.
    ///
    /// A template with no placeholders is a constant and is valid.
    ///
    /// # Examples
    ///
    /// ```
    /// use dynamap_core::template::{Template, Token};
    ///
    /// let t = Template::parse("ENTITY#<Id>").unwrap();
    /// assert_eq!(
    ///     t.tokens(),
    ///     &[Token::Literal("ENTITY#".to_owned()), Token::Placeholder("Id".to_owned())]
    /// );
    /// ```
    pub fn parse(pattern: &str) -> Result<Self, TemplateError> {
        let tokens = Lexer::new(pattern).tokenize()?;
        Ok(Self {
            pattern: pattern.to_owned(),
            tokens,
        })
    }

    /// The original pattern text.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Parsed segments, in order.
    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Placeholder names, in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().filter_map(|t| match t {
            Token::Placeholder(name) => Some(name.as_str()),
            Token::Literal(_) => None,
        })
    }

    /// Whether the template has no placeholders.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.placeholders().next().is_none()
    }

    /// Resolve placeholders against a property list.
    ///
    /// `properties` is the model's full, inheritance-aware property name list.
    /// The first placeholder that is not in it is reported.
    pub fn resolve<'a, I>(
        &self,
        properties: I,
        type_name: &str,
    ) -> Result<ResolvedTemplate, TemplateError>
    where
        I: IntoIterator<Item = &'a str> + Clone,
    {
        let mut segments = Vec::with_capacity(self.tokens.len());
        for token in &self.tokens {
            match token {
                Token::Literal(text) => segments.push(Segment::Literal(text.clone())),
                Token::Placeholder(name) => {
                    let index = properties
                        .clone()
                        .into_iter()
                        .position(|p| p == name)
                        .ok_or_else(|| TemplateError::PropertyNotFound {
                            property: name.clone(),
                            pattern: self.pattern.clone(),
                            type_name: type_name.to_owned(),
                        })?;
                    segments.push(Segment::Property {
                        name: name.clone(),
                        index,
                    });
                }
            }
        }
        Ok(ResolvedTemplate {
            pattern: self.pattern.clone(),
            segments,
        })
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

/// A resolved template segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text.
    Literal(String),
    /// Property, with its position in the model's property list.
    Property {
        /// Property name.
        name: String,
        /// Index into the model's property list.
        index: usize,
    },
}

/// A template whose placeholders all name known properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTemplate {
    pattern: String,
    segments: Vec<Segment>,
}

impl ResolvedTemplate {
    /// The original pattern text.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Resolved segments, in order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Property indexes referenced by this template.
    pub fn property_indexes(&self) -> impl Iterator<Item = usize> + '_ {
        self.segments.iter().filter_map(|s| match s {
            Segment::Property { index, .. } => Some(*index),
            Segment::Literal(_) => None,
        })
    }

    /// Substitute placeholder values.
    ///
    /// `value_of` returns the stringified value of the property at an index,
    /// `Ok(None)` when it is absent. Any absent value makes the whole render
    /// `None`.
    pub fn render<E, F>(&self, mut value_of: F) -> Result<Option<String>, E>
    where
        F: FnMut(usize) -> Result<Option<String>, E>,
    {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Property { index, .. } => match value_of(*index)? {
                    Some(text) => out.push_str(&text),
                    None => return Ok(None),
                },
            }
        }
        Ok(Some(out))
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

struct Lexer<'a> {
    pattern: &'a str,
    chars: Peekable<Chars<'a>>,
    offset: usize,
}

impl<'a> Lexer<'a> {
    fn new(pattern: &'a str) -> Self {
        Self {
            pattern,
            chars: pattern.chars().peekable(),
            offset: 0,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.offset += c.len_utf8();
        Some(c)
    }

    fn tokenize(mut self) -> Result<Vec<Token>, TemplateError> {
        let mut tokens = Vec::new();
        let mut literal = String::new();

        while let Some(&ch) = self.chars.peek() {
            if ch == '<' {
                if !literal.is_empty() {
                    tokens.push(Token::Literal(std::mem::take(&mut literal)));
                }
                tokens.push(self.read_placeholder()?);
            } else {
                literal.push(ch);
                self.bump();
            }
        }
        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }
        Ok(tokens)
    }

    fn read_placeholder(&mut self) -> Result<Token, TemplateError> {
        let start = self.offset;
        self.bump(); // consume '<'
        let mut name = String::new();
        loop {
            match self.bump() {
                Some('>') => break,
                Some(c) => name.push(c),
                None => {
                    return Err(TemplateError::Unterminated {
                        pattern: self.pattern.to_owned(),
                        offset: start,
                    });
                }
            }
        }
        if !is_identifier(&name) {
            return Err(TemplateError::InvalidPlaceholder {
                pattern: self.pattern.to_owned(),
                name,
            });
        }
        Ok(Token::Placeholder(name))
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}
