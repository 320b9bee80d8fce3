//! Item output templates.
//!
//! A template is plain text with `{field}` placeholders, optionally padded
//! with `{field:width}` (right-aligned). `{{` and `}}` produce literal braces.
//!
//! ```
//! use pocket_core::template::ItemTemplate;
//!
//! let template = ItemTemplate::parse("{item_id} {title}").unwrap();
//! assert_eq!(template.placeholders(), 2);
//! ```

use std::fmt::Write;
use std::str::FromStr;
use thiserror::Error;

use crate::items::Item;

/// Layout used by `list` when no format is given.
pub const DEFAULT_TEMPLATE: &str = "[{item_id:9}] {title} <{url}>";

/// Error type for template parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// A placeholder names a field items don't have.
    #[error("unknown field '{name}'")]
    UnknownField { name: String },

    /// A `{` without a matching `}`.
    #[error("unclosed placeholder at offset {offset}")]
    Unclosed { offset: usize },

    /// A `}` without a preceding `{`.
    #[error("unmatched '}}' at offset {offset}")]
    Unmatched { offset: usize },

    /// The width after `:` is not a number.
    #[error("invalid width '{width}' for field '{name}'")]
    InvalidWidth { name: String, width: String },
}

/// Item fields available to templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    ItemId,
    Title,
    Url,
    SortId,
    TimeAdded,
    Excerpt,
}

impl FromStr for Field {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "item_id" => Ok(Self::ItemId),
            "title" => Ok(Self::Title),
            "url" => Ok(Self::Url),
            "sort_id" => Ok(Self::SortId),
            "time_added" => Ok(Self::TimeAdded),
            "excerpt" => Ok(Self::Excerpt),
            _ => Err(TemplateError::UnknownField {
                name: s.to_string(),
            }),
        }
    }
}

impl Field {
    fn value(self, item: &Item) -> String {
        match self {
            Self::ItemId => item.item_id.to_string(),
            Self::Title => item.title().to_string(),
            Self::Url => item.url().to_string(),
            Self::SortId => item.sort_id.to_string(),
            Self::TimeAdded => item
                .added_at()
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            Self::Excerpt => item.excerpt.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder { field: Field, width: usize },
}

/// A compiled item template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemTemplate {
    segments: Vec<Segment>,
}

impl Default for ItemTemplate {
    fn default() -> Self {
        // The built-in layout is known to parse
        Self::parse(DEFAULT_TEMPLATE).unwrap_or(Self {
            segments: Vec::new(),
        })
    }
}

impl ItemTemplate {
    /// Compile a template.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((offset, c)) = chars.next() {
            match c {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    literal.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut inner = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((_, ch)) => inner.push(ch),
                            None => return Err(TemplateError::Unclosed { offset }),
                        }
                    }

                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(parse_placeholder(inner.trim())?);
                }
                '}' => return Err(TemplateError::Unmatched { offset }),
                _ => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    /// Number of placeholders in the template.
    pub fn placeholders(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Placeholder { .. }))
            .count()
    }

    /// Render one item.
    pub fn render(&self, item: &Item) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder { field, width } => {
                    let _ = write!(out, "{:>width$}", field.value(item), width = *width);
                }
            }
        }
        out
    }
}

fn parse_placeholder(inner: &str) -> Result<Segment, TemplateError> {
    let (name, width) = match inner.split_once(':') {
        Some((name, width)) => {
            let parsed = width
                .trim()
                .parse::<usize>()
                .map_err(|_| TemplateError::InvalidWidth {
                    name: name.to_string(),
                    width: width.to_string(),
                })?;
            (name.trim(), parsed)
        }
        None => (inner, 0),
    };

    Ok(Segment::Placeholder {
        field: name.parse()?,
        width,
    })
}
