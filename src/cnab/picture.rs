//! Picture-string grammar for fixed-width record fields.
//!
//! ```text
//! picture      := title? (alphanumeric | numeric | date)
//! title        := '<' word '>'
//! alphanumeric := 'A' '(' length ')' ( '(' 'U' | 'L' ')' )?
//! numeric      := 'N' '(' length ')' ( '(' decimals ')' )?
//! date         := runs of d / m / y|a letters mixed with separators
//! ```
//!
//! Letters are case-insensitive. The alternatives are tried in the order
//! above; the first one consuming the whole input wins.

use std::fmt;

use crate::error::{BilletError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Casing {
    Upper,
    Lower,
    #[default]
    None,
}

impl Casing {
    pub fn apply(&self, value: &str) -> String {
        match self {
            Casing::Upper => value.to_uppercase(),
            Casing::Lower => value.to_lowercase(),
            Casing::None => value.to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateComponent {
    Day,
    Month,
    Year,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateSegment {
    /// Zero-padded component occupying `width` characters.
    Component(DateComponent, usize),
    Literal(String),
}

/// A date layout such as `ddmmaaaa` or `dd/mm/yy`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFormat {
    pattern: String,
    segments: Vec<DateSegment>,
}

impl DateFormat {
    pub fn parse(pattern: &str) -> Result<Self> {
        let mut segments: Vec<DateSegment> = Vec::new();
        let mut chars = pattern.chars().peekable();

        while let Some(ch) = chars.next() {
            let component = match ch.to_ascii_lowercase() {
                'd' => Some(DateComponent::Day),
                'm' => Some(DateComponent::Month),
                'y' | 'a' => Some(DateComponent::Year),
                _ => None,
            };

            match component {
                Some(component) => {
                    let mut width = 1;
                    while chars
                        .peek()
                        .is_some_and(|next| same_component(*next, component))
                    {
                        chars.next();
                        width += 1;
                    }
                    segments.push(DateSegment::Component(component, width));
                }
                None if ch.is_alphanumeric() => {
                    return Err(BilletError::Grammar(pattern.to_owned()));
                }
                None => match segments.last_mut() {
                    Some(DateSegment::Literal(literal)) => literal.push(ch),
                    _ => segments.push(DateSegment::Literal(ch.to_string())),
                },
            }
        }

        let has_component = segments
            .iter()
            .any(|segment| matches!(segment, DateSegment::Component(..)));
        if !has_component {
            return Err(BilletError::Grammar(pattern.to_owned()));
        }

        Ok(Self {
            pattern: pattern.to_owned(),
            segments,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn segments(&self) -> &[DateSegment] {
        &self.segments
    }

    /// Field width: the character count of the pattern.
    pub fn len(&self) -> usize {
        self.pattern.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.pattern.is_empty()
    }
}

fn same_component(ch: char, component: DateComponent) -> bool {
    matches!(
        (ch.to_ascii_lowercase(), component),
        ('d', DateComponent::Day) | ('m', DateComponent::Month) | ('y' | 'a', DateComponent::Year)
    )
}

impl fmt::Display for DateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Alphanumeric { length: usize, casing: Casing },
    Numeric { length: usize, decimal_places: u32 },
    Date(DateFormat),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
    pub title: Option<String>,
    pub kind: FieldKind,
}

/// Parses a picture string into its title and field kind.
pub fn parse_picture(picture: &str) -> Result<Picture> {
    let mut cursor = Cursor::new(picture);
    let title = cursor.title();
    let body = cursor.rest();

    let kind = match alphanumeric(body).or_else(|| numeric(body)) {
        Some(kind) => kind,
        None => DateFormat::parse(body)
            .map(FieldKind::Date)
            .map_err(|_| BilletError::Grammar(picture.to_owned()))?,
    };

    Ok(Picture { title, kind })
}

fn alphanumeric(body: &str) -> Option<FieldKind> {
    let mut cursor = Cursor::new(body);
    cursor.letter('a')?;
    let length = cursor.group()?.parse().ok()?;
    let casing = match cursor.group() {
        None => Casing::None,
        Some(group) if group.eq_ignore_ascii_case("u") => Casing::Upper,
        Some(group) if group.eq_ignore_ascii_case("l") => Casing::Lower,
        Some(_) => return None,
    };
    cursor.at_end().then_some(FieldKind::Alphanumeric { length, casing })
}

fn numeric(body: &str) -> Option<FieldKind> {
    let mut cursor = Cursor::new(body);
    cursor.letter('n')?;
    let length = cursor.group()?.parse().ok()?;
    let decimal_places = match cursor.group() {
        None => 0,
        Some(group) => group.parse().ok()?,
    };
    cursor.at_end().then_some(FieldKind::Numeric { length, decimal_places })
}

struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self { rest: input }
    }

    fn rest(&self) -> &'a str {
        self.rest
    }

    fn at_end(&self) -> bool {
        self.rest.is_empty()
    }

    /// `<word>`; left untouched when absent or malformed.
    fn title(&mut self) -> Option<String> {
        let inner = self.rest.strip_prefix('<')?;
        let end = inner.find('>')?;
        let word = &inner[..end];
        if word.is_empty() || !word.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return None;
        }
        self.rest = &inner[end + 1..];
        Some(word.to_owned())
    }

    fn letter(&mut self, expected: char) -> Option<()> {
        let first = self.rest.chars().next()?;
        if !first.eq_ignore_ascii_case(&expected) {
            return None;
        }
        self.rest = &self.rest[first.len_utf8()..];
        Some(())
    }

    /// `(content)` with a non-empty alphanumeric content.
    fn group(&mut self) -> Option<&'a str> {
        let inner = self.rest.strip_prefix('(')?;
        let end = inner.find(')')?;
        let content = &inner[..end];
        if content.is_empty() || !content.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        self.rest = &inner[end + 1..];
        Some(content)
    }
}
