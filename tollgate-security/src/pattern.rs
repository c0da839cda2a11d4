use std::fmt;

/// One `/`-separated piece of a pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    /// `**`: zero or more whole segments.
    AnyPath,
    /// Plain text, compared verbatim.
    Literal(String),
    /// Text containing `*`, `?` or `{var}` placeholders.
    Glob(Vec<Token>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Char(char),
    /// `?`
    One,
    /// `*` or `{var}`
    Many,
}

/// A route pattern in the style commonly used for permit lists.
///
/// - `**` matches zero or more whole path segments (`/login/**` matches
///   `/login`, `/login/auth` and `/login/a/b`).
/// - `*` matches zero or more characters inside one segment.
/// - `?` matches exactly one character.
/// - `{name}` matches one path segment, like `*`.
///
/// A pattern and a path must agree on a leading `/` and on a trailing `/`,
/// except that a pattern ending in `/**` also matches with or without one.
/// Empty segments in the middle (`/a//b`) are kept and only match an empty
/// literal segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathPattern {
    source: String,
    absolute: bool,
    trailing_slash: bool,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        let source = pattern.into();
        let absolute = source.starts_with('/');
        let (parts, trailing_slash) = split(&source);
        let segments = parts.into_iter().map(parse_segment).collect();
        Self {
            source,
            absolute,
            trailing_slash,
            segments,
        }
    }

    /// The pattern text as configured.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the pattern contains no wildcard at all.
    pub fn is_literal(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Literal(_)))
    }

    pub fn matches(&self, path: &str) -> bool {
        if path.starts_with('/') != self.absolute {
            return false;
        }
        let (parts, trailing_slash) = split(path);
        if trailing_slash != self.trailing_slash && self.segments.last() != Some(&Segment::AnyPath) {
            return false;
        }
        match_segments(&self.segments, &parts)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl From<&str> for PathPattern {
    fn from(value: &str) -> Self {
        PathPattern::new(value)
    }
}

impl From<String> for PathPattern {
    fn from(value: String) -> Self {
        PathPattern::new(value)
    }
}

/// Segments between the leading and trailing `/`, plus whether a trailing
/// `/` was present. The root path `/` has no segments.
fn split(path: &str) -> (Vec<&str>, bool) {
    let body = path.strip_prefix('/').unwrap_or(path);
    if body.is_empty() {
        return (Vec::new(), false);
    }
    match body.strip_suffix('/') {
        Some(inner) => (inner.split('/').collect(), true),
        None => (body.split('/').collect(), false),
    }
}

fn parse_segment(raw: &str) -> Segment {
    if raw == "**" {
        return Segment::AnyPath;
    }
    if !raw.contains(['*', '?', '{']) {
        return Segment::Literal(raw.to_string());
    }

    let mut tokens = Vec::new();
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                // Consecutive stars inside a segment behave like one.
                if tokens.last() != Some(&Token::Many) {
                    tokens.push(Token::Many);
                }
            }
            '?' => tokens.push(Token::One),
            '{' => {
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                }
                if closed {
                    tokens.push(Token::Many);
                } else {
                    tokens.push(Token::Char('{'));
                }
            }
            other => tokens.push(Token::Char(other)),
        }
    }
    Segment::Glob(tokens)
}

fn match_segments(pattern: &[Segment], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((Segment::AnyPath, rest)) => {
            // Collapse runs of `**` before branching.
            let rest_start = rest
                .iter()
                .position(|s| *s != Segment::AnyPath)
                .unwrap_or(rest.len());
            let rest = &rest[rest_start..];
            (0..=path.len()).any(|skip| match_segments(rest, &path[skip..]))
        }
        Some((segment, rest)) => match path.split_first() {
            Some((part, path_rest)) => {
                match_segment(segment, part) && match_segments(rest, path_rest)
            }
            None => false,
        },
    }
}

fn match_segment(segment: &Segment, part: &str) -> bool {
    if part.is_empty() {
        return matches!(segment, Segment::AnyPath)
            || matches!(segment, Segment::Literal(text) if text.is_empty());
    }
    match segment {
        Segment::AnyPath => true,
        Segment::Literal(text) => text == part,
        Segment::Glob(tokens) => {
            let chars: Vec<char> = part.chars().collect();
            match_tokens(tokens, &chars)
        }
    }
}

/// Iterative wildcard match with single-star backtracking.
fn match_tokens(tokens: &[Token], text: &[char]) -> bool {
    let (mut t, mut c) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while c < text.len() {
        match tokens.get(t) {
            Some(Token::Char(expected)) if *expected == text[c] => {
                t += 1;
                c += 1;
            }
            Some(Token::One) => {
                t += 1;
                c += 1;
            }
            Some(Token::Many) => {
                star = Some((t, c));
                t += 1;
            }
            _ => match star {
                Some((star_t, star_c)) => {
                    t = star_t + 1;
                    c = star_c + 1;
                    star = Some((star_t, star_c + 1));
                }
                None => return false,
            },
        }
    }
    tokens[t..].iter().all(|tok| *tok == Token::Many)
}
