// glob.rs — Minimal glob matching for permission path patterns.
//
// Supported syntax:
//   *      — any run of characters except '/'
//   **     — any run of characters including '/' (an immediately
//            following '/' is absorbed, so "a/**/b" matches "a/b")
//   ?      — exactly one non-'/' character
//   [abc]  — character class; [a-z] ranges and [!abc]/[^abc] negation
//   other  — literal
//
// Matching is UNANCHORED substring search against the forward-slash
// normalized path: "05-reviewer2/*-report.yaml" hits regardless of any
// leading directory components.

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    tokens: Vec<Token>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// `*` — non-separator run.
    Star,
    /// `**` — any run.
    Globstar,
    /// `?` — one non-separator character.
    AnyChar,
    /// `[...]` — one character from (or outside) the set.
    Class { negated: bool, spec: Vec<ClassItem> },
    Literal(char),
}

#[derive(Debug, Clone, PartialEq)]
enum ClassItem {
    Char(char),
    Range(char, char),
}

impl GlobPattern {
    /// Compile a pattern. Compilation is total: malformed constructs
    /// (an unclosed '[') degrade to literals rather than failing.
    pub fn compile(pattern: &str) -> Self {
        let chars: Vec<char> = pattern.chars().collect();
        let mut tokens = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '*' => {
                    if chars.get(i + 1) == Some(&'*') {
                        tokens.push(Token::Globstar);
                        i += 2;
                        // Absorb the separator after "**" so "a/**/b"
                        // also matches "a/b".
                        if chars.get(i) == Some(&'/') {
                            i += 1;
                        }
                    } else {
                        tokens.push(Token::Star);
                        i += 1;
                    }
                }
                '?' => {
                    tokens.push(Token::AnyChar);
                    i += 1;
                }
                '[' => match parse_class(&chars, i) {
                    Some((token, next)) => {
                        tokens.push(token);
                        i = next;
                    }
                    None => {
                        tokens.push(Token::Literal('['));
                        i += 1;
                    }
                },
                ch => {
                    tokens.push(Token::Literal(ch));
                    i += 1;
                }
            }
        }

        Self { tokens }
    }

    /// Match against a path. Backslashes are normalized to forward
    /// slashes first; the match may begin and end anywhere in the path.
    pub fn is_match(&self, path: &str) -> bool {
        let normalized = path.replace('\\', "/");
        let chars: Vec<char> = normalized.chars().collect();
        // Unanchored: try every start offset.
        (0..=chars.len()).any(|start| match_from(&self.tokens, &chars[start..]))
    }
}

/// Convenience wrapper: compile and match in one call.
pub fn matches(pattern: &str, path: &str) -> bool {
    GlobPattern::compile(pattern).is_match(path)
}

/// Parse a character class starting at `open` (the '[' index).
/// Returns the token and the index just past the closing ']'.
fn parse_class(chars: &[char], open: usize) -> Option<(Token, usize)> {
    let mut i = open + 1;
    let negated = matches!(chars.get(i), Some('!') | Some('^'));
    if negated {
        i += 1;
    }

    let mut spec = Vec::new();
    while i < chars.len() && chars[i] != ']' {
        if chars.get(i + 1) == Some(&'-') && chars.get(i + 2).is_some_and(|c| *c != ']') {
            spec.push(ClassItem::Range(chars[i], chars[i + 2]));
            i += 3;
        } else {
            spec.push(ClassItem::Char(chars[i]));
            i += 1;
        }
    }

    if i >= chars.len() || spec.is_empty() {
        return None; // unclosed or empty class
    }
    Some((Token::Class { negated, spec }, i + 1))
}

fn class_matches(negated: bool, spec: &[ClassItem], ch: char) -> bool {
    let hit = spec.iter().any(|item| match item {
        ClassItem::Char(c) => *c == ch,
        ClassItem::Range(lo, hi) => (*lo..=*hi).contains(&ch),
    });
    hit != negated
}

/// Recursive matcher: do the tokens match some prefix of `text`?
/// An exhausted token list is a match wherever the text stands — the
/// unanchored tail mirrors an unanchored regex `test()`.
fn match_from(tokens: &[Token], text: &[char]) -> bool {
    let Some((first, rest)) = tokens.split_first() else {
        return true;
    };

    match first {
        Token::Literal(expected) => {
            text.first() == Some(expected) && match_from(rest, &text[1..])
        }
        Token::AnyChar => text
            .first()
            .is_some_and(|ch| *ch != '/' && match_from(rest, &text[1..])),
        Token::Class { negated, spec } => text
            .first()
            .is_some_and(|ch| class_matches(*negated, spec, *ch) && match_from(rest, &text[1..])),
        Token::Star => {
            // Consume 0..n non-separator characters.
            let run = text.iter().take_while(|ch| **ch != '/').count();
            (0..=run).any(|taken| match_from(rest, &text[taken..]))
        }
        Token::Globstar => {
            // Consume 0..n characters of any kind.
            (0..=text.len()).any(|taken| match_from(rest, &text[taken..]))
        }
    }
}
