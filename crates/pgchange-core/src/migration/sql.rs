//! Splitting a migration body into individual statements.
//!
//! Semicolons only terminate a statement at the top level: inside quoted
//! literals, quoted identifiers, comments and `$tag$` bodies they are kept.

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Normal,
    /// `escapes` is set for `E'...'` literals, where `\` escapes the next char.
    SingleQuote { escapes: bool },
    DoubleQuote,
    LineComment,
    BlockComment(usize),
    DollarQuote(String),
}

/// Split SQL into statements, dropping empty and comment-only fragments.
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut state = State::Normal;
    let chars: Vec<char> = sql.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match &mut state {
            State::Normal => match c {
                ';' => {
                    push_statement(&mut statements, &current);
                    current.clear();
                    i += 1;
                    continue;
                }
                '\'' => {
                    state = State::SingleQuote {
                        escapes: opens_escape_string(&chars[..i]),
                    }
                }
                '"' => state = State::DoubleQuote,
                '-' if next == Some('-') => {
                    state = State::LineComment;
                    current.push_str("--");
                    i += 2;
                    continue;
                }
                '/' if next == Some('*') => {
                    state = State::BlockComment(1);
                    current.push_str("/*");
                    i += 2;
                    continue;
                }
                '$' => {
                    if let Some(tag) = dollar_tag(&chars[i..]) {
                        i += tag.chars().count();
                        current.push_str(&tag);
                        state = State::DollarQuote(tag);
                        continue;
                    }
                }
                _ => {}
            },
            State::SingleQuote { escapes } => {
                if *escapes && c == '\\' {
                    current.push(c);
                    if let Some(escaped) = next {
                        current.push(escaped);
                    }
                    i += 2;
                    continue;
                }
                // '' is an escaped quote, not the end of the literal
                if c == '\'' {
                    if next == Some('\'') {
                        current.push_str("''");
                        i += 2;
                        continue;
                    }
                    state = State::Normal;
                }
            }
            State::DoubleQuote => {
                if c == '"' {
                    state = State::Normal;
                }
            }
            State::LineComment => {
                if c == '\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if c == '/' && next == Some('*') {
                    *depth += 1;
                    current.push_str("/*");
                    i += 2;
                    continue;
                }
                if c == '*' && next == Some('/') {
                    *depth -= 1;
                    if *depth == 0 {
                        state = State::Normal;
                    }
                    current.push_str("*/");
                    i += 2;
                    continue;
                }
            }
            State::DollarQuote(tag) => {
                if c == '$' && starts_with(&chars[i..], tag) {
                    let len = tag.chars().count();
                    current.push_str(tag);
                    state = State::Normal;
                    i += len;
                    continue;
                }
            }
        }

        current.push(c);
        i += 1;
    }

    push_statement(&mut statements, &current);
    statements
}

/// Whether a quote following `before` starts an `E'...'` escape string.
fn opens_escape_string(before: &[char]) -> bool {
    match before {
        [.., prev, e] if *e == 'E' || *e == 'e' => {
            !(prev.is_alphanumeric() || *prev == '_')
        }
        [e] => *e == 'E' || *e == 'e',
        _ => false,
    }
}

/// Match `$$` or `$tag$` at the start of `chars`.
fn dollar_tag(chars: &[char]) -> Option<String> {
    let mut tag = String::from("$");
    for (idx, &c) in chars.iter().enumerate().skip(1) {
        if c == '$' {
            tag.push('$');
            return Some(tag);
        }
        let valid = if idx == 1 {
            c.is_alphabetic() || c == '_'
        } else {
            c.is_alphanumeric() || c == '_'
        };
        if !valid {
            return None;
        }
        tag.push(c);
    }
    None
}

fn starts_with(chars: &[char], prefix: &str) -> bool {
    let mut it = chars.iter();
    prefix.chars().all(|p| it.next() == Some(&p))
}

fn push_statement(statements: &mut Vec<String>, fragment: &str) {
    let statement = fragment.trim();
    if statement.is_empty() || is_comment_only(statement) {
        return;
    }
    statements.push(statement.to_string());
}

fn is_comment_only(statement: &str) -> bool {
    let mut rest = statement.trim_start();
    loop {
        if rest.is_empty() {
            return true;
        }
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.split_once('\n').map(|(_, r)| r).unwrap_or("").trim_start();
        } else if let Some(after) = rest.strip_prefix("/*") {
            match after.find("*/") {
                Some(end) => rest = after[end + 2..].trim_start(),
                None => return true,
            }
        } else {
            return false;
        }
    }
}
