//! Scannerless parser combinators
//!
//! The grammar runs directly over the SQL text. Terminals skip leading
//! whitespace and comments, never consume input when they fail, and record
//! what they expected at the furthest position reached so a syntax error can
//! point at the right place.

use sqlinfer_core::Span;

/// Marker for a failed rule; the details live in the [`Cursor`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fail;

pub type PResult<T> = Result<T, Fail>;

/// A grammar rule
pub type Rule<T> = for<'c, 'a> fn(&'c mut Cursor<'a>) -> PResult<T>;

/// Words that cannot be used as bare identifiers or implicit aliases
const RESERVED: &[&str] = &[
    "ALL", "AND", "ANY", "ARRAY", "AS", "ASC", "ASYMMETRIC", "BETWEEN", "BOTH", "CASE", "CAST",
    "CHECK", "COLLATE", "COLUMN", "CONSTRAINT", "CREATE", "CROSS", "CURRENT_DATE",
    "CURRENT_TIME", "CURRENT_TIMESTAMP", "CURRENT_USER", "DEFAULT", "DEFERRABLE", "DESC",
    "DISTINCT", "DO", "ELSE", "END", "EXCEPT", "EXISTS", "FALSE", "FETCH", "FILTER", "FOR",
    "FOREIGN", "FROM", "FULL", "GRANT", "GROUP", "HAVING", "ILIKE", "IN", "INNER", "INTERSECT",
    "INTO", "IS", "ISNULL", "JOIN", "LATERAL", "LEADING", "LEFT", "LIKE", "LIMIT", "LOCALTIME",
    "LOCALTIMESTAMP", "NATURAL", "NOT", "NOTNULL", "NULL", "OFFSET", "ON", "ONLY", "OR",
    "ORDER", "OUTER", "OVER", "PLACING", "PRIMARY", "REFERENCES", "RETURNING", "RIGHT",
    "SELECT", "SESSION_USER", "SIMILAR", "SOME", "SYMMETRIC", "TABLE", "THEN", "TO",
    "TRAILING", "TRUE", "UNION", "UNIQUE", "USER", "USING", "VALUES", "VARIADIC", "WHEN",
    "WHERE", "WINDOW", "WITH",
];

/// Characters PostgreSQL accepts in operator tokens
const OPERATOR_CHARS: &[u8] = b"+-*/<>=~!@#%^&|`?";

/// Operator characters that allow a token to end in `+` or `-`
const OPERATOR_SPECIAL: &[u8] = b"~!@#%^&|`?";

pub fn is_reserved(word: &str) -> bool {
    RESERVED.iter().any(|kw| kw.eq_ignore_ascii_case(word))
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c >= 0x80
}

fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'$' || c >= 0x80
}

/// Deepest nesting of expressions and subqueries the grammar descends into
pub const MAX_DEPTH: usize = 50;

/// Input position plus the furthest-failure bookkeeping
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    src: &'a str,
    pos: usize,
    furthest: usize,
    expected: Vec<&'static str>,
    partial: bool,
    depth: usize,
    too_deep: Option<usize>,
}

impl<'a> Cursor<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            furthest: 0,
            expected: Vec::new(),
            partial: false,
            depth: 0,
            too_deep: None,
        }
    }

    /// Tolerate a known incomplete suffix (dangling comma, `t.` with no column)
    pub fn with_partial(mut self, partial: bool) -> Self {
        self.partial = partial;
        self
    }

    pub fn src(&self) -> &'a str {
        self.src
    }

    /// End of the last consumed token
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Move back to a position returned by [`Cursor::pos`]
    pub fn reset(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn is_partial(&self) -> bool {
        self.partial
    }

    /// Furthest position any rule failed at
    pub fn furthest(&self) -> usize {
        self.furthest
    }

    /// Labels expected at [`Cursor::furthest`], in the order first recorded
    pub fn expected(&self) -> &[&'static str] {
        &self.expected
    }

    /// Where nesting first went past [`MAX_DEPTH`], if it did
    pub fn too_deep(&self) -> Option<usize> {
        self.too_deep
    }

    fn bytes(&self) -> &'a [u8] {
        self.src.as_bytes()
    }

    fn byte_at(&self, pos: usize) -> Option<u8> {
        self.bytes().get(pos).copied()
    }

    /// Skip whitespace, `--` line comments and (nested) block comments
    pub fn skip_trivia(&mut self) {
        loop {
            match self.byte_at(self.pos) {
                Some(c) if c.is_ascii_whitespace() => self.pos += 1,
                Some(b'-') if self.byte_at(self.pos + 1) == Some(b'-') => {
                    while let Some(c) = self.byte_at(self.pos) {
                        if c == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                Some(b'/') if self.byte_at(self.pos + 1) == Some(b'*') => {
                    let mut depth = 0usize;
                    while self.pos < self.src.len() {
                        if self.bytes()[self.pos..].starts_with(b"/*") {
                            depth += 1;
                            self.pos += 2;
                        } else if self.bytes()[self.pos..].starts_with(b"*/") {
                            depth -= 1;
                            self.pos += 2;
                            if depth == 0 {
                                break;
                            }
                        } else {
                            self.pos += 1;
                        }
                    }
                }
                _ => return,
            }
        }
    }

    /// Start offset of the next token
    pub fn begin(&mut self) -> usize {
        self.skip_trivia();
        self.pos
    }

    /// Span from `start` to the end of the last consumed token
    pub fn span_from(&self, start: usize) -> Span {
        Span::new(start, self.pos.max(start))
    }

    pub fn at_end(&mut self) -> bool {
        let saved = self.pos;
        self.skip_trivia();
        let at_end = self.pos >= self.src.len();
        self.pos = saved;
        at_end
    }

    fn record(&mut self, pos: usize, label: &'static str) {
        if pos > self.furthest {
            self.furthest = pos;
            self.expected.clear();
        }
        if pos == self.furthest && !self.expected.contains(&label) {
            self.expected.push(label);
        }
    }

    /// Fail at the next token, recording `label` as expected there
    pub fn fail<T>(&mut self, label: &'static str) -> PResult<T> {
        let saved = self.pos;
        self.skip_trivia();
        let pos = self.pos;
        self.pos = saved;
        self.record(pos, label);
        Err(Fail)
    }

    // Combinators

    /// Run `rule`, restoring the position when it fails
    pub fn attempt<T>(&mut self, rule: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        let saved = self.pos;
        let result = rule(self);
        if result.is_err() {
            self.pos = saved;
        }
        result
    }

    /// Run `rule` one nesting level deeper.
    ///
    /// Past [`MAX_DEPTH`] the rule fails without running and the position is
    /// kept in [`Cursor::too_deep`]. From then on every nested rule fails, so
    /// backtracking stops quickly.
    pub fn nested<T>(&mut self, rule: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.too_deep.is_some() {
            return Err(Fail);
        }
        if self.depth >= MAX_DEPTH {
            self.too_deep = Some(self.begin());
            return Err(Fail);
        }
        self.depth += 1;
        let result = rule(self);
        self.depth -= 1;
        result
    }

    pub fn optional<T>(&mut self, rule: impl FnOnce(&mut Self) -> PResult<T>) -> Option<T> {
        self.attempt(rule).ok()
    }

    /// Zero or more repetitions
    pub fn star<T>(&mut self, mut rule: impl FnMut(&mut Self) -> PResult<T>) -> Vec<T> {
        let mut items = Vec::new();
        loop {
            let before = self.pos;
            match self.attempt(&mut rule) {
                Ok(item) if self.pos > before => items.push(item),
                Ok(item) => {
                    items.push(item);
                    break;
                }
                Err(_) => break,
            }
        }
        items
    }

    /// One or more repetitions
    pub fn plus<T>(&mut self, mut rule: impl FnMut(&mut Self) -> PResult<T>) -> PResult<Vec<T>> {
        let first = self.attempt(&mut rule)?;
        let mut items = vec![first];
        items.extend(self.star(rule));
        Ok(items)
    }

    /// Ordered choice: the first alternative that matches wins
    pub fn first_of<T>(&mut self, alternatives: &[Rule<T>]) -> PResult<T> {
        for alternative in alternatives {
            if let Ok(value) = self.attempt(|c| alternative(c)) {
                return Ok(value);
            }
        }
        Err(Fail)
    }

    /// `item (sep item)*`. In partial mode a dangling separator is accepted.
    pub fn separated<T>(
        &mut self,
        sep: &'static str,
        mut item: impl FnMut(&mut Self) -> PResult<T>,
    ) -> PResult<Vec<T>> {
        let mut items = vec![self.attempt(&mut item)?];
        loop {
            let saved = self.pos;
            if self.punct(sep).is_err() {
                break;
            }
            match self.attempt(&mut item) {
                Ok(next) => items.push(next),
                Err(_) if self.partial => break,
                Err(_) => {
                    self.pos = saved;
                    break;
                }
            }
        }
        Ok(items)
    }

    /// Parse `prefix`, then at most one of `switches` applied to it.
    ///
    /// The prefix is parsed once; a switch either extends it into a longer
    /// form or fails, leaving the prefix as the result.
    pub fn node_or_switch<T, S>(
        &mut self,
        prefix: T,
        switches: &[Rule<S>],
        apply: impl FnOnce(T, S, &Self) -> T,
    ) -> T {
        match self.first_of(switches) {
            Ok(suffix) => apply(prefix, suffix, self),
            Err(_) => prefix,
        }
    }

    // Terminals

    fn terminal<T>(
        &mut self,
        label: &'static str,
        scan: impl FnOnce(&mut Self) -> Option<T>,
    ) -> PResult<T> {
        let saved = self.pos;
        self.skip_trivia();
        let start = self.pos;
        match scan(self) {
            Some(value) => Ok(value),
            None => {
                self.pos = saved;
                self.record(start, label);
                Err(Fail)
            }
        }
    }

    fn word_end(&self, from: usize) -> usize {
        let mut end = from;
        while self.byte_at(end).is_some_and(is_ident_char) {
            end += 1;
        }
        end
    }

    /// A single keyword, case-insensitive, not followed by an identifier character
    pub fn keyword(&mut self, kw: &'static str) -> PResult<Span> {
        self.terminal(kw, |c| {
            let start = c.pos;
            let end = start + kw.len();
            let matches = c
                .src
                .get(start..end)
                .is_some_and(|text| text.eq_ignore_ascii_case(kw))
                && !c.byte_at(end).is_some_and(is_ident_char);
            if matches {
                c.pos = end;
                Some(Span::new(start, end))
            } else {
                None
            }
        })
    }

    /// A sequence of keywords, e.g. `ORDER BY`
    pub fn keywords(&mut self, kws: &[&'static str]) -> PResult<Span> {
        self.attempt(|c| {
            let start = c.begin();
            for kw in kws {
                c.keyword(*kw)?;
            }
            Ok(c.span_from(start))
        })
    }

    /// The first keyword of `kws` that matches
    pub fn one_of_keywords(&mut self, kws: &[&'static str]) -> PResult<(&'static str, Span)> {
        for kw in kws {
            if let Ok(span) = self.keyword(*kw) {
                return Ok((*kw, span));
            }
        }
        Err(Fail)
    }

    pub fn peek_keyword(&mut self, kw: &'static str) -> bool {
        let saved = self.pos;
        let found = self.keyword(kw).is_ok();
        self.pos = saved;
        found
    }

    /// Literal punctuation: `(`, `)`, `,`, `.`, `[`, `]`, `::`, `:`, `;`
    pub fn punct(&mut self, p: &'static str) -> PResult<Span> {
        self.terminal(p, |c| {
            let start = c.pos;
            if !c.bytes()[start..].starts_with(p.as_bytes()) {
                return None;
            }
            let end = start + p.len();
            // `:` must not be the start of `::`, `.` must not start a number
            let clash = match p {
                ":" => c.byte_at(end) == Some(b':'),
                "." => c.byte_at(end).is_some_and(|b| b.is_ascii_digit()),
                _ => false,
            };
            if clash {
                return None;
            }
            c.pos = end;
            Some(Span::new(start, end))
        })
    }

    /// Whether a query starts here, possibly behind opening parentheses.
    /// Leaves the position and the expected labels untouched.
    pub fn peek_query(&mut self) -> bool {
        let saved = (self.pos, self.furthest, self.expected.clone());
        while self.punct("(").is_ok() {}
        let found = ["SELECT", "WITH", "VALUES"]
            .iter()
            .any(|kw| self.peek_keyword(kw));
        (self.pos, self.furthest, self.expected) = saved;
        found
    }

    pub fn peek_punct(&mut self, p: &'static str) -> bool {
        let saved = self.pos;
        let found = self.punct(p).is_ok();
        self.pos = saved;
        found
    }

    /// An operator token read with maximal munch.
    ///
    /// A multi-character operator cannot end in `+` or `-` unless it also
    /// contains one of `~ ! @ # % ^ & | \` ?`, and never contains the start
    /// of a comment. `!=` is normalized to `<>`.
    pub fn operator_token(&mut self) -> PResult<(String, Span)> {
        self.terminal("operator", |c| {
            let start = c.pos;
            let mut end = start;
            while let Some(b) = c.byte_at(end) {
                let next = c.byte_at(end + 1);
                let comment = (b == b'-' && next == Some(b'-')) || (b == b'/' && next == Some(b'*'));
                if !OPERATOR_CHARS.contains(&b) || comment {
                    break;
                }
                end += 1;
            }
            if end == start {
                return None;
            }

            let mut text = &c.src[start..end];
            if text.len() > 1 && !text.bytes().any(|b| OPERATOR_SPECIAL.contains(&b)) {
                while text.len() > 1 && (text.ends_with('+') || text.ends_with('-')) {
                    text = &text[..text.len() - 1];
                }
            }
            let end = start + text.len();
            c.pos = end;
            let op = if text == "!=" { "<>" } else { text };
            Some((op.to_string(), Span::new(start, end)))
        })
    }

    /// An operator token equal to `op`
    pub fn symbol(&mut self, op: &'static str) -> PResult<Span> {
        let saved = self.pos;
        match self.operator_token() {
            Ok((text, span)) if text == op => Ok(span),
            _ => {
                self.pos = saved;
                self.fail(op)
            }
        }
    }

    /// A bare word as written, including reserved words
    pub fn word(&mut self) -> PResult<(String, Span)> {
        self.terminal("word", |c| {
            let start = c.pos;
            if !c.byte_at(start).is_some_and(is_ident_start) {
                return None;
            }
            let end = c.word_end(start);
            c.pos = end;
            Some((c.src[start..end].to_string(), Span::new(start, end)))
        })
    }

    fn quoted_identifier(&mut self) -> Option<(String, Span)> {
        let start = self.pos;
        if self.byte_at(start) != Some(b'"') {
            return None;
        }
        let mut value = String::new();
        let mut i = start + 1;
        loop {
            let rest = &self.src[i..];
            let close = rest.find('"')?;
            value.push_str(&rest[..close]);
            i += close + 1;
            if self.byte_at(i) == Some(b'"') {
                value.push('"');
                i += 1;
            } else {
                break;
            }
        }
        self.pos = i;
        Some((value, Span::new(start, i)))
    }

    fn unquoted_identifier(&mut self, allow_reserved: bool) -> Option<(String, Span)> {
        let start = self.pos;
        if !self.byte_at(start).is_some_and(is_ident_start) {
            return None;
        }
        let end = self.word_end(start);
        let text = &self.src[start..end];
        if !allow_reserved && is_reserved(text) {
            return None;
        }
        self.pos = end;
        Some((text.to_lowercase(), Span::new(start, end)))
    }

    /// An identifier: unquoted names fold to lowercase, quoted names keep case.
    /// Returns `(value, quoted, span)`.
    pub fn identifier(&mut self) -> PResult<(String, bool, Span)> {
        self.terminal("identifier", |c| {
            if let Some((value, span)) = c.quoted_identifier() {
                return Some((value, true, span));
            }
            c.unquoted_identifier(false)
                .map(|(value, span)| (value, false, span))
        })
    }

    /// An identifier where reserved words are allowed (after `.` or `AS`)
    pub fn label(&mut self) -> PResult<(String, bool, Span)> {
        self.terminal("identifier", |c| {
            if let Some((value, span)) = c.quoted_identifier() {
                return Some((value, true, span));
            }
            c.unquoted_identifier(true)
                .map(|(value, span)| (value, false, span))
        })
    }

    /// Numeric literal: `42`, `3.14`, `.5`, `1e-3`
    pub fn number(&mut self) -> PResult<(String, Span)> {
        self.terminal("number", |c| {
            let start = c.pos;
            let mut end = start;
            let mut digits = 0;
            while c.byte_at(end).is_some_and(|b| b.is_ascii_digit()) {
                end += 1;
                digits += 1;
            }
            if c.byte_at(end) == Some(b'.') && c.byte_at(end + 1) != Some(b'.') {
                let mut frac = end + 1;
                while c.byte_at(frac).is_some_and(|b| b.is_ascii_digit()) {
                    frac += 1;
                    digits += 1;
                }
                end = frac;
            }
            if digits == 0 {
                return None;
            }
            if matches!(c.byte_at(end), Some(b'e' | b'E')) {
                let mut exp = end + 1;
                if matches!(c.byte_at(exp), Some(b'+' | b'-')) {
                    exp += 1;
                }
                if c.byte_at(exp).is_some_and(|b| b.is_ascii_digit()) {
                    while c.byte_at(exp).is_some_and(|b| b.is_ascii_digit()) {
                        exp += 1;
                    }
                    end = exp;
                }
            }
            if c.byte_at(end).is_some_and(is_ident_start) {
                return None;
            }
            c.pos = end;
            Some((c.src[start..end].to_string(), Span::new(start, end)))
        })
    }

    fn quoted_body(&mut self, escapes: bool) -> Option<String> {
        let mut value = String::new();
        let mut i = self.pos + 1;
        loop {
            let b = self.byte_at(i)?;
            match b {
                b'\'' if self.byte_at(i + 1) == Some(b'\'') => {
                    value.push('\'');
                    i += 2;
                }
                b'\'' => {
                    i += 1;
                    break;
                }
                b'\\' if escapes => {
                    let next = self.src[i + 1..].chars().next()?;
                    value.push(match next {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        'b' => '\u{8}',
                        'f' => '\u{c}',
                        other => other,
                    });
                    i += 1 + next.len_utf8();
                }
                _ => {
                    let ch = self.src[i..].chars().next()?;
                    value.push(ch);
                    i += ch.len_utf8();
                }
            }
        }
        self.pos = i;
        Some(value)
    }

    /// String literal: `'it''s'` or `E'line\n'`
    pub fn string(&mut self) -> PResult<(String, Span)> {
        self.terminal("string", |c| {
            let start = c.pos;
            let escapes = matches!(c.byte_at(start), Some(b'e' | b'E'))
                && c.byte_at(start + 1) == Some(b'\'');
            if escapes {
                c.pos += 1;
            }
            if c.byte_at(c.pos) != Some(b'\'') {
                c.pos = start;
                return None;
            }
            match c.quoted_body(escapes) {
                Some(value) => Some((value, Span::new(start, c.pos))),
                None => {
                    c.pos = start;
                    None
                }
            }
        })
    }

    /// `$name`, `$name!`, `$$name`. Returns `(name, spread, required, span)`;
    /// the pick list of a spread is parsed by the grammar.
    pub fn param(&mut self) -> PResult<(String, bool, bool, Span)> {
        self.terminal("parameter", |c| {
            let start = c.pos;
            if c.byte_at(start) != Some(b'$') {
                return None;
            }
            let spread = c.byte_at(start + 1) == Some(b'$');
            let name_start = if spread { start + 2 } else { start + 1 };
            if !c.byte_at(name_start).is_some_and(is_ident_start) {
                return None;
            }
            let mut end = name_start;
            while c
                .byte_at(end)
                .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_')
            {
                end += 1;
            }
            let name = c.src[name_start..end].to_string();
            let required = c.byte_at(end) == Some(b'!') && c.byte_at(end + 1) != Some(b'=');
            if required {
                end += 1;
            }
            c.pos = end;
            Some((name, spread, required, Span::new(start, end)))
        })
    }
}
