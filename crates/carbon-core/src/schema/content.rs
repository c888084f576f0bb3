//! Content grammar compiler and the [`ContentMatch`] automaton.
//!
//! A node type declares its allowed children as a regular-expression-like
//! pattern over child type names and group names, e.g. `"title content*"`
//! or `"(paragraph | section)+"`. At schema build time the pattern is
//! compiled into a small epsilon-NFA whose transitions are labelled with the
//! concrete type ids a name resolves to. Matching is greedy left-to-right;
//! wherever several completions are possible the first declared alternative
//! wins, so auto-repair stays deterministic and idempotent.

use crate::schema::{NodeTypeId, SchemaError};
use std::collections::{BTreeSet, VecDeque};

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Name(String),
    Seq(Vec<Expr>),
    Choice(Vec<Expr>),
    Star(Box<Expr>),
    Plus(Box<Expr>),
    Opt(Box<Expr>),
    Empty,
}

/// One symbol transition: the declared name, the type ids it matches, and
/// the id used when synthesizing filler content (first group member).
#[derive(Debug, Clone)]
struct Transition {
    types: Vec<NodeTypeId>,
    fill: NodeTypeId,
    to: usize,
}

#[derive(Debug, Clone, Default)]
struct NfaState {
    eps: Vec<usize>,
    trans: Vec<Transition>,
}

/// Compiled checker/filler for one node type's allowed children.
#[derive(Debug, Clone)]
pub struct ContentMatch {
    states: Vec<NfaState>,
    start: usize,
    accept: usize,
}

/// How far auto-repair will search for a completion before giving up.
/// Real grammars need one or two synthesized children, never more.
const MAX_FILL: usize = 8;

impl ContentMatch {
    /// Compiles a grammar string. `resolve` maps a child name or group name
    /// to the type ids it stands for, in declaration order.
    pub(crate) fn compile(
        owner: &str,
        grammar: &str,
        resolve: &dyn Fn(&str) -> Option<Vec<NodeTypeId>>,
    ) -> Result<Self, SchemaError> {
        let expr = parse(owner, grammar)?;
        let mut builder = Builder {
            owner,
            resolve,
            states: vec![NfaState::default()],
        };
        let start = 0;
        let accept = builder.build(&expr, start)?;
        Ok(ContentMatch {
            states: builder.states,
            start,
            accept,
        })
    }

    /// True when the full child sequence satisfies the grammar.
    pub fn validate(&self, seq: &[NodeTypeId]) -> bool {
        match self.run(seq) {
            Some(set) => self.accepts(&set),
            None => false,
        }
    }

    /// True when `next` may follow the given (valid-so-far) sequence,
    /// possibly with more children after it.
    pub fn can_append(&self, seq: &[NodeTypeId], next: NodeTypeId) -> bool {
        match self.run(seq) {
            Some(set) => !self.step(&set, next).is_empty(),
            None => false,
        }
    }

    /// Minimal child types to append so the sequence becomes valid.
    /// `None` when no completion exists (the sequence is unrepairable by
    /// appending); `Some(vec![])` when it is already valid.
    pub fn fill_after(&self, seq: &[NodeTypeId]) -> Option<Vec<NodeTypeId>> {
        let set = self.run(seq)?;
        self.search_completion(set)
    }

    /// Minimal child types to prepend so that `prefix ++ seq` is valid.
    pub fn fill_before(&self, seq: &[NodeTypeId]) -> Option<Vec<NodeTypeId>> {
        let start = self.closure(vec![self.start]);
        // Breadth-first over prefixes, shortest first; transition order
        // keeps the first declared alternative ahead at equal length.
        let mut queue = VecDeque::from([(start, Vec::new())]);
        let mut seen: BTreeSet<Vec<usize>> = BTreeSet::new();
        while let Some((set, prefix)) = queue.pop_front() {
            if let Some(end) = self.run_from(set.clone(), seq) {
                if self.accepts(&end) {
                    return Some(prefix);
                }
            }
            if prefix.len() >= MAX_FILL {
                continue;
            }
            for fill in self.candidate_fills(&set) {
                let stepped = self.step(&set, fill);
                if stepped.is_empty() || !seen.insert(stepped.clone()) {
                    continue;
                }
                let mut longer = prefix.clone();
                longer.push(fill);
                queue.push_back((stepped, longer));
            }
        }
        None
    }

    fn search_completion(&self, set: Vec<usize>) -> Option<Vec<NodeTypeId>> {
        let mut queue = VecDeque::from([(set, Vec::new())]);
        let mut seen: BTreeSet<Vec<usize>> = BTreeSet::new();
        while let Some((set, suffix)) = queue.pop_front() {
            if self.accepts(&set) {
                return Some(suffix);
            }
            if suffix.len() >= MAX_FILL {
                continue;
            }
            for fill in self.candidate_fills(&set) {
                let stepped = self.step(&set, fill);
                if stepped.is_empty() || !seen.insert(stepped.clone()) {
                    continue;
                }
                let mut longer = suffix.clone();
                longer.push(fill);
                queue.push_back((stepped, longer));
            }
        }
        None
    }

    /// Filler candidates reachable from the set, in declaration order.
    fn candidate_fills(&self, set: &[usize]) -> Vec<NodeTypeId> {
        let mut out = Vec::new();
        for &state in set {
            for t in &self.states[state].trans {
                if !out.contains(&t.fill) {
                    out.push(t.fill);
                }
            }
        }
        out
    }

    fn run(&self, seq: &[NodeTypeId]) -> Option<Vec<usize>> {
        self.run_from(self.closure(vec![self.start]), seq)
    }

    fn run_from(&self, mut set: Vec<usize>, seq: &[NodeTypeId]) -> Option<Vec<usize>> {
        for &sym in seq {
            set = self.step(&set, sym);
            if set.is_empty() {
                return None;
            }
        }
        Some(set)
    }

    fn accepts(&self, set: &[usize]) -> bool {
        set.contains(&self.accept)
    }

    fn step(&self, set: &[usize], sym: NodeTypeId) -> Vec<usize> {
        let mut next = Vec::new();
        for &state in set {
            for t in &self.states[state].trans {
                if t.types.contains(&sym) && !next.contains(&t.to) {
                    next.push(t.to);
                }
            }
        }
        self.closure(next)
    }

    /// Epsilon closure preserving discovery order, so declaration order of
    /// alternatives survives into candidate enumeration.
    fn closure(&self, seed: Vec<usize>) -> Vec<usize> {
        let mut out = seed;
        let mut i = 0;
        while i < out.len() {
            let state = out[i];
            for &eps in &self.states[state].eps {
                if !out.contains(&eps) {
                    out.push(eps);
                }
            }
            i += 1;
        }
        out
    }
}

struct Builder<'a> {
    owner: &'a str,
    resolve: &'a dyn Fn(&str) -> Option<Vec<NodeTypeId>>,
    states: Vec<NfaState>,
}

impl<'a> Builder<'a> {
    fn fresh(&mut self) -> usize {
        self.states.push(NfaState::default());
        self.states.len() - 1
    }

    /// Thompson construction; returns the exit state of the fragment.
    fn build(&mut self, expr: &Expr, from: usize) -> Result<usize, SchemaError> {
        match expr {
            Expr::Empty => {
                let to = self.fresh();
                self.states[from].eps.push(to);
                Ok(to)
            }
            Expr::Name(name) => {
                let types = (self.resolve)(name).ok_or_else(|| SchemaError::UnknownName {
                    owner: self.owner.to_string(),
                    name: name.clone(),
                })?;
                if types.is_empty() {
                    return Err(SchemaError::UnknownName {
                        owner: self.owner.to_string(),
                        name: name.clone(),
                    });
                }
                let to = self.fresh();
                let fill = types[0];
                self.states[from].trans.push(Transition { types, fill, to });
                Ok(to)
            }
            Expr::Seq(items) => {
                let mut at = from;
                for item in items {
                    at = self.build(item, at)?;
                }
                Ok(at)
            }
            Expr::Choice(alts) => {
                let to = self.fresh();
                for alt in alts {
                    let enter = self.fresh();
                    self.states[from].eps.push(enter);
                    let exit = self.build(alt, enter)?;
                    self.states[exit].eps.push(to);
                }
                Ok(to)
            }
            Expr::Star(inner) => {
                let enter = self.fresh();
                let to = self.fresh();
                self.states[from].eps.push(enter);
                self.states[from].eps.push(to);
                let exit = self.build(inner, enter)?;
                self.states[exit].eps.push(enter);
                self.states[exit].eps.push(to);
                Ok(to)
            }
            Expr::Plus(inner) => {
                let enter = self.fresh();
                let to = self.fresh();
                self.states[from].eps.push(enter);
                let exit = self.build(inner, enter)?;
                self.states[exit].eps.push(enter);
                self.states[exit].eps.push(to);
                Ok(to)
            }
            Expr::Opt(inner) => {
                let to = self.fresh();
                let exit = self.build(inner, from)?;
                self.states[exit].eps.push(to);
                self.states[from].eps.push(to);
                Ok(to)
            }
        }
    }
}

// Grammar expression parser: sequence of postfix-modified atoms, `|` for
// alternation (lowest precedence), parentheses for grouping.

fn parse(owner: &str, src: &str) -> Result<Expr, SchemaError> {
    let tokens = tokenize(owner, src)?;
    let mut cursor = 0;
    let expr = parse_choice(owner, &tokens, &mut cursor)?;
    if cursor != tokens.len() {
        return Err(SchemaError::Grammar {
            owner: owner.to_string(),
            message: format!("unexpected token {:?}", tokens[cursor]),
        });
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Name(String),
    Open,
    Close,
    Pipe,
    Star,
    Plus,
    Question,
}

fn tokenize(owner: &str, src: &str) -> Result<Vec<Token>, SchemaError> {
    let mut out = Vec::new();
    let mut chars = src.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' => {
                chars.next();
            }
            '(' => {
                chars.next();
                out.push(Token::Open);
            }
            ')' => {
                chars.next();
                out.push(Token::Close);
            }
            '|' => {
                chars.next();
                out.push(Token::Pipe);
            }
            '*' => {
                chars.next();
                out.push(Token::Star);
            }
            '+' => {
                chars.next();
                out.push(Token::Plus);
            }
            '?' => {
                chars.next();
                out.push(Token::Question);
            }
            c if c.is_ascii_alphanumeric() || c == '_' || c == '-' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push(Token::Name(name));
            }
            other => {
                return Err(SchemaError::Grammar {
                    owner: owner.to_string(),
                    message: format!("unexpected character {other:?}"),
                });
            }
        }
    }
    Ok(out)
}

fn parse_choice(owner: &str, tokens: &[Token], cursor: &mut usize) -> Result<Expr, SchemaError> {
    let first = parse_seq(owner, tokens, cursor)?;
    if tokens.get(*cursor) != Some(&Token::Pipe) {
        return Ok(first);
    }
    let mut alts = vec![first];
    while tokens.get(*cursor) == Some(&Token::Pipe) {
        *cursor += 1;
        alts.push(parse_seq(owner, tokens, cursor)?);
    }
    Ok(Expr::Choice(alts))
}

fn parse_seq(owner: &str, tokens: &[Token], cursor: &mut usize) -> Result<Expr, SchemaError> {
    let mut items = Vec::new();
    loop {
        match tokens.get(*cursor) {
            Some(Token::Name(_)) | Some(Token::Open) => {
                items.push(parse_atom(owner, tokens, cursor)?);
            }
            _ => break,
        }
    }
    match items.pop() {
        None => Ok(Expr::Empty),
        Some(single) if items.is_empty() => Ok(single),
        Some(last) => {
            items.push(last);
            Ok(Expr::Seq(items))
        }
    }
}

fn parse_atom(owner: &str, tokens: &[Token], cursor: &mut usize) -> Result<Expr, SchemaError> {
    let mut expr = match tokens.get(*cursor) {
        Some(Token::Name(name)) => {
            *cursor += 1;
            Expr::Name(name.clone())
        }
        Some(Token::Open) => {
            *cursor += 1;
            let inner = parse_choice(owner, tokens, cursor)?;
            if tokens.get(*cursor) != Some(&Token::Close) {
                return Err(SchemaError::Grammar {
                    owner: owner.to_string(),
                    message: "unbalanced parenthesis".to_string(),
                });
            }
            *cursor += 1;
            inner
        }
        other => {
            return Err(SchemaError::Grammar {
                owner: owner.to_string(),
                message: format!("expected name or group, found {other:?}"),
            });
        }
    };
    loop {
        match tokens.get(*cursor) {
            Some(Token::Star) => {
                *cursor += 1;
                expr = Expr::Star(Box::new(expr));
            }
            Some(Token::Plus) => {
                *cursor += 1;
                expr = Expr::Plus(Box::new(expr));
            }
            Some(Token::Question) => {
                *cursor += 1;
                expr = Expr::Opt(Box::new(expr));
            }
            _ => break,
        }
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TITLE: NodeTypeId = NodeTypeId(0);
    const PARA: NodeTypeId = NodeTypeId(1);
    const SECTION: NodeTypeId = NodeTypeId(2);
    const TEXT: NodeTypeId = NodeTypeId(3);

    fn resolve(name: &str) -> Option<Vec<NodeTypeId>> {
        match name {
            "title" => Some(vec![TITLE]),
            "paragraph" => Some(vec![PARA]),
            "section" => Some(vec![SECTION]),
            "text" => Some(vec![TEXT]),
            // `content` is a group: paragraph was declared before section.
            "content" => Some(vec![PARA, SECTION]),
            _ => None,
        }
    }

    fn compile(grammar: &str) -> ContentMatch {
        ContentMatch::compile("test", grammar, &resolve).unwrap()
    }

    #[test]
    fn empty_grammar_allows_no_children() {
        let m = compile("");
        assert!(m.validate(&[]));
        assert!(!m.validate(&[TEXT]));
        assert!(!m.can_append(&[], TEXT));
    }

    #[test]
    fn sequence_with_repetition() {
        let m = compile("title content*");
        assert!(m.validate(&[TITLE]));
        assert!(m.validate(&[TITLE, PARA, SECTION, PARA]));
        assert!(!m.validate(&[PARA]));
        assert!(!m.validate(&[]));
    }

    #[test]
    fn can_append_respects_position() {
        let m = compile("title content*");
        assert!(m.can_append(&[], TITLE));
        assert!(!m.can_append(&[], PARA));
        assert!(m.can_append(&[TITLE], PARA));
        assert!(!m.can_append(&[TITLE], TITLE));
        assert!(!m.can_append(&[TITLE], TEXT));
    }

    #[test]
    fn fill_after_synthesizes_minimal_completion() {
        let m = compile("title content*");
        assert_eq!(m.fill_after(&[]), Some(vec![TITLE]));
        assert_eq!(m.fill_after(&[TITLE]), Some(vec![]));
        // A sequence starting with paragraph can never be completed by
        // appending, because title must come first.
        assert_eq!(m.fill_after(&[PARA]), None);
    }

    #[test]
    fn fill_after_prefers_first_alternative() {
        let m = compile("(paragraph | section)+");
        assert_eq!(m.fill_after(&[]), Some(vec![PARA]));
    }

    #[test]
    fn group_fill_uses_first_declared_member() {
        let m = compile("title content+");
        assert_eq!(m.fill_after(&[TITLE]), Some(vec![PARA]));
    }

    #[test]
    fn fill_before_prepends_required_prefix() {
        let m = compile("title content*");
        assert_eq!(m.fill_before(&[PARA]), Some(vec![TITLE]));
        assert_eq!(m.fill_before(&[TITLE]), Some(vec![]));
        assert_eq!(m.fill_before(&[TEXT]), None);
    }

    #[test]
    fn fill_is_idempotent_on_valid_content() {
        let m = compile("title content*");
        let filled = m.fill_after(&[]).unwrap();
        assert!(m.validate(&filled));
        assert_eq!(m.fill_after(&filled), Some(vec![]));
    }

    #[test]
    fn optional_and_nested_groups() {
        let m = compile("title? (paragraph | section)*");
        assert!(m.validate(&[]));
        assert!(m.validate(&[TITLE]));
        assert!(m.validate(&[PARA, SECTION]));
        assert!(m.validate(&[TITLE, SECTION, PARA]));
        assert!(!m.validate(&[PARA, TITLE]));
    }

    #[test]
    fn unknown_name_is_a_build_error() {
        let err = ContentMatch::compile("test", "mystery*", &resolve).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownName { .. }));
    }

    #[test]
    fn unbalanced_parens_are_rejected() {
        let err = ContentMatch::compile("test", "(title", &resolve).unwrap_err();
        assert!(matches!(err, SchemaError::Grammar { .. }));
    }
}
