// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Layout grammar compiler.
//!
//! Tokens come from a Pest grammar; fields are compiled by recursive descent
//! over the token list with a single cursor. Problems are collected rather
//! than returned at the first one, so a bad field does not hide problems in
//! its siblings.

use pest::Parser;
use pest_derive::Parser;
use tracing::debug;

use crate::core::{GrammarIssue, Result, TwiddleError};
use crate::layout::{Conversion, Count, Derivation, Flavor, Gap, Layout, UnitSize};
use crate::tagged::{parse_text, TAG_LIST};

/// Pest parser for layout grammar tokens.
#[derive(Parser)]
#[grammar = "layout/grammar.pest"] // Path relative to src/ directory
struct GrammarParser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Separator,
    Wildcard,
    Length,
    Save,
    Load,
    Keyword,
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    kind: TokenKind,
    text: &'a str,
    /// Directive name for save/load tokens
    name: &'a str,
    start: usize,
    end: usize,
}

impl Token<'_> {
    fn is_keyword(&self, word: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text == word
    }
}

fn tokenize(grammar: &str) -> Result<Vec<Token<'_>>> {
    let mut pairs = GrammarParser::parse(Rule::grammar, grammar).map_err(|e| {
        TwiddleError::grammar(vec![GrammarIssue::new(0, "", format!("cannot tokenize: {e}"))])
    })?;
    let Some(root) = pairs.next() else {
        return Ok(Vec::new());
    };

    let mut tokens = Vec::new();
    for pair in root.into_inner() {
        let kind = match pair.as_rule() {
            Rule::separator => TokenKind::Separator,
            Rule::wildcard => TokenKind::Wildcard,
            Rule::length => TokenKind::Length,
            Rule::save => TokenKind::Save,
            Rule::load => TokenKind::Load,
            Rule::keyword => TokenKind::Keyword,
            _ => continue,
        };
        let span = pair.as_span();
        let text = pair.as_str();
        let name = pair.into_inner().next().map_or("", |p| p.as_str());
        tokens.push(Token {
            kind,
            text,
            name,
            start: span.start(),
            end: span.end(),
        });
    }
    Ok(tokens)
}

/// Compile every `---` separated section of a grammar.
///
/// Always yields at least one layout on success.
pub(crate) fn compile(grammar: &str) -> Result<Vec<Layout>> {
    let tokens = tokenize(grammar)?;
    let mut issues = Vec::new();
    let mut conversion_error = None;
    let mut layouts = Vec::new();

    for section in tokens.split(|t| t.kind == TokenKind::Separator) {
        let mut compiler = SectionCompiler::new(grammar, section);
        compiler.run();
        issues.append(&mut compiler.issues);
        if conversion_error.is_none() {
            conversion_error = compiler.conversion_error.take();
        }
        layouts.push(compiler.finish());
    }

    if !issues.is_empty() {
        return Err(TwiddleError::grammar(issues));
    }
    if let Some(err) = conversion_error {
        return Err(err);
    }
    Ok(layouts)
}

/// Marker for a field whose compilation stopped; the issue is already recorded.
struct Abort;

type Step<T> = std::result::Result<T, Abort>;

struct SectionCompiler<'a> {
    source: &'a str,
    tokens: &'a [Token<'a>],
    pos: usize,
    words: Vec<i32>,
    /// First template word not yet owned by a gap
    mark: usize,
    gaps: Vec<Gap>,
    issues: Vec<GrammarIssue>,
    conversion_error: Option<TwiddleError>,
}

impl<'a> SectionCompiler<'a> {
    fn new(source: &'a str, tokens: &'a [Token<'a>]) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            words: Vec::new(),
            mark: 0,
            gaps: Vec::new(),
            issues: Vec::new(),
            conversion_error: None,
        }
    }

    fn run(&mut self) {
        // Without any container the fields become the items of an implicit
        // top-level list whose length is patched in once they are known.
        let wrapped = !self
            .tokens
            .iter()
            .any(|t| t.is_keyword("list") || t.is_keyword("vector") || t.is_keyword("item_vector"));
        if wrapped {
            self.words.extend([TAG_LIST, 0]);
        }

        let mut visible = 0usize;
        while let Some(token) = self.peek() {
            let ignored = self.field(None, false);
            if ignored {
                continue;
            }
            visible += 1;
            if !wrapped && visible == 2 {
                self.issue(
                    &token,
                    "a message is a single list; only skipped, saved or computed fields may follow it",
                );
            }
        }

        if wrapped {
            self.words[1] = i32::try_from(visible).unwrap_or(i32::MAX);
        }
        if self.mark < self.words.len() {
            let range = self.mark * 4..self.words.len() * 4;
            self.mark = self.words.len();
            self.gaps.push(Gap::header(range));
        }
    }

    fn finish(self) -> Layout {
        let template = self.words.iter().flat_map(|w| w.to_le_bytes()).collect();
        let grammar = match (self.tokens.first(), self.tokens.last()) {
            (Some(first), Some(last)) => self.source[first.start..last.end].to_string(),
            _ => String::new(),
        };
        Layout::from_parts(self.gaps, template, grammar)
    }

    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self, wanted: &str) -> Step<Token<'a>> {
        match self.peek() {
            Some(token) => {
                self.pos += 1;
                Ok(token)
            }
            None => {
                let end = self.tokens.last().map_or(0, |t| t.end);
                self.issues.push(GrammarIssue::new(
                    end,
                    "",
                    format!("grammar ended, expected {wanted}"),
                ));
                Err(Abort)
            }
        }
    }

    fn issue(&mut self, token: &Token<'_>, message: impl Into<String>) {
        self.issues
            .push(GrammarIssue::new(token.start, token.text, message));
    }

    fn fail<T>(&mut self, token: &Token<'_>, message: impl Into<String>) -> Step<T> {
        self.issue(token, message);
        Err(Abort)
    }

    fn origin(&self, start: usize) -> String {
        let end = self.pos.checked_sub(1).map_or(start, |i| self.tokens[i].end);
        self.source[start..end.max(start)].to_string()
    }

    /// Compile one field. Returns whether the field is invisible in the
    /// tagged form; a field that failed to compile counts as visible so that
    /// enclosing lists still terminate.
    fn field(&mut self, item: Option<(Flavor, bool)>, inherited_skip: bool) -> bool {
        self.field_inner(item, inherited_skip).unwrap_or(false)
    }

    fn field_inner(&mut self, item: Option<(Flavor, bool)>, inherited_skip: bool) -> Step<bool> {
        let first = self.next("a field")?;
        let start = first.start;

        if first.is_keyword("compute") {
            let what = self.next("a derivation name after 'compute'")?;
            let Some(derivation) = Derivation::from_name(what.text) else {
                return self.fail(&what, "unknown derivation");
            };
            let origin = self.origin(start);
            debug!(context = "layout_compiler", origin = %origin, "compute gap");
            let mut gap = Gap::header(self.mark * 4..self.mark * 4);
            gap.count = Count::Fixed(1);
            gap.ignore_external = true;
            gap.computed = true;
            gap.derivation = Some(derivation);
            gap.bound_name = Some(derivation.name().to_string());
            gap.origin = origin;
            self.gaps.push(gap);
            return Ok(true);
        }

        let mut ignore = inherited_skip;
        let mut kind = first;
        if first.is_keyword("skip") {
            ignore = true;
            kind = self.next("a type after 'skip'")?;
        }

        let mut saving = false;
        let mut loading = false;
        let mut bound_name = None;
        let mut literal = None;
        match kind.kind {
            TokenKind::Save => {
                saving = true;
                ignore = true;
                bound_name = Some(kind.name.to_string());
                kind = self.next("a type after a save directive")?;
            }
            TokenKind::Load => {
                if ignore {
                    return self.fail(&kind, "a skipped field cannot be loaded");
                }
                loading = true;
                bound_name = Some(kind.name.to_string());
                if let Some(text) = kind.name.strip_prefix('=') {
                    literal = Some(self.literal(&kind, text)?);
                }
                kind = self.next("a type after a load directive")?;
            }
            _ => {}
        }
        if kind.kind != TokenKind::Keyword {
            return self.fail(&kind, "expected a type keyword");
        }

        let (is_vector, is_list) = match kind.text {
            "vector" => (true, false),
            "list" => (false, true),
            "item_vector" => (true, true),
            _ => (false, false),
        };
        let type_token = if is_vector {
            self.next("an element type")?
        } else {
            kind
        };

        let mut count = Count::Fixed(1);
        let mut has_data = false;
        if is_vector || is_list {
            let len = self.next("a length")?;
            match len.kind {
                TokenKind::Length => match len.text.parse::<i32>() {
                    Ok(n) => count = Count::Fixed(n as usize),
                    Err(_) => return self.fail(&len, "length out of range"),
                },
                TokenKind::Wildcard if is_list => {
                    return self.fail(&len, "a list needs a fixed length, not '*'")
                }
                TokenKind::Wildcard => {
                    count = Count::FromWire;
                    has_data = true;
                }
                _ => return self.fail(&len, "expected a length or '*'"),
            }
        }
        if !is_list && !has_data {
            match self.peek() {
                Some(t) if t.kind == TokenKind::Wildcard => {
                    self.pos += 1;
                    has_data = true;
                }
                Some(t) => return self.fail(&t, "expected '*' data placeholder"),
                None => {
                    self.next("'*' data placeholder")?;
                }
            }
        }

        // Element kind and wire size
        let mut flavor = None;
        let mut unsigned = false;
        let mut is_item = false;
        let mut conversion = Conversion::Identity;
        if !is_list || is_vector {
            if type_token.kind != TokenKind::Keyword {
                return self.fail(&type_token, "expected a type keyword");
            }
            let (word, wire) = match type_token.text.split_once(':') {
                Some((word, wire)) => match wire.parse::<usize>() {
                    Ok(n) if n > 0 => (word, Some(n)),
                    _ => return self.fail(&type_token, "bad wire size"),
                },
                None => (type_token.text, None),
            };
            let resolved = if word == "item" {
                is_item = true;
                if is_vector {
                    return self.fail(&type_token, "a vector cannot hold 'item'");
                }
                match item {
                    Some((f, u)) => {
                        unsigned = u;
                        f
                    }
                    None => return self.fail(&type_token, "'item' is only valid inside item_vector"),
                }
            } else {
                unsigned = Flavor::is_unsigned_keyword(word);
                match Flavor::from_keyword(word) {
                    Some(f) => f,
                    None => return self.fail(&type_token, "unknown type"),
                }
            };
            if is_list && wire.is_some() {
                return self.fail(&type_token, "give wire sizes on the items of an item_vector");
            }
            conversion = match conversion_for(resolved, wire, !unsigned) {
                Some(c) => c,
                None => {
                    let unit = match resolved.unit() {
                        UnitSize::Fixed(n) => n,
                        UnitSize::Variable => 0,
                    };
                    if self.conversion_error.is_none() {
                        self.conversion_error = Some(TwiddleError::unsupported_conversion(
                            self.origin(start),
                            resolved.name(),
                            unit,
                            wire.unwrap_or(0),
                        ));
                    }
                    return Err(Abort);
                }
            };
            flavor = Some(resolved);
        }

        if loading {
            let loadable = !is_vector
                && !is_list
                && conversion == Conversion::Identity
                && flavor.is_some_and(Flavor::is_integer);
            if !loadable {
                return self.fail(&kind, "load needs a scalar integer or vocab field");
            }
        }
        if saving && is_list && !is_vector {
            return self.fail(&kind, "a list cannot be saved");
        }

        if !ignore {
            let tag = flavor.map_or(0, Flavor::tag);
            if is_vector {
                self.words.push(TAG_LIST | tag);
                if let Count::Fixed(n) = count {
                    self.words.push(n as i32);
                }
            } else if is_list {
                if let Count::Fixed(n) = count {
                    self.words.extend([TAG_LIST, n as i32]);
                }
            } else if !is_item {
                self.words.push(tag);
            }
        }

        if has_data {
            let template = if ignore {
                self.mark * 4..self.mark * 4
            } else {
                let range = self.mark * 4..self.words.len() * 4;
                self.mark = self.words.len();
                range
            };
            let unit = flavor.map_or(UnitSize::Fixed(0), Flavor::unit);
            let origin = self.origin(start);
            debug!(
                context = "layout_compiler",
                origin = %origin,
                count = ?count,
                unit = ?unit,
                skip = ignore,
                "data gap"
            );
            self.gaps.push(Gap {
                template,
                count,
                unit,
                flavor,
                conversion,
                ignore_external: ignore,
                save_external: saving,
                load_external: loading,
                computed: false,
                derivation: None,
                origin,
                bound_name,
                literal,
            });
        }

        if is_list {
            let Count::Fixed(len) = count else {
                return Ok(ignore);
            };
            let child_item = if is_vector {
                flavor.map(|f| (f, unsigned))
            } else {
                None
            };
            let mut done = 0;
            while done < len {
                if self.peek().is_none() {
                    let end = self.tokens.last().map_or(0, |t| t.end);
                    self.issues.push(GrammarIssue::new(
                        end,
                        "",
                        format!("list expects {len} fields, found {done}"),
                    ));
                    break;
                }
                let child_ignored = self.field(child_item, ignore);
                if ignore || !child_ignored {
                    done += 1;
                }
            }
        }
        Ok(ignore)
    }

    fn literal(&mut self, token: &Token<'_>, text: &str) -> Step<i64> {
        match parse_text(text) {
            Ok(value) => match value.get(0).and_then(|v| v.as_i64()) {
                Some(v) => Ok(v),
                None => self.fail(token, "literal must start with an integer or vocab"),
            },
            Err(e) => self.fail(token, format!("bad literal: {e}")),
        }
    }
}

/// Conversion implied by an optional `:N` wire size, if one is supported.
fn conversion_for(flavor: Flavor, wire: Option<usize>, signed: bool) -> Option<Conversion> {
    let Some(wire) = wire else {
        return Some(Conversion::Identity);
    };
    match (flavor, flavor.unit()) {
        (_, UnitSize::Fixed(unit)) if unit == wire => Some(Conversion::Identity),
        (Flavor::Float64, _) if wire == 4 => Some(Conversion::NarrowFloat64),
        (Flavor::Int8 | Flavor::Int16 | Flavor::Int32 | Flavor::Int64, UnitSize::Fixed(unit))
            if wire > unit && wire <= 8 =>
        {
            Some(Conversion::Pad { wire, signed })
        }
        _ => None,
    }
}
