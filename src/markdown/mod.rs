//! Best-effort markdown for assistant replies.
//!
//! Line oriented and single pass: every line is classified by its prefix and
//! anything unrecognised becomes a paragraph. Parsing never fails.

pub mod html;
pub mod inline;

pub use inline::{ parse_inline, Inline };

use std::iter::Peekable;
use std::str::Split;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Block<'a> {
    Heading {
        level: u8,
        content: Vec<Inline<'a>>,
    },
    Paragraph(Vec<Inline<'a>>),
    UnorderedList(Vec<Vec<Inline<'a>>>),
    OrderedList(Vec<Vec<Inline<'a>>>),
    Blockquote(Vec<Inline<'a>>),
    Rule,
    CodeBlock {
        language: Option<&'a str>,
        text: String,
    },
}

/// Lazy block sequence over a borrowed text. Cloning restarts from the
/// clone's current position.
#[derive(Clone)]
pub struct Blocks<'a> {
    lines: Peekable<Split<'a, char>>,
}

pub fn parse(text: &str) -> Blocks<'_> {
    Blocks { lines: text.split('\n').peekable() }
}

impl<'a> Iterator for Blocks<'a> {
    type Item = Block<'a>;

    fn next(&mut self) -> Option<Block<'a>> {
        loop {
            let line = strip_cr(self.lines.next()?);
            if line.trim().is_empty() {
                continue;
            }
            return Some(self.classify(line));
        }
    }
}

impl<'a> Blocks<'a> {
    fn classify(&mut self, line: &'a str) -> Block<'a> {
        if let Some((level, rest)) = heading(line) {
            return Block::Heading { level, content: parse_inline(rest) };
        }
        if let Some(first) = bullet_item(line) {
            return Block::UnorderedList(self.collect_items(first, bullet_item));
        }
        if let Some(first) = ordered_item(line) {
            return Block::OrderedList(self.collect_items(first, ordered_item));
        }
        if let Some(rest) = line.strip_prefix("> ") {
            return Block::Blockquote(parse_inline(rest));
        }
        if is_rule(line) {
            return Block::Rule;
        }
        if let Some(info) = line.strip_prefix("```") {
            let info = info.trim();
            let language = if info.is_empty() { None } else { Some(info) };
            return Block::CodeBlock { language, text: self.collect_code() };
        }
        Block::Paragraph(parse_inline(line))
    }

    /// Greedily takes the following lines that match the same list marker.
    fn collect_items(
        &mut self,
        first: &'a str,
        item: fn(&str) -> Option<&str>
    ) -> Vec<Vec<Inline<'a>>> {
        let mut items = vec![parse_inline(first)];
        while let Some(next) = self.lines.peek().and_then(|&l| item(strip_cr(l))) {
            items.push(parse_inline(next));
            self.lines.next();
        }
        items
    }

    /// Raw lines up to the closing fence, or to the end of input.
    fn collect_code(&mut self) -> String {
        let mut code: Vec<&str> = Vec::new();
        for line in self.lines.by_ref().map(strip_cr) {
            if line.starts_with("```") {
                break;
            }
            code.push(line);
        }
        code.join("\n")
    }
}

fn strip_cr(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}

fn heading(line: &str) -> Option<(u8, &str)> {
    [("#### ", 4), ("### ", 3), ("## ", 2), ("# ", 1)]
        .into_iter()
        .find_map(|(prefix, level)| line.strip_prefix(prefix).map(|rest| (level, rest)))
}

fn after_whitespace(rest: &str) -> Option<&str> {
    let ws = rest.chars().next().filter(|c| c.is_whitespace())?;
    Some(&rest[ws.len_utf8()..])
}

fn bullet_item(line: &str) -> Option<&str> {
    after_whitespace(line.strip_prefix(['-', '*'])?)
}

fn ordered_item(line: &str) -> Option<&str> {
    let rest = line.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() == line.len() {
        return None;
    }
    after_whitespace(rest.strip_prefix('.')?)
}

fn is_rule(line: &str) -> bool {
    line.len() >= 3 && line.bytes().all(|b| b == b'-' || b == b'*')
}
