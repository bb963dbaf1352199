use std::ops::Range;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Inline<'a> {
    Text(&'a str),
    Bold(&'a str),
    Italic(&'a str),
    Code(&'a str),
    Link {
        text: &'a str,
        url: &'a str,
    },
}

/// A matched span: `whole` covers the markers, `inner` the content.
struct Span {
    whole: Range<usize>,
    inner: Range<usize>,
    url: Option<Range<usize>>,
}

struct Layer {
    find: fn(&str) -> Option<Span>,
    build: for<'a> fn(&'a str, &Span) -> Inline<'a>,
}

// Highest precedence first. Text outside a layer's matches is handed to the
// next layer, so a lower layer never sees markers a higher one consumed.
const LAYERS: [Layer; 4] = [
    Layer { find: find_link, build: build_link },
    Layer { find: find_code, build: build_code },
    Layer { find: find_bold, build: build_bold },
    Layer { find: find_italic, build: build_italic },
];

fn build_link<'a>(s: &'a str, span: &Span) -> Inline<'a> {
    Inline::Link {
        text: &s[span.inner.clone()],
        url: span.url.clone().map_or("", |u| &s[u]),
    }
}

fn build_code<'a>(s: &'a str, span: &Span) -> Inline<'a> {
    Inline::Code(&s[span.inner.clone()])
}

fn build_bold<'a>(s: &'a str, span: &Span) -> Inline<'a> {
    Inline::Bold(&s[span.inner.clone()])
}

fn build_italic<'a>(s: &'a str, span: &Span) -> Inline<'a> {
    Inline::Italic(&s[span.inner.clone()])
}

/// Splits one line into styled spans. Never fails; markers that do not close
/// are kept as literal text.
pub fn parse_inline(text: &str) -> Vec<Inline<'_>> {
    let mut out = Vec::new();
    scan(text, 0, &mut out);
    out
}

fn scan<'a>(text: &'a str, depth: usize, out: &mut Vec<Inline<'a>>) {
    if text.is_empty() {
        return;
    }
    let Some(layer) = LAYERS.get(depth) else {
        out.push(Inline::Text(text));
        return;
    };

    let mut rest = text;
    while let Some(span) = (layer.find)(rest) {
        scan(&rest[..span.whole.start], depth + 1, out);
        out.push((layer.build)(rest, &span));
        rest = &rest[span.whole.end..];
    }
    scan(rest, depth + 1, out);
}

// All markers are ASCII, so byte offsets found here are char boundaries.

fn find_link(s: &str) -> Option<Span> {
    let b = s.as_bytes();
    for start in positions(b, b'[') {
        let text_start = start + 1;
        let Some(close) = position_from(b, text_start, b']') else {
            // No closing bracket after this one means none after later ones either.
            return None;
        };
        if close == text_start || b.get(close + 1) != Some(&b'(') {
            continue;
        }
        let url_start = close + 2;
        let Some(paren) = position_from(b, url_start, b')') else {
            continue;
        };
        if paren == url_start {
            continue;
        }
        return Some(Span {
            whole: start..paren + 1,
            inner: text_start..close,
            url: Some(url_start..paren),
        });
    }
    None
}

fn find_code(s: &str) -> Option<Span> {
    let b = s.as_bytes();
    for start in positions(b, b'`') {
        let Some(close) = position_from(b, start + 1, b'`') else {
            return None;
        };
        if close > start + 1 {
            return Some(Span { whole: start..close + 1, inner: start + 1..close, url: None });
        }
    }
    None
}

fn find_bold(s: &str) -> Option<Span> {
    let b = s.as_bytes();
    for start in positions(b, b'*') {
        if b.get(start + 1) != Some(&b'*') {
            continue;
        }
        let inner_start = start + 2;
        let Some(close) = position_from(b, inner_start, b'*') else {
            return None;
        };
        if close > inner_start && b.get(close + 1) == Some(&b'*') {
            return Some(Span { whole: start..close + 2, inner: inner_start..close, url: None });
        }
    }
    None
}

/// `*text*` where neither delimiter touches another asterisk.
fn find_italic(s: &str) -> Option<Span> {
    let b = s.as_bytes();
    for start in positions(b, b'*') {
        if start > 0 && b[start - 1] == b'*' {
            continue;
        }
        match b.get(start + 1) {
            None | Some(b'*') => continue,
            Some(_) => {}
        }
        let Some(close) = position_from(b, start + 1, b'*') else {
            return None;
        };
        if b.get(close + 1) == Some(&b'*') {
            continue;
        }
        return Some(Span { whole: start..close + 1, inner: start + 1..close, url: None });
    }
    None
}

fn positions(b: &[u8], needle: u8) -> impl Iterator<Item = usize> + '_ {
    b.iter()
        .enumerate()
        .filter(move |(_, c)| **c == needle)
        .map(|(i, _)| i)
}

fn position_from(b: &[u8], from: usize, needle: u8) -> Option<usize> {
    b.get(from..)?
        .iter()
        .position(|c| *c == needle)
        .map(|i| i + from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use Inline::*;

    #[test]
    fn plain_text_is_one_node() {
        assert_eq!(parse_inline("take two tablets daily"), vec![Text("take two tablets daily")]);
        assert!(parse_inline("").is_empty());
    }

    #[test]
    fn bold_then_italic() {
        assert_eq!(
            parse_inline("**bold** and *italic*"),
            vec![Bold("bold"), Text(" and "), Italic("italic")]
        );
    }

    #[test]
    fn unterminated_markers_stay_literal() {
        assert_eq!(parse_inline("**oops"), vec![Text("**oops")]);
        assert_eq!(parse_inline("`open"), vec![Text("`open")]);
        assert_eq!(parse_inline("[label](no-close"), vec![Text("[label](no-close")]);
        assert_eq!(parse_inline("2 * 3"), vec![Text("2 * 3")]);
    }

    #[test]
    fn link_beats_inner_formatting() {
        assert_eq!(
            parse_inline("see [**CDC**](https://cdc.gov) now"),
            vec![Text("see "), Link { text: "**CDC**", url: "https://cdc.gov" }, Text(" now")]
        );
    }

    #[test]
    fn code_hides_emphasis_markers() {
        assert_eq!(
            parse_inline("run `a*b*c` then *rest*"),
            vec![Text("run "), Code("a*b*c"), Text(" then "), Italic("rest")]
        );
    }

    #[test]
    fn italic_ignores_double_asterisks() {
        // `**` with nothing between is not bold; the italic layer must not split it.
        assert_eq!(parse_inline("a ** b"), vec![Text("a ** b")]);
        assert_eq!(parse_inline("*one* and *two*"), vec![Italic("one"), Text(" and "), Italic("two")]);
    }

    #[test]
    fn empty_code_span_is_skipped_for_next_pair() {
        assert_eq!(parse_inline("``x`"), vec![Text("`"), Code("x")]);
    }

    #[test]
    fn multibyte_text_around_markers() {
        assert_eq!(
            parse_inline("température **élevée** ✓"),
            vec![Text("température "), Bold("élevée"), Text(" ✓")]
        );
    }
}
