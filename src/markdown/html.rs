use super::{ parse, Block, Inline };

/// Renders `text` to an HTML fragment. All text is escaped and links with a
/// script scheme degrade to their label.
pub fn render_html(text: &str) -> String {
    let mut out = String::new();
    for block in parse(text) {
        if !out.is_empty() {
            out.push('\n');
        }
        render_block(&block, &mut out);
    }
    out
}

fn render_block(block: &Block<'_>, out: &mut String) {
    match block {
        Block::Heading { level, content } => {
            out.push_str(&format!("<h{}>", level));
            render_inlines(content, out);
            out.push_str(&format!("</h{}>", level));
        }
        Block::Paragraph(content) => wrap("p", content, out),
        Block::Blockquote(content) => wrap("blockquote", content, out),
        Block::UnorderedList(items) => render_list("ul", items, out),
        Block::OrderedList(items) => render_list("ol", items, out),
        Block::Rule => out.push_str("<hr>"),
        Block::CodeBlock { language, text } => {
            match language {
                Some(lang) => {
                    out.push_str("<pre><code class=\"language-");
                    escape_into(lang, out);
                    out.push_str("\">");
                }
                None => out.push_str("<pre><code>"),
            }
            escape_into(text, out);
            out.push_str("</code></pre>");
        }
    }
}

fn wrap(tag: &str, content: &[Inline<'_>], out: &mut String) {
    out.push_str(&format!("<{}>", tag));
    render_inlines(content, out);
    out.push_str(&format!("</{}>", tag));
}

fn render_list(tag: &str, items: &[Vec<Inline<'_>>], out: &mut String) {
    out.push_str(&format!("<{}>", tag));
    for item in items {
        wrap("li", item, out);
    }
    out.push_str(&format!("</{}>", tag));
}

fn render_inlines(content: &[Inline<'_>], out: &mut String) {
    for inline in content {
        match inline {
            Inline::Text(t) => escape_into(t, out),
            Inline::Bold(t) => tagged("strong", t, out),
            Inline::Italic(t) => tagged("em", t, out),
            Inline::Code(t) => tagged("code", t, out),
            Inline::Link { text, url } if is_safe_url(url) => {
                out.push_str("<a href=\"");
                escape_into(url.trim(), out);
                out.push_str("\" target=\"_blank\" rel=\"noopener noreferrer\">");
                escape_into(text, out);
                out.push_str("</a>");
            }
            Inline::Link { text, .. } => escape_into(text, out),
        }
    }
}

fn tagged(tag: &str, text: &str, out: &mut String) {
    out.push_str(&format!("<{}>", tag));
    escape_into(text, out);
    out.push_str(&format!("</{}>", tag));
}

fn is_safe_url(url: &str) -> bool {
    let lowered: String = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    !["javascript:", "vbscript:", "data:"].iter().any(|scheme| lowered.starts_with(scheme))
}

fn escape_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_blocks_and_spans() {
        let html = render_html("## Advice\n- **rest**\n- drink `water`\n\nSee [CDC](https://cdc.gov).");
        assert_eq!(
            html,
            "<h2>Advice</h2>\n\
             <ul><li><strong>rest</strong></li><li>drink <code>water</code></li></ul>\n\
             <p>See <a href=\"https://cdc.gov\" target=\"_blank\" rel=\"noopener noreferrer\">CDC</a>.</p>"
        );
    }

    #[test]
    fn escapes_markup_everywhere() {
        assert_eq!(render_html("<script>alert(1)</script>"), "<p>&lt;script&gt;alert(1)&lt;/script&gt;</p>");
        assert_eq!(
            render_html("```html\n<b>\"x\"</b>\n```"),
            "<pre><code class=\"language-html\">&lt;b&gt;&quot;x&quot;&lt;/b&gt;</code></pre>"
        );
    }

    #[test]
    fn script_links_render_as_text() {
        assert_eq!(render_html("[click](javascript:alert(1))"), "<p>click)</p>");
        assert_eq!(render_html("[x]( JavaScript:void)"), "<p>x</p>");
    }

    #[test]
    fn rule_and_quote() {
        assert_eq!(render_html("> careful\n---"), "<blockquote>careful</blockquote>\n<hr>");
    }
}
