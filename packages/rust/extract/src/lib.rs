//! HTML-to-plain-text conversion for staged articles.
//!
//! Help-center article bodies arrive as raw HTML. Staged documents are plain
//! text, so this crate flattens the markup: block elements become paragraph
//! breaks, list items get a dash prefix, scripts/styles/navigation are
//! dropped, entities are decoded during parsing, and the result is
//! word-wrapped to a fixed column width.

use ego_tree::NodeRef;
use scraper::{Html, Node};
use tracing::debug;

/// Tags whose entire subtree is dropped.
const SKIP_TAGS: &[&str] = &["script", "style", "noscript", "iframe", "svg", "nav", "head"];

/// Tags that introduce a paragraph break before and after their content.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "header", "footer", "main", "aside", "h1", "h2", "h3", "h4",
    "h5", "h6", "ul", "ol", "li", "table", "tr", "blockquote", "pre", "figure", "figcaption",
    "hr",
];

/// Options for the HTML-to-text conversion.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Wrap output lines at this column. `None` disables wrapping.
    pub wordwrap: Option<usize>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            wordwrap: Some(130),
        }
    }
}

/// Convert an HTML fragment to trimmed plain text.
///
/// Used for both article titles and bodies; a title is typically a single
/// line, a body a sequence of paragraphs separated by blank lines.
pub fn to_text(html: &str, opts: &ExtractOptions) -> String {
    let fragment = Html::parse_fragment(html);

    let mut raw = String::new();
    for child in fragment.root_element().children() {
        collect_text(child, &mut raw);
    }

    let normalized = normalize_whitespace(&raw);
    let text = match opts.wordwrap {
        Some(width) => wrap_text(&normalized, width),
        None => normalized,
    };

    debug!(html_len = html.len(), text_len = text.len(), "extracted text");
    text
}

/// Recursive DOM walk accumulating text with block separation.
fn collect_text(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(t) => out.push_str(&t.text),
        Node::Element(el) => {
            let tag = el.name();
            if SKIP_TAGS.contains(&tag) {
                return;
            }
            if tag == "br" {
                out.push('\n');
                return;
            }

            let block = BLOCK_TAGS.contains(&tag);
            if block {
                paragraph_break(out);
            }
            if tag == "li" {
                out.push_str("- ");
            }

            for child in node.children() {
                collect_text(child, out);
            }

            if block {
                paragraph_break(out);
            }
        }
        _ => {
            for child in node.children() {
                collect_text(child, out);
            }
        }
    }
}

/// Ensure the accumulator ends with a paragraph break (at most one blank line).
fn paragraph_break(out: &mut String) {
    while out.ends_with(' ') || out.ends_with('\t') {
        out.pop();
    }
    if out.is_empty() {
        return;
    }
    while out.ends_with("\n\n\n") {
        out.pop();
    }
    if !out.ends_with("\n\n") {
        if out.ends_with('\n') {
            out.push('\n');
        } else {
            out.push_str("\n\n");
        }
    }
}

/// Collapse horizontal whitespace within lines and excess blank lines
/// between them, then trim the whole text.
fn normalize_whitespace(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut blank_run = 0usize;

    for line in text.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            blank_run += 1;
            if blank_run == 1 && !lines.is_empty() {
                lines.push(String::new());
            }
        } else {
            blank_run = 0;
            lines.push(collapsed);
        }
    }

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    lines.join("\n")
}

/// Greedy word wrap at `width` columns (characters, not bytes), preserving
/// existing line breaks. Words longer than the width are kept on their own
/// line unbroken.
fn wrap_text(text: &str, width: usize) -> String {
    let mut out = Vec::new();

    for line in text.lines() {
        if line.chars().count() <= width {
            out.push(line.to_string());
            continue;
        }

        let mut current = String::new();
        let mut current_width = 0usize;
        for word in line.split(' ') {
            let word_width = word.chars().count();
            if current.is_empty() {
                current.push_str(word);
                current_width = word_width;
            } else if current_width + 1 + word_width <= width {
                current.push(' ');
                current.push_str(word);
                current_width += 1 + word_width;
            } else {
                out.push(std::mem::take(&mut current));
                current.push_str(word);
                current_width = word_width;
            }
        }
        if !current.is_empty() {
            out.push(current);
        }
    }

    out.join("\n")
}
