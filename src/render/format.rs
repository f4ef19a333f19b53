//! Best-effort indentation of rendered markup.
//!
//! Every tag, comment and text run goes on its own line, indented by nesting
//! depth. Void elements do not nest. The contents of raw-text elements
//! (`pre`, `script`, `style`, `textarea`) are copied verbatim, since
//! whitespace inside them is significant.

use thiserror::Error;

use crate::utils::text::find_ci;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["pre", "script", "style", "textarea"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("unterminated {0}")]
    Unterminated(&'static str),

    #[error("closing tag </{found}> does not match <{expected}>")]
    Mismatched { expected: String, found: String },

    #[error("closing tag </{0}> without opening tag")]
    Unopened(String),

    #[error("<{0}> is never closed")]
    Unclosed(String),
}

/// Indent `markup` by `indent` spaces per nesting level.
pub fn format_html(markup: &str, indent: usize) -> Result<String, FormatError> {
    let mut out = Printer::new(indent);
    let mut stack: Vec<String> = Vec::new();
    let mut rest = markup;

    while !rest.is_empty() {
        let Some(lt) = rest.find('<') else {
            out.text(rest, stack.len());
            break;
        };
        out.text(&rest[..lt], stack.len());
        rest = &rest[lt..];

        if rest.starts_with("<!--") {
            let end = rest.find("-->").ok_or(FormatError::Unterminated("comment"))? + 3;
            out.line(&rest[..end], stack.len());
            rest = &rest[end..];
            continue;
        }

        let end = tag_end(rest).ok_or(FormatError::Unterminated("tag"))?;
        let tag = &rest[..end];
        rest = &rest[end..];

        if tag.starts_with("<!") || tag.starts_with("<?") {
            out.line(tag, stack.len());
        } else if let Some(name) = tag.strip_prefix("</") {
            let name = tag_name(name);
            match stack.pop() {
                Some(open) if open == name => out.line(tag, stack.len()),
                Some(open) => {
                    return Err(FormatError::Mismatched {
                        expected: open,
                        found: name,
                    });
                }
                None => return Err(FormatError::Unopened(name)),
            }
        } else {
            let name = tag_name(&tag[1..]);
            let depth = stack.len();
            if RAW_TEXT_ELEMENTS.contains(&name.as_str()) && !tag.ends_with("/>") {
                let close = find_ci(rest, &format!("</{name}"))
                    .ok_or_else(|| FormatError::Unclosed(name.clone()))?;
                let after = &rest[close..];
                let close_end = after.find('>').ok_or(FormatError::Unterminated("tag"))? + 1;
                out.line_raw(tag, &rest[..close], &after[..close_end], depth);
                rest = &after[close_end..];
            } else {
                out.line(tag, depth);
                if !tag.ends_with("/>") && !VOID_ELEMENTS.contains(&name.as_str()) {
                    stack.push(name);
                }
            }
        }
    }

    match stack.pop() {
        Some(open) => Err(FormatError::Unclosed(open)),
        None => Ok(out.finish()),
    }
}

struct Printer {
    indent: usize,
    lines: Vec<String>,
}

impl Printer {
    fn new(indent: usize) -> Self {
        Self {
            indent,
            lines: Vec::new(),
        }
    }

    fn pad(&self, depth: usize) -> String {
        " ".repeat(self.indent * depth)
    }

    fn line(&mut self, content: &str, depth: usize) {
        let line = format!("{}{}", self.pad(depth), content.trim());
        self.lines.push(line);
    }

    fn text(&mut self, text: &str, depth: usize) {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !collapsed.is_empty() {
            self.line(&collapsed, depth);
        }
    }

    /// Raw-text element on one logical line, contents untouched.
    fn line_raw(&mut self, open: &str, body: &str, close: &str, depth: usize) {
        let line = format!("{}{open}{body}{close}", self.pad(depth));
        self.lines.push(line);
    }

    fn finish(self) -> String {
        self.lines.join("\n")
    }
}

/// Byte length of the tag starting at `s[0] == '<'`, quotes respected.
fn tag_end(s: &str) -> Option<usize> {
    let mut quote = None;
    for (i, c) in s.char_indices().skip(1) {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return Some(i + 1),
            (None, _) => {}
        }
    }
    None
}

/// Lowercase element name at the start of `s`.
fn tag_name(s: &str) -> String {
    s.chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == ':')
        .collect::<String>()
        .to_ascii_lowercase()
}
