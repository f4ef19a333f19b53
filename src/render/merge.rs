//! Template-merge strategies.
//!
//! A strategy splices rendered markup into the host template at the element
//! whose `id` equals the entry's target id. The element must appear exactly
//! once: a page silently missing its content is worse than a failed task.
//!
//! ```text
//! <div id="app">old</div>
//!   replace  → <div id="app">NEW</div>
//!   append   → <div id="app">oldNEW</div>
//!   prepend  → <div id="app">NEWold</div>
//! ```

use regex::Regex;
use std::ops::Range;
use thiserror::Error;

use crate::config::MergeStrategy;
use crate::utils::text::find_ci;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("template has no element with id `{0}`")]
    InsertionPointNotFound(String),

    #[error("template has {count} elements with id `{id}`")]
    AmbiguousInsertionPoint { id: String, count: usize },

    #[error("element <{tag} id=\"{id}\"> is never closed")]
    UnclosedElement { id: String, tag: String },
}

pub trait TemplateMerge: Send + Sync {
    fn merge(
        &self,
        template: &str,
        markup: &str,
        styles: Option<&str>,
        target_id: &str,
    ) -> Result<String, MergeError>;
}

/// Built-in strategy for a config identifier.
pub fn strategy(kind: MergeStrategy) -> &'static dyn TemplateMerge {
    match kind {
        MergeStrategy::Replace => &Replace,
        MergeStrategy::Append => &Append,
        MergeStrategy::Prepend => &Prepend,
    }
}

pub struct Replace;
pub struct Append;
pub struct Prepend;

impl TemplateMerge for Replace {
    fn merge(
        &self,
        template: &str,
        markup: &str,
        styles: Option<&str>,
        id: &str,
    ) -> Result<String, MergeError> {
        let el = locate(template, id)?;
        Ok(splice(template, &el, el.inner.clone(), markup, styles))
    }
}

impl TemplateMerge for Append {
    fn merge(
        &self,
        template: &str,
        markup: &str,
        styles: Option<&str>,
        id: &str,
    ) -> Result<String, MergeError> {
        let el = locate(template, id)?;
        let at = el.inner.end;
        Ok(splice(template, &el, at..at, markup, styles))
    }
}

impl TemplateMerge for Prepend {
    fn merge(
        &self,
        template: &str,
        markup: &str,
        styles: Option<&str>,
        id: &str,
    ) -> Result<String, MergeError> {
        let el = locate(template, id)?;
        let at = el.inner.start;
        Ok(splice(template, &el, at..at, markup, styles))
    }
}

/// Elements whose content is never markup.
const RAW_TEXT: &[&str] = &["script", "style", "textarea"];

/// Target element position in the template.
struct Element {
    /// Opening tag
    open: Range<usize>,
    /// Content between the tags
    inner: Range<usize>,
    /// Self-closing `<div id="app"/>`; the splice expands it
    self_closing: Option<String>,
    /// Live `</head>`, ignoring commented-out ones
    head_close: Option<usize>,
}

fn locate(template: &str, id: &str) -> Result<Element, MergeError> {
    // Tags inside comments and scripts must neither match nor balance.
    let masked = mask_inert(template);
    let head_close = find_ci(&masked, "</head>");

    let pattern = format!(
        r#"(?i)<([a-z][a-z0-9-]*)\b[^>]*?\sid\s*=\s*["']{}["'][^>]*>"#,
        regex::escape(id)
    );
    let re = Regex::new(&pattern).map_err(|_| MergeError::InsertionPointNotFound(id.into()))?;

    let mut found = re.captures_iter(&masked);
    let Some(caps) = found.next() else {
        return Err(MergeError::InsertionPointNotFound(id.into()));
    };
    let extra = found.count();
    if extra > 0 {
        return Err(MergeError::AmbiguousInsertionPoint {
            id: id.into(),
            count: extra + 1,
        });
    }

    let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
        return Err(MergeError::InsertionPointNotFound(id.into()));
    };
    let tag = name.as_str().to_ascii_lowercase();

    if whole.as_str().ends_with("/>") {
        return Ok(Element {
            open: whole.range(),
            inner: whole.end()..whole.end(),
            self_closing: Some(tag),
            head_close,
        });
    }

    let close = matching_close(&masked, whole.end(), &tag).ok_or_else(|| {
        MergeError::UnclosedElement {
            id: id.into(),
            tag: tag.clone(),
        }
    })?;
    Ok(Element {
        open: whole.range(),
        inner: whole.end()..close,
        self_closing: None,
        head_close,
    })
}

/// Copy of `template` with comments and raw-text element bodies blanked to
/// spaces. Byte offsets are unchanged, so matches map back onto the original.
fn mask_inert(template: &str) -> String {
    let mut bytes = template.as_bytes().to_vec();
    let mut pos = 0;
    while let Some(rel) = template[pos..].find('<') {
        let start = pos + rel;
        let rest = &template[start..];

        if let Some(comment) = rest.strip_prefix("<!--") {
            let end = comment
                .find("-->")
                .map_or(template.len(), |e| start + 4 + e + 3);
            bytes[start..end].fill(b' ');
            pos = end;
            continue;
        }

        if let Some(tag) = RAW_TEXT.iter().find(|tag| opens(&rest[1..], tag)) {
            let body = rest.find('>').map_or(template.len(), |g| start + g + 1);
            let end = find_ci(&template[body..], &format!("</{tag}"))
                .map_or(template.len(), |e| body + e);
            bytes[body..end].fill(b' ');
            pos = end;
            continue;
        }

        pos = start + 1;
    }
    String::from_utf8(bytes).unwrap_or_else(|_| template.to_owned())
}

/// Whether `rest` (text after `<`) opens a `tag` element.
fn opens(rest: &str, tag: &str) -> bool {
    let rest = rest.as_bytes();
    rest.get(..tag.len())
        .is_some_and(|name| name.eq_ignore_ascii_case(tag.as_bytes()))
        && rest
            .get(tag.len())
            .is_some_and(|b| matches!(b, b'>' | b'/' | b' ' | b'\t' | b'\n' | b'\r'))
}

/// Start of the closing tag balancing an element opened before `from`.
fn matching_close(template: &str, from: usize, tag: &str) -> Option<usize> {
    let re = Regex::new(&format!(r"(?i)<(/?){}\b[^>]*?(/?)>", regex::escape(tag))).ok()?;
    let mut depth = 1usize;
    for caps in re.captures_iter(&template[from..]) {
        let closing = caps.get(1).is_some_and(|m| !m.is_empty());
        let self_closing = caps.get(2).is_some_and(|m| !m.is_empty());
        if closing {
            depth -= 1;
            if depth == 0 {
                return caps.get(0).map(|m| from + m.start());
            }
        } else if !self_closing {
            depth += 1;
        }
    }
    None
}

/// Replace `range` inside the element with `markup` and inject styles.
fn splice(
    template: &str,
    el: &Element,
    range: Range<usize>,
    markup: &str,
    styles: Option<&str>,
) -> String {
    let mut body = String::with_capacity(template.len() + markup.len() + 64);
    match &el.self_closing {
        Some(tag) => {
            let open = &template[el.open.clone()];
            let open = open.trim_end_matches('>').trim_end_matches('/').trim_end();
            body.push_str(&template[..el.open.start]);
            body.push_str(open);
            body.push('>');
            body.push_str(markup);
            body.push_str(&format!("</{tag}>"));
            body.push_str(&template[el.open.end..]);
        }
        None => {
            body.push_str(&template[..range.start]);
            body.push_str(markup);
            body.push_str(&template[range.end..]);
        }
    }

    match styles {
        Some(css) => inject_styles(&body, el, css),
        None => body,
    }
}

/// Insert `<style data-kiln>` before `</head>`, or before the target element
/// when the head closes after it or is missing.
fn inject_styles(doc: &str, el: &Element, css: &str) -> String {
    let at = match el.head_close {
        Some(pos) if pos < el.open.start => pos,
        _ => el.open.start,
    };
    let block = format!("<style data-kiln>{css}</style>\n");
    let mut out = String::with_capacity(doc.len() + block.len());
    out.push_str(&doc[..at]);
    out.push_str(&block);
    out.push_str(&doc[at..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str =
        "<html><head><title>t</title></head><body><div id=\"app\">old</div></body></html>";

    #[test]
    fn replace_inner_content() {
        let out = Replace.merge(PAGE, "<p>new</p>", None, "app").unwrap();
        assert_eq!(
            out,
            "<html><head><title>t</title></head><body><div id=\"app\"><p>new</p></div></body></html>"
        );
    }

    #[test]
    fn append_and_prepend() {
        let out = Append.merge(PAGE, "NEW", None, "app").unwrap();
        assert!(out.contains("<div id=\"app\">oldNEW</div>"));
        let out = Prepend.merge(PAGE, "NEW", None, "app").unwrap();
        assert!(out.contains("<div id=\"app\">NEWold</div>"));
    }

    #[test]
    fn nested_same_tag_is_balanced() {
        let template = "<div id='root' class=\"x\"><div>a</div><div/>b</div><footer></footer>";
        let out = Replace.merge(template, "NEW", None, "root").unwrap();
        assert_eq!(out, "<div id='root' class=\"x\">NEW</div><footer></footer>");
    }

    #[test]
    fn self_closing_target_expands() {
        let out = Replace.merge("<body><main id=\"app\" /></body>", "X", None, "app").unwrap();
        assert_eq!(out, "<body><main id=\"app\">X</main></body>");
    }

    #[test]
    fn styles_go_into_head() {
        let out = Replace.merge(PAGE, "x", Some("p{}"), "app").unwrap();
        assert!(out.contains("<style data-kiln>p{}</style>\n</head>"));
        assert!(out.contains("<div id=\"app\">x</div>"));
    }

    #[test]
    fn styles_without_head_precede_target() {
        let out = Replace.merge("<div id=\"app\"></div>", "x", Some("a{}"), "app").unwrap();
        assert_eq!(out, "<style data-kiln>a{}</style>\n<div id=\"app\">x</div>");
    }

    #[test]
    fn missing_target() {
        assert_eq!(
            Replace.merge(PAGE, "x", None, "main"),
            Err(MergeError::InsertionPointNotFound("main".into()))
        );
        // `data-id` is not `id`
        assert!(Replace.merge("<div data-id=\"app\"></div>", "x", None, "app").is_err());
    }

    #[test]
    fn duplicate_target() {
        let template = "<div id=\"app\"></div><span id=\"app\"></span>";
        assert_eq!(
            Append.merge(template, "x", None, "app"),
            Err(MergeError::AmbiguousInsertionPoint {
                id: "app".into(),
                count: 2
            })
        );
    }

    #[test]
    fn unclosed_target() {
        assert_eq!(
            Replace.merge("<section id=\"app\"><p>", "x", None, "app"),
            Err(MergeError::UnclosedElement {
                id: "app".into(),
                tag: "section".into()
            })
        );
    }

    #[test]
    fn commented_out_target_is_ignored() {
        let template = "<body><!-- <div id=\"app\"></div> --><main></main></body>";
        assert_eq!(
            Replace.merge(template, "<p>CONTENT</p>", None, "app"),
            Err(MergeError::InsertionPointNotFound("app".into()))
        );
    }

    #[test]
    fn script_text_is_not_a_duplicate() {
        let template = "<head><script>el.innerHTML = '<div id=\"app\"></div>';</script></head>\
                        <body><div id=\"app\">old</div></body>";
        let out = Replace.merge(template, "NEW", None, "app").unwrap();
        assert!(out.contains("<script>el.innerHTML = '<div id=\"app\"></div>';</script>"));
        assert!(out.contains("<body><div id=\"app\">NEW</div></body>"));
    }

    #[test]
    fn comment_inside_target_does_not_close_it() {
        let template = "<div id=\"app\"><!-- </div> -->old</div><p>after</p>";
        let out = Replace.merge(template, "NEW", None, "app").unwrap();
        assert_eq!(out, "<div id=\"app\">NEW</div><p>after</p>");
    }

    #[test]
    fn commented_head_close_is_skipped() {
        let template = "<!-- </head> --><body><div id=\"app\"></div></body>";
        let out = Replace.merge(template, "x", Some("a{}"), "app").unwrap();
        assert_eq!(
            out,
            "<!-- </head> --><body><style data-kiln>a{}</style>\n<div id=\"app\">x</div></body>"
        );
    }

    #[test]
    fn masking_keeps_offsets() {
        let template = "a<!-- é --><SCRIPT type=x>if (a<b) {}</SCRIPT>b";
        let masked = mask_inert(template);
        assert_eq!(masked.len(), template.len());
        assert!(masked.starts_with("a "));
        assert!(masked.contains("<SCRIPT type=x>"));
        assert!(masked.ends_with("</SCRIPT>b"));
        assert!(!masked.contains("if"));
    }

    #[test]
    fn strategy_selection() {
        let out = strategy(MergeStrategy::Prepend)
            .merge(PAGE, "N", None, "app")
            .unwrap();
        assert!(out.contains(">Nold<"));
    }
}
