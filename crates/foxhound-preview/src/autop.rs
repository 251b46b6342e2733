//! Cheap auto-paragraphing for instant previews
//!
//! Approximates the server's content filters closely enough to give
//! immediate feedback while typing. Blank-line runs separate paragraphs,
//! single newlines become `<br />`, and each paragraph is wrapped in `<p>`.
//!
//! Running the transform on its own output gives the same output back, as
//! long as no existing paragraph contains a blank-line run. Shortcodes,
//! embeds and texturizing are left to the authoritative refresh.

/// Block-level tags that are never wrapped in a paragraph
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "div", "dl", "figure", "footer", "form", "h1",
    "h2", "h3", "h4", "h5", "h6", "header", "hr", "ol", "p", "pre", "section", "table", "ul",
];

/// Convert plain text with newlines into paragraph markup
pub fn autop(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");

    paragraphs(&text)
        .into_iter()
        .map(|lines| render_paragraph(&lines))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Group lines into paragraphs separated by blank (or whitespace-only) lines
fn paragraphs(text: &str) -> Vec<Vec<&str>> {
    let mut groups = Vec::new();
    let mut current = Vec::new();

    for line in text.split('\n') {
        if line.trim().is_empty() {
            if !current.is_empty() {
                groups.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

fn render_paragraph(lines: &[&str]) -> String {
    let first = lines.first().copied().unwrap_or_default();

    if starts_with_block_tag(first) && !starts_with_tag(first, "p") {
        return lines.join("\n");
    }

    let mut body = String::new();
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            let prev = lines[i - 1];
            if !(prev.ends_with("<br />") || prev.ends_with("<br>") || prev.ends_with("<br/>")) {
                body.push_str("<br />");
            }
            body.push('\n');
        }
        body.push_str(line);
    }

    let last = lines.last().copied().unwrap_or_default();
    if starts_with_tag(first, "p") && last.ends_with("</p>") {
        body
    } else {
        format!("<p>{}</p>", body)
    }
}

fn starts_with_block_tag(line: &str) -> bool {
    BLOCK_TAGS.iter().any(|tag| starts_with_tag(line, tag))
}

/// True when the line opens with `<tag>`, `<tag ` or `<tag/`
fn starts_with_tag(line: &str, tag: &str) -> bool {
    let Some(rest) = line.trim_start().strip_prefix('<') else {
        return false;
    };
    match (rest.get(..tag.len()), rest.get(tag.len()..)) {
        (Some(name), Some(after)) if name.eq_ignore_ascii_case(tag) => {
            matches!(after.chars().next(), Some('>' | ' ' | '/' | '\t'))
        }
        _ => false,
    }
}
