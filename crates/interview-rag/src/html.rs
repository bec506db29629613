use std::sync::OnceLock;

use regex::Regex;

/// Pages longer than this (in characters) are cut and suffixed with `...`.
pub const MAX_CLEAN_CHARS: usize = 3500;

const DROPPED_BLOCKS: [&str; 6] = ["script", "style", "nav", "footer", "header", "aside"];

struct Patterns {
    blocks: Vec<Regex>,
    comment: Regex,
    tag: Regex,
    entity: Regex,
    whitespace: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        blocks: DROPPED_BLOCKS
            .iter()
            .map(|t| Regex::new(&format!(r"(?is)<{t}\b[^>]*>.*?</{t}\s*>")).unwrap())
            .collect(),
        comment: Regex::new(r"(?s)<!--.*?-->").unwrap(),
        tag: Regex::new(r"<[^>]*>").unwrap(),
        entity: Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").unwrap(),
        whitespace: Regex::new(r"\s+").unwrap(),
    })
}

/// Convert a documentation page to plain text.
///
/// Drops script/style/navigation blocks, strips the remaining tags, decodes
/// entities and collapses whitespace.
pub fn clean_html(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let p = patterns();

    let mut text = p.comment.replace_all(html, " ").into_owned();
    for block in &p.blocks {
        text = block.replace_all(&text, " ").into_owned();
    }
    let text = p.tag.replace_all(&text, " ");
    let text = p.entity.replace_all(&text, |caps: &regex::Captures<'_>| {
        decode_entity(&caps[1]).unwrap_or_else(|| caps[0].to_string())
    });
    let text = p.whitespace.replace_all(&text, " ");
    let text = text.trim();

    if text.chars().count() > MAX_CLEAN_CHARS {
        let mut cut: String = text.chars().take(MAX_CLEAN_CHARS).collect();
        cut.push_str("...");
        cut
    } else {
        text.to_string()
    }
}

fn decode_entity(name: &str) -> Option<String> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    let decoded = match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => " ",
        "ndash" => "-",
        "mdash" => "-",
        "hellip" => "...",
        "laquo" => "«",
        "raquo" => "»",
        "copy" => "©",
        _ => return None,
    };
    Some(decoded.to_string())
}
