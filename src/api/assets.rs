//! Embedded dashboard page
//!
//! The page is a single self-contained HTML file. The model name in the
//! knowledge-cutoff note is filled in when it is served.

use rust_embed::Embed;

const MODEL_PLACEHOLDER: &str = "__MODEL_ID__";

#[derive(Embed)]
#[folder = "ui"]
struct Assets;

/// The dashboard HTML with the active model name substituted
pub fn get_index_html(model_id: &str) -> Option<String> {
    let content = Assets::get("index.html")?;
    let html = String::from_utf8(content.data.into_owned()).ok()?;
    Some(html.replace(MODEL_PLACEHOLDER, &escape_html(model_id)))
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
