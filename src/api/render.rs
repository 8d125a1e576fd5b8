//! The HTML shell the browser application boots from.
//!
//! The page carries no UI of its own: the CSRF token goes into a `<meta>`
//! tag and everything else into an `application/json` script block the
//! frontend reads on load.

use axum::response::Html;
use serde_json::{Value, json};

use crate::config::UiConfig;

/// Escape HTML special characters for text and attribute positions.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// JSON safe to embed in a `<script>` block.
fn script_json(value: &Value) -> String {
    value
        .to_string()
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}

/// Renders the shell for `page` with page-specific `data`.
pub fn render_page(
    ui: &UiConfig,
    mount: &str,
    csrf_token: &str,
    page: &str,
    data: Value,
) -> Html<String> {
    let config = json!({
        "oauth": true,
        "title": ui.title,
        "language": ui.language,
        "mount": mount,
        "page": page,
        "data": data,
    });

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="{language}">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<meta name="csrf-token" content="{csrf}">
<title>{title}</title>
</head>
<body>
<div id="app"></div>
<script id="app-config" type="application/json">{config}</script>
</body>
</html>
"#,
        language = escape_html(&ui.language),
        csrf = escape_html(csrf_token),
        title = escape_html(&ui.title),
        config = script_json(&config),
    ))
}
