//! Page scripts evaluated inside the browsing context
//!
//! Selectors are embedded as JSON string literals so quoting in user supplied
//! selectors cannot break the script.

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Starts scrolling the results container towards its bottom in small steps
///
/// Evaluates to `true` when the container exists. Lazily rendered items only
/// materialize once scrolled near the viewport.
pub fn scroll_results(container: &str) -> String {
    format!(
        r#"(() => {{
    const list = document.querySelector({container});
    if (!list) {{
        return false;
    }}
    window.__harvestStopScrolling = false;
    const timer = setInterval(() => {{
        if (list.scrollTop + list.clientHeight >= list.scrollHeight || window.__harvestStopScrolling) {{
            clearInterval(timer);
        }} else {{
            list.scrollTop += 100;
        }}
    }}, 5);
    return true;
}})()"#,
        container = js_string(container)
    )
}

/// Evaluates to the `textContent` of the first match, or `null`
pub fn text_content(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({}); return el ? el.textContent : null; }})()",
        js_string(selector)
    )
}

/// Evaluates to `true` once the document has finished loading
pub const DOCUMENT_COMPLETE: &str = "document.readyState === 'complete'";
