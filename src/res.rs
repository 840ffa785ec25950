use axum::{debug_handler, http::header, response::IntoResponse};
use pulldown_cmark::{Event, Options, Parser};

#[macro_export]
macro_rules! include_res {
    (str, $p:expr) => {
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
}

#[debug_handler]
pub async fn stylesheet() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css")], include_res!(str, "/style.css"))
}

/// Replaces each `{key}` of `template` in one pass. Substituted values are
/// never scanned again, so user text cannot expand a placeholder.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut html = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        html.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let key = &after[..close];
            values
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (close, *value))
        });
        match value {
            Some((close, value)) => {
                html.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                html.push('{');
                rest = after;
            }
        }
    }

    html.push_str(rest);
    html
}

/// Escapes text for use between HTML tags.
pub fn escape(text: &str) -> String {
    let mut html = String::new();
    pulldown_cmark::html::push_html(&mut html, std::iter::once(Event::Text(text.into())));
    html
}

/// Renders message content as Markdown. Raw HTML in the source is shown as text.
pub fn markdown(content: &str) -> String {
    let parser = Parser::new_ext(content, Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS)
        .map(|event| match event {
            Event::Html(html) | Event::InlineHtml(html) => Event::Text(html),
            _ => event,
        });

    let mut html = String::new();
    pulldown_cmark::html::push_html(&mut html, parser);
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_is_single_pass() {
        let html = fill("<h2>{name}</h2><ul>{items}</ul>", &[("name", "{items}"), ("items", "<li>x</li>")]);
        assert_eq!(html, "<h2>{items}</h2><ul><li>x</li></ul>");
    }

    #[test]
    fn fill_leaves_unknown_braces() {
        assert_eq!(fill("{a} {b} {", &[("a", "1")]), "1 {b} {");
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("<b>fish & chips</b>"), "&lt;b&gt;fish &amp; chips&lt;/b&gt;");
    }

    #[test]
    fn markdown_renders_emphasis() {
        assert_eq!(markdown("buy *milk*"), "<p>buy <em>milk</em></p>\n");
    }

    #[test]
    fn markdown_neutralizes_raw_html() {
        let html = markdown("<script>alert(1)</script>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));

        let inline = markdown("hi <img src=x onerror=alert(1)> there");
        assert!(!inline.contains("<img"));
    }
}
