use ammonia;

/// Clean user-submitted forum content using the ammonia library.
///
/// Whitelist-based sanitization: safe formatting tags (<b>, <p>, lists,
/// links) survive, while <script>/<iframe> and event-handler attributes
/// are stripped. Applied once, on write, before content reaches the
/// database; the read path serves stored content as-is.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_but_keeps_formatting() {
        let cleaned = clean_html("<p>hi</p><script>alert(1)</script>");
        assert!(cleaned.contains("<p>hi</p>"));
        assert!(!cleaned.contains("script"));
    }

    #[test]
    fn strips_event_handlers() {
        let cleaned = clean_html(r#"<a href="https://example.com" onclick="x()">link</a>"#);
        assert!(!cleaned.contains("onclick"));
    }
}
