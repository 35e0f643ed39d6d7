//! Reload script injection.

use crate::embed::serve::LIVERELOAD_PATH;

/// Inject the reload script tag if `content_type` is HTML.
pub fn maybe_inject_livereload(body: Vec<u8>, content_type: &str, ws_port: Option<u16>) -> Vec<u8> {
    match (content_type.starts_with("text/html"), ws_port) {
        (true, Some(_)) => inject_script(&body),
        _ => body,
    }
}

/// Insert the script tag before the last `</body>`, or append it.
fn inject_script(content: &[u8]) -> Vec<u8> {
    let script = format!(r#"<script src="{LIVERELOAD_PATH}"></script>"#);
    let script = script.as_bytes();
    const PATTERN: &[u8] = b"</body>";

    let at = content
        .windows(PATTERN.len())
        .rposition(|w| w.eq_ignore_ascii_case(PATTERN))
        .unwrap_or(content.len());

    let mut result = Vec::with_capacity(content.len() + script.len());
    result.extend_from_slice(&content[..at]);
    result.extend_from_slice(script);
    result.extend_from_slice(&content[at..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::mime::types::{CSS, HTML};

    #[test]
    fn test_inject_before_body_close() {
        let out = maybe_inject_livereload(b"<html><BODY>hi</BODY></html>".to_vec(), HTML, Some(1));
        let out = String::from_utf8(out).unwrap();
        assert_eq!(
            out,
            r#"<html><BODY>hi<script src="/__sitepipe/livereload.js"></script></BODY></html>"#
        );
    }

    #[test]
    fn test_append_without_body() {
        let out = maybe_inject_livereload(b"<p>fragment</p>".to_vec(), HTML, Some(1));
        assert!(String::from_utf8(out).unwrap().ends_with("</script>"));
    }

    #[test]
    fn test_skip_non_html_or_no_reload() {
        assert_eq!(maybe_inject_livereload(b"a{}".to_vec(), CSS, Some(1)), b"a{}");
        assert_eq!(maybe_inject_livereload(b"<body></body>".to_vec(), HTML, None), b"<body></body>");
    }
}
