//! Locating include tags in a page body.
//!
//! Only `<esi:include .../>` and `<esi:include ...>...</esi:include>` are
//! recognized. Everything else in the page is opaque bytes.

use std::ops::Range;

const OPEN: &[u8] = b"<esi:";
const KEYWORD: &[u8] = b"include";
const CLOSE: &[u8] = b"</esi:include>";

/// One include tag found in a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSpan {
    /// The whole tag, replaced on splicing.
    pub span: Range<usize>,
    /// The directive text handed to the parser: from `include` up to, but not
    /// including, the closing `>` or `/>`.
    pub directive: Range<usize>,
}

/// Find every include tag in `body`, in document order.
///
/// A `>` inside a double-quoted value does not end a tag. Scanning stops at the
/// first tag that is not terminated; the rest of the body is left alone.
pub fn scan(body: &[u8]) -> Vec<TagSpan> {
    let mut tags = Vec::new();
    let mut pos = 0;

    while let Some(offset) = find(&body[pos..], OPEN) {
        let start = pos + offset;
        let directive_start = start + OPEN.len();

        if !is_include(&body[directive_start..]) {
            pos = directive_start;
            continue;
        }

        let Some(gt) = find_tag_end(body, directive_start) else {
            break;
        };

        let self_closing = gt > directive_start && body[gt - 1] == b'/';
        let (directive_end, end) = if self_closing {
            (gt - 1, gt + 1)
        } else {
            match find(&body[gt + 1..], CLOSE) {
                Some(close) => (gt, gt + 1 + close + CLOSE.len()),
                None => break,
            }
        };

        tags.push(TagSpan {
            span: start..end,
            directive: directive_start..directive_end,
        });
        pos = end;
    }

    tags
}

/// `include` followed by whitespace, `/` or `>`.
fn is_include(rest: &[u8]) -> bool {
    rest.starts_with(KEYWORD)
        && rest
            .get(KEYWORD.len())
            .is_some_and(|b| b.is_ascii_whitespace() || *b == b'/' || *b == b'>')
}

/// Position of the `>` closing the opening tag, skipping quoted values.
fn find_tag_end(body: &[u8], from: usize) -> Option<usize> {
    let mut in_quotes = false;
    for (i, b) in body.iter().enumerate().skip(from) {
        match b {
            b'"' => in_quotes = !in_quotes,
            b'>' if !in_quotes => return Some(i),
            _ => {}
        }
    }
    None
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directives(body: &str) -> Vec<&str> {
        scan(body.as_bytes())
            .into_iter()
            .map(|t| &body[t.directive])
            .collect()
    }

    #[test]
    fn test_self_closing() {
        let body = r#"<p>a</p><esi:include src="https://a/cart" /><p>b</p>"#;
        let tags = scan(body.as_bytes());
        assert_eq!(tags.len(), 1);
        assert_eq!(&body[tags[0].span.clone()], r#"<esi:include src="https://a/cart" />"#);
        assert_eq!(&body[tags[0].directive.clone()], r#"include src="https://a/cart" "#);
    }

    #[test]
    fn test_block_form() {
        let body = r#"x<esi:include src="https://a/cart">ignored</esi:include>y"#;
        let tags = scan(body.as_bytes());
        assert_eq!(tags.len(), 1);
        assert_eq!(
            &body[tags[0].span.clone()],
            r#"<esi:include src="https://a/cart">ignored</esi:include>"#
        );
        assert_eq!(&body[tags[0].directive.clone()], r#"include src="https://a/cart""#);
    }

    #[test]
    fn test_quoted_gt() {
        let body = r#"<esi:include src="https://a/?q=a>b" onerror="<b>down</b>"/>"#;
        assert_eq!(
            directives(body),
            vec![r#"include src="https://a/?q=a>b" onerror="<b>down</b>""#]
        );
    }

    #[test]
    fn test_document_order_and_multiline() {
        let body = "<esi:include src=\"https://a/1\"/>\n<esi:include\n\tsrc=\"https://a/2\"\n/>";
        assert_eq!(
            directives(body),
            vec!["include src=\"https://a/1\"", "include\n\tsrc=\"https://a/2\"\n"]
        );
    }

    #[test]
    fn test_unterminated_stops_scanning() {
        let body = r#"<esi:include src="https://a/1"/><esi:include src="https://a/2" <p>rest"#;
        assert_eq!(directives(body), vec![r#"include src="https://a/1""#]);

        let body = r#"<esi:include src="https://a/1">no close"#;
        assert!(scan(body.as_bytes()).is_empty());
    }

    #[test]
    fn test_other_esi_tags_ignored() {
        let body = r#"<esi:remove>x</esi:remove><esi:includes/><esi:include src="https://a/1"/>"#;
        assert_eq!(directives(body), vec![r#"include src="https://a/1""#]);
    }

    #[test]
    fn test_no_tags() {
        assert!(scan(b"<html><body>plain</body></html>").is_empty());
        assert!(scan(b"").is_empty());
    }
}
