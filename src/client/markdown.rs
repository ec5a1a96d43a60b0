// src/client/markdown.rs
use once_cell::sync::Lazy;
use regex::Regex;

static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#{2,3} (.+)$").expect("valid heading regex"));
static BOLD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid bold regex"));
static LIST_ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^- (.+)$").expect("valid list item regex"));

/// Converts the restricted markdown subset the consultant model emits
/// (`##`/`###` headings, `**bold**`, `- ` lists, blank-line paragraph breaks)
/// into HTML. Fixed-order substitutions over line-anchored patterns, not a
/// markdown parser; running it on its own output is a no-op because every
/// marker is consumed and the output carries no newlines.
pub fn render_html(input: &str) -> String {
    let headed = HEADING_RE.replace_all(input, "<h3 class=\"report-h3\">$1</h3>");
    let bolded = BOLD_RE.replace_all(&headed, "<strong>$1</strong>");
    let listed = LIST_ITEM_RE.replace_all(&bolded, "<li>$1</li>");

    let mut out = String::with_capacity(listed.len());
    let mut in_list = false;
    let mut blank_run = 0usize;
    for line in listed.split('\n') {
        if line.trim().is_empty() {
            blank_run += 1;
            continue;
        }
        let is_item = line.starts_with("<li>");
        if in_list {
            if is_item {
                out.push_str(line);
                blank_run = 0;
                continue;
            }
            out.push_str("</ul>");
            in_list = false;
        }
        if !out.is_empty() {
            out.push_str(if blank_run >= 1 { "<br /><br />" } else { "<br />" });
        }
        if is_item {
            out.push_str("<ul>");
            in_list = true;
        }
        out.push_str(line);
        blank_run = 0;
    }
    if in_list {
        out.push_str("</ul>");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "## 🪞 피부 분석\n톤이 밝은 편입니다.\n\n**추천** 제품:\n- 토너\n- 수분 크림\n\n### 마무리\n끝.";

    #[test]
    fn renders_the_supported_subset() {
        let html = render_html(SAMPLE);
        assert!(html.contains("<h3 class=\"report-h3\">🪞 피부 분석</h3>"));
        assert!(html.contains("<h3 class=\"report-h3\">마무리</h3>"));
        assert!(html.contains("<strong>추천</strong>"));
        assert!(html.contains("<ul><li>토너</li><li>수분 크림</li></ul>"));
        assert!(html.contains("<br /><br />"));
        assert!(!html.contains('\n'));
    }

    #[test]
    fn single_newlines_become_single_breaks() {
        assert_eq!(render_html("첫 줄\n둘째 줄"), "첫 줄<br />둘째 줄");
        assert_eq!(render_html("첫 줄\n\n둘째 줄"), "첫 줄<br /><br />둘째 줄");
    }

    #[test]
    fn a_leading_list_opens_the_output() {
        assert_eq!(
            render_html("- 하나\n- 둘"),
            "<ul><li>하나</li><li>둘</li></ul>"
        );
    }

    #[test]
    fn markers_must_sit_at_line_start() {
        let html = render_html("가격은 10 - 20달러 사이, ## 참고 ##");
        assert!(!html.contains("<li>"));
        assert!(!html.contains("<h3"));
    }

    #[test]
    fn second_application_is_a_no_op() {
        let once = render_html(SAMPLE);
        assert_eq!(render_html(&once), once);

        let list_only = render_html("- 하나\n- 둘");
        assert_eq!(render_html(&list_only), list_only);
    }
}
