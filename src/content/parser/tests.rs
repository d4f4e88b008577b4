use super::*;

#[test]
fn parses_frontmatter_and_body() {
    let raw = "---\ntitle: Physical AI Foundations\nkeywords:\n  - embodiment\n  - perception\n---\n\nBodies ground intelligence in the physical world.\n";

    let (frontmatter, body) = parse_document(raw).expect("document parses");

    assert_eq!(frontmatter.title.as_deref(), Some("Physical AI Foundations"));
    assert_eq!(frontmatter.keywords, vec!["embodiment", "perception"]);
    assert_eq!(body, "Bodies ground intelligence in the physical world.");
}

#[test]
fn missing_frontmatter_yields_empty_metadata() {
    let raw = "Just prose, no metadata block.";

    let (frontmatter, body) = parse_document(raw).expect("document parses");

    assert_eq!(frontmatter, Frontmatter::default());
    assert_eq!(body, "Just prose, no metadata block.");
}

#[test]
fn unterminated_frontmatter_is_a_parse_error() {
    let raw = "---\ntitle: Broken\n\nThe fence never closes.";

    let err = parse_document(raw).expect_err("should fail");
    assert!(matches!(err, crate::RagError::Parse(_)));
}

#[test]
fn invalid_yaml_is_a_parse_error() {
    let raw = "---\ntitle: [unclosed\n---\nBody text.";

    let err = parse_document(raw).expect_err("should fail");
    assert!(matches!(err, crate::RagError::Parse(_)));
}

#[test]
fn strips_import_lines() {
    let cleaned = clean_markup("import Tabs from '@theme/Tabs';\n\nReal prose stays.");
    assert!(!cleaned.contains("import"));
    assert!(cleaned.contains("Real prose stays."));
}

#[test]
fn strips_component_tags_but_keeps_inner_text() {
    let cleaned = clean_markup("<Tabs>\n<TabItem value=\"ros\">\nInner explanation.\n</TabItem>\n</Tabs>");
    assert!(!cleaned.contains('<'));
    assert!(cleaned.contains("Inner explanation."));
}

#[test]
fn strips_self_closing_components() {
    let cleaned = clean_markup("Before.\n\n<BrowserWindow url=\"http://localhost\"/>\n\nAfter.");
    assert!(!cleaned.contains("BrowserWindow"));
    assert!(cleaned.contains("Before."));
    assert!(cleaned.contains("After."));
}

#[test]
fn strips_html_comments() {
    let cleaned = clean_markup("Visible.\n<!-- hidden\nacross lines -->\nAlso visible.");
    assert!(!cleaned.contains("hidden"));
    assert!(cleaned.contains("Visible."));
    assert!(cleaned.contains("Also visible."));
}

#[test]
fn strips_code_fence_language_annotations() {
    let cleaned = clean_markup("```python\nprint('hi')\n```\n");
    assert!(cleaned.starts_with("```\n"));
    assert!(cleaned.contains("print('hi')"));
}

#[test]
fn collapses_runs_of_blank_lines() {
    let cleaned = clean_markup("First paragraph.\n\n\n\n\nSecond paragraph.");
    assert_eq!(cleaned, "First paragraph.\n\nSecond paragraph.");
}

#[test]
fn plain_prose_is_unchanged() {
    let prose = "ROS 2 nodes communicate over topics.\n\nQoS profiles tune delivery guarantees.";
    assert_eq!(clean_markup(prose), prose);
}

#[test]
fn lowercase_html_tags_are_left_alone() {
    // Only component tags (capitalized) are markup to strip
    let text = "Values <b>matter</b> when a < b in math.";
    assert_eq!(clean_markup(text), text);
}
