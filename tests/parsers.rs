//! Output parser tests: candidate lines and labelled body/footer sections.

use git_cx::parsers::{Detail, parse_candidates, parse_detail_output};

// ---------------------------------------------------------------------------
// Candidates
// ---------------------------------------------------------------------------

#[test]
fn candidates_skip_blank_lines_and_trim() {
    let out = "  feat: add login  \n\n\t\nfix(api): handle 404\r\n";
    assert_eq!(
        parse_candidates(out, 5),
        vec!["feat: add login", "fix(api): handle 404"]
    );
}

#[test]
fn candidates_capped_in_source_order() {
    let out = "feat: one\nfix: two\ndocs: three\nchore: four";
    assert_eq!(parse_candidates(out, 2), vec!["feat: one", "fix: two"]);
}

#[test]
fn candidates_zero_max_keeps_everything() {
    let out = "a\nb\nc";
    assert_eq!(parse_candidates(out, 0).len(), 3);
}

#[test]
fn candidates_from_empty_output() {
    assert!(parse_candidates("", 3).is_empty());
    assert!(parse_candidates("\n  \n", 3).is_empty());
}

#[test]
fn candidates_keep_numbering() {
    let out = "1. feat: add cache\n2. fix: evict stale keys";
    assert_eq!(
        parse_candidates(out, 3),
        vec!["1. feat: add cache", "2. fix: evict stale keys"]
    );
}

#[test]
fn candidates_are_never_empty_strings() {
    let out = "x\n\n \n y \n\n\nz";
    let parsed = parse_candidates(out, 0);
    assert!(parsed.iter().all(|c| !c.is_empty() && c.trim() == c));
    assert_eq!(parsed, vec!["x", "y", "z"]);
}

// ---------------------------------------------------------------------------
// Detail
// ---------------------------------------------------------------------------

#[test]
fn detail_splits_body_and_footer() {
    let out = "Body:\nline1\nline2\nFooter:\nRefs: #1\nReviewed-by: bot";
    assert_eq!(
        parse_detail_output(out),
        Detail {
            body: "line1\nline2".to_string(),
            footer: "Refs: #1\nReviewed-by: bot".to_string(),
        }
    );
}

#[test]
fn detail_from_empty_output() {
    let detail = parse_detail_output("");
    assert!(detail.is_empty());
    assert_eq!(detail, Detail::default());
}

#[test]
fn detail_footer_only() {
    let detail = parse_detail_output("Footer:\nonly-footer");
    assert_eq!(detail.body, "");
    assert_eq!(detail.footer, "only-footer");
}

#[test]
fn detail_discards_preamble() {
    let out = "Sure! Here you go:\n\nBody:\nexplain the change\n\nFooter:\n";
    let detail = parse_detail_output(out);
    assert_eq!(detail.body, "explain the change");
    assert_eq!(detail.footer, "");
}

#[test]
fn detail_without_labels_is_empty() {
    let detail = parse_detail_output("just some text\nwith no labels");
    assert!(detail.is_empty());
}

#[test]
fn detail_labels_are_case_sensitive() {
    let detail = parse_detail_output("body:\nlower\nBody:\nupper");
    assert_eq!(detail.body, "upper");
}

#[test]
fn detail_label_tolerates_surrounding_whitespace() {
    let detail = parse_detail_output("  Body:  \nindented body\n Footer:\nBREAKING CHANGE: x");
    assert_eq!(detail.body, "indented body");
    assert_eq!(detail.footer, "BREAKING CHANGE: x");
}

#[test]
fn detail_keeps_inner_blank_lines() {
    let detail =
        parse_detail_output("Body:\nfirst paragraph\n\nsecond paragraph\n\nFooter:\nRefs: #9");
    assert_eq!(detail.body, "first paragraph\n\nsecond paragraph");
}

#[test]
fn detail_repeated_label_keeps_accumulating() {
    let detail = parse_detail_output("Body:\none\nFooter:\nRefs: #1\nBody:\ntwo");
    assert_eq!(detail.body, "one\ntwo");
    assert_eq!(detail.footer, "Refs: #1");
}
