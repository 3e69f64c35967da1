use clonk::errors::{render, underline, Diagnostics};
use clonk::parser::parse;

#[test]
fn underline_marks_the_column() {
    assert_eq!(underline("auto x = 1;", 6), "auto x = 1;\n-----^");
    assert_eq!(underline("x", 1), "x\n^");
}

#[test]
fn renders_error_with_source_line_and_marker() {
    let source = "f() {\n    auto x = 1;\n    auto x = 2;\n}\n";
    let (_, diagnostics) = parse(source);
    let rendered: Vec<_> = diagnostics
        .iter()
        .map(|diagnostic| render(source, diagnostic))
        .collect();
    assert_eq!(
        rendered,
        vec!["error in line 3: redeclared identifier \"x\"\n    auto x = 2;\n---------^"]
    );
}

#[test]
fn renders_unknown_token_at_its_position() {
    let source = "f() { return ?; }";
    let (_, diagnostics) = parse(source);
    let rendered: Vec<_> = diagnostics
        .iter()
        .map(|diagnostic| render(source, diagnostic))
        .collect();
    assert_eq!(
        rendered,
        vec!["error in line 1: unknown token\nf() { return ?; }\n-------------^"]
    );
}

#[test]
fn diagnostics_accumulate_in_order() {
    let mut diagnostics = Diagnostics::new();
    assert!(!diagnostics.is_error());
    diagnostics.error("first", 1, 1);
    diagnostics.error("second", 2, 4);
    assert!(diagnostics.is_error());
    assert_eq!(diagnostics.len(), 2);
    let messages: Vec<_> = diagnostics.iter().map(|d| d.message.as_str()).collect();
    assert_eq!(messages, vec!["first", "second"]);
}

#[test]
fn diagnostics_render_out_of_range_lines_without_panicking() {
    let mut diagnostics = Diagnostics::new();
    diagnostics.error("late error", 99, 3);
    let diagnostic = diagnostics.iter().next().expect("one diagnostic");
    assert_eq!(render("short", diagnostic), "error in line 99: late error\n\n--^");
}
