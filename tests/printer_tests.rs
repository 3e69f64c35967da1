use clonk::compile;

fn print(source: &str) -> String {
    compile(source).expect("source should compile").to_string()
}

#[test]
fn prints_a_minimal_function() {
    let expected = r#"define i64 @f() {
entry:
  ret i64 1
}
"#;
    assert_eq!(print("f() { return 1; }"), expected);
}

#[test]
fn prints_externs_before_functions() {
    let expected = r#"declare i64 @g(i64, i64)

define i64 @f() {
entry:
  %0 = call i64 @g(i64 1, i64 2)
  ret i64 %0
}
"#;
    assert_eq!(print("f() { return g(1, 2); }"), expected);
}

#[test]
fn prints_comparisons_with_sign_extension() {
    let expected = r#"define i64 @f(i64 %a, i64 %b) {
entry:
  %0 = icmp slt i64 %a, %b
  %1 = sext i1 %0 to i64
  ret i64 %1
}
"#;
    assert_eq!(print("f(a, b) { return a < b; }"), expected);
}

#[test]
fn prints_indexed_loads_with_conversions() {
    let expected = r#"define i64 @f(i64 %p) {
entry:
  %0 = inttoptr i64 %p to ptr
  %1 = getelementptr i32, ptr %0, i64 2
  %2 = load i32, ptr %1
  %3 = sext i32 %2 to i64
  ret i64 %3
}
"#;
    assert_eq!(print("f(p) { return p[2@4]; }"), expected);
}

#[test]
fn prints_the_if_else_diamond_with_named_allocas() {
    let expected = r#"define i64 @f(i64 %a) {
entry:
  %x = alloca i64
  store i64 0, ptr %x
  br label if0.cond
if0.cond:
  %0 = icmp ne i64 %a, 0
  br i1 %0, label if0.body, label if0.else
if0.end:
  %1 = phi i64 [ 1, if0.body ], [ 2, if0.else ]
  ret i64 %1
if0.body:
  store i64 1, ptr %x
  br label if0.end
if0.else:
  store i64 2, ptr %x
  br label if0.end
}
"#;
    assert_eq!(
        print("f(a) { auto x = 0; if (a) x = 1; else x = 2; return x; }"),
        expected
    );
}

#[test]
fn prints_address_of_an_auto_local() {
    let expected = r#"define i64 @f() {
entry:
  %x = alloca i64
  store i64 7, ptr %x
  %0 = ptrtoint ptr %x to i64
  ret i64 %0
}
"#;
    assert_eq!(print("f() { auto x = 7; return &x; }"), expected);
}

#[test]
fn prints_narrow_stores_through_element_pointers() {
    let expected = r#"define i64 @f(i64 %p, i64 %v) {
entry:
  %0 = inttoptr i64 %p to ptr
  %1 = getelementptr i16, ptr %0, i64 3
  store i16 %v, ptr %1
  ret i64 %v
}
"#;
    assert_eq!(print("f(p, v) { return p[3@2] = v; }"), expected);
}
