//! HCL string literals.

/// Quote `input` as an HCL string literal.
///
/// Non-ASCII text is kept as-is (HCL files are UTF-8). Template openers
/// `${` and `%{` are doubled so values are never interpolated.
pub fn quote(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 2);
    out.push('"');
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '$' | '%' if chars.peek() == Some(&'{') => {
                out.push(ch);
                out.push(ch);
            }
            ch if ch.is_control() => out.push_str(&format!("\\u{:04x}", ch as u32)),
            ch => out.push(ch),
        }
    }
    out.push('"');
    out
}

/// `"a", "b", "c"`
pub fn quoted_list<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| quote(&i.to_string()))
        .collect::<Vec<_>>()
        .join(", ")
}
