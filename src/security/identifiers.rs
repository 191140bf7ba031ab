//! Identifier normalization and message sanitization.
//!
//! Table names are compared case-insensitively with any schema qualifier
//! and quoting removed, so `"Sales"."Orders"`, `[sales].[orders]` and
//! `orders` all refer to the same table.

/// Quote characters that may wrap an identifier segment.
const QUOTE_CHARS: &[char] = &['"', '`', '[', ']'];

/// Split a possibly schema-qualified identifier into (qualifier, name).
///
/// Only the last dot separates the name. Dots inside quoted segments are
/// respected, so `"my.schema".orders` yields `("my.schema", "orders")`.
pub fn parse_qualified_name(identifier: &str) -> (Option<String>, String) {
    let segments = split_segments(identifier);
    match segments.split_last() {
        Some((name, qualifier)) if !qualifier.is_empty() => {
            (Some(qualifier.join(".")), name.clone())
        }
        Some((name, _)) => (None, name.clone()),
        None => (None, String::new()),
    }
}

/// Normalize a table reference for comparison: strip schema qualifiers and
/// quote characters, then lower-case.
pub fn normalize_table_name(identifier: &str) -> String {
    let (_, name) = parse_qualified_name(identifier.trim());
    name.to_lowercase()
}

/// Truncate an identifier before echoing it in a user-facing message.
pub fn truncate_identifier(identifier: &str, max_chars: usize) -> String {
    if identifier.chars().count() <= max_chars {
        identifier.to_string()
    } else {
        let head: String = identifier.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

/// Truncate query text for log output.
pub fn truncate_for_log(s: &str, max_chars: usize) -> String {
    truncate_identifier(s, max_chars)
}

/// Split on dots outside quotes, removing the quote characters.
fn split_segments(identifier: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut closing: Option<char> = None;

    for ch in identifier.chars() {
        match closing {
            Some(close) if ch == close => closing = None,
            Some(_) => current.push(ch),
            None => match ch {
                '"' => closing = Some('"'),
                '`' => closing = Some('`'),
                '[' => closing = Some(']'),
                '.' => segments.push(std::mem::take(&mut current)),
                c if QUOTE_CHARS.contains(&c) => {}
                c => current.push(c),
            },
        }
    }
    segments.push(current);

    segments
        .into_iter()
        .map(|s| s.trim().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_qualified_name() {
        let (schema, name) = parse_qualified_name("public.orders");
        assert_eq!(schema.as_deref(), Some("public"));
        assert_eq!(name, "orders");

        let (schema, name) = parse_qualified_name("orders");
        assert_eq!(schema, None);
        assert_eq!(name, "orders");

        let (schema, name) = parse_qualified_name("db.sales.orders");
        assert_eq!(schema.as_deref(), Some("db.sales"));
        assert_eq!(name, "orders");
    }

    #[test]
    fn test_quoted_segments() {
        let (schema, name) = parse_qualified_name(r#""my.schema"."Order Items""#);
        assert_eq!(schema.as_deref(), Some("my.schema"));
        assert_eq!(name, "Order Items");

        let (_, name) = parse_qualified_name("[dbo].[Users]");
        assert_eq!(name, "Users");

        let (_, name) = parse_qualified_name("`analytics`.`events`");
        assert_eq!(name, "events");
    }

    #[test]
    fn test_normalize_table_name() {
        assert_eq!(normalize_table_name("Orders"), "orders");
        assert_eq!(normalize_table_name("public.Orders"), "orders");
        assert_eq!(normalize_table_name(r#""Sales"."Orders""#), "orders");
        assert_eq!(normalize_table_name("[sales].[orders]"), "orders");
        assert_eq!(normalize_table_name("  customers "), "customers");
    }

    #[test]
    fn test_truncate_identifier() {
        assert_eq!(truncate_identifier("orders", 10), "orders");
        assert_eq!(truncate_identifier("abcdefghij", 4), "abcd...");
        assert_eq!(truncate_identifier("ééééé", 2), "éé...");
    }
}
