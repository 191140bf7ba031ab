//! Table reference extraction.
//!
//! Finds the tables a query reads from by scanning `FROM` and `JOIN`
//! clauses in the token stream. No AST is built. When the tokenizer rejects
//! the input, a regex scan over the raw text is used instead, so extraction
//! always produces a (possibly empty) result.

use crate::security::normalize_table_name;
use once_cell::sync::Lazy;
use regex::Regex;
use sqlparser::dialect::GenericDialect;
use sqlparser::tokenizer::{Token, Tokenizer, Word};
use std::collections::BTreeSet;
use tracing::debug;

/// Functions whose argument list uses `FROM` without naming a table,
/// e.g. `EXTRACT(YEAR FROM created_at)`.
const FROM_ARGUMENT_FUNCTIONS: &[&str] = &["EXTRACT", "SUBSTRING", "TRIM", "POSITION", "OVERLAY"];

/// Words that end a table reference; anything else following a table name
/// is taken as its alias.
const CLAUSE_WORDS: &[&str] = &[
    "ON", "USING", "WHERE", "GROUP", "ORDER", "HAVING", "LIMIT", "OFFSET", "FETCH", "WINDOW",
    "QUALIFY", "UNION", "EXCEPT", "INTERSECT", "JOIN", "INNER", "LEFT", "RIGHT", "FULL",
    "CROSS", "OUTER", "NATURAL", "LATERAL", "TABLESAMPLE", "FOR", "AS",
];

/// Words that open a subquery inside parentheses.
const SUBQUERY_WORDS: &[&str] = &["SELECT", "WITH", "VALUES"];

/// Identifier segment: bare word or quoted with `"`, backticks or brackets.
const SEGMENT: &str = r#"(?:[\w$]+|"[^"]+"|`[^`]+`|\[[^\]]+\])"#;

static FALLBACK_TABLE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(r"(?i)\b(?:FROM|JOIN)\s+({seg}(?:\s*\.\s*{seg})*)", seg = SEGMENT);
    Regex::new(&pattern)
        .unwrap_or_else(|e| panic!("Internal error: invalid table pattern: {}", e))
});

static DOT_SPACING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s*\.\s*")
        .unwrap_or_else(|e| panic!("Internal error: invalid spacing pattern: {}", e))
});

static FALLBACK_CTE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\bWITH(?:\s+RECURSIVE)?|,)\s*([\w$]+)\s*(?:\([^)]*\))?\s*AS\s*(?:NOT\s+)?(?:MATERIALIZED\s*)?\(")
        .unwrap_or_else(|e| panic!("Internal error: invalid CTE pattern: {}", e))
});

/// Tables referenced by a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableReferences {
    /// Normalized names following `FROM` / `JOIN`
    pub tables: BTreeSet<String>,
    /// Normalized names declared by `WITH name AS (...)`
    pub cte_names: BTreeSet<String>,
}

impl TableReferences {
    /// Referenced tables that are not CTEs declared by the query itself.
    pub fn external_tables(&self) -> impl Iterator<Item = &String> {
        self.tables
            .iter()
            .filter(move |t| !self.cte_names.contains(*t))
    }
}

/// Extract the distinct table names a query reads from.
pub fn extract_tables(sql: &str) -> BTreeSet<String> {
    extract_table_references(sql).tables
}

/// Extract table references and CTE names from a query.
pub fn extract_table_references(sql: &str) -> TableReferences {
    let dialect = GenericDialect {};
    match Tokenizer::new(&dialect, sql).tokenize() {
        Ok(tokens) => {
            let significant: Vec<Token> = tokens
                .into_iter()
                .filter(|t| !matches!(t, Token::Whitespace(_)))
                .collect();
            TokenScanner::new(&significant).scan()
        }
        Err(e) => {
            debug!("Tokenizer failed ({}), using regex table extraction", e);
            extract_with_regex(sql)
        }
    }
}

/// Regex-based extraction used when tokenization fails.
fn extract_with_regex(sql: &str) -> TableReferences {
    let tables = FALLBACK_TABLE_PATTERN
        .captures_iter(sql)
        .filter_map(|caps| caps.get(1))
        .map(|m| normalize_table_name(&DOT_SPACING.replace_all(m.as_str(), ".")))
        .filter(|name| !name.is_empty())
        .collect();

    let cte_names = FALLBACK_CTE_PATTERN
        .captures_iter(sql)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
        .collect();

    TableReferences { tables, cte_names }
}

/// Scanner over significant (non-whitespace, non-comment) tokens.
struct TokenScanner<'a> {
    tokens: &'a [Token],
}

impl<'a> TokenScanner<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens }
    }

    fn scan(&self) -> TableReferences {
        let mut refs = TableReferences::default();
        // One entry per open parenthesis: true when it belongs to a function
        // whose arguments use FROM.
        let mut parens: Vec<bool> = Vec::new();

        for (pos, token) in self.tokens.iter().enumerate() {
            match token {
                Token::LParen => {
                    let from_args = pos
                        .checked_sub(1)
                        .and_then(|prev| self.word_at(prev))
                        .map(|w| FROM_ARGUMENT_FUNCTIONS.iter().any(|f| is_keyword(w, f)))
                        .unwrap_or(false);
                    parens.push(from_args);
                }
                Token::RParen => {
                    parens.pop();
                }
                Token::Word(word) if is_keyword(word, "FROM") => {
                    // `a IS DISTINCT FROM b` compares values
                    let after_distinct = pos
                        .checked_sub(1)
                        .and_then(|prev| self.word_at(prev))
                        .is_some_and(|w| is_keyword(w, "DISTINCT"));
                    if parens.last() != Some(&true) && !after_distinct {
                        self.read_table_list(pos + 1, &mut refs.tables);
                    }
                }
                Token::Word(word) if is_keyword(word, "JOIN") => {
                    self.read_table_item(pos + 1, &mut refs.tables);
                }
                Token::Word(word) if is_keyword(word, "WITH") => {
                    self.read_cte_list(pos + 1, &mut refs.cte_names);
                }
                _ => {}
            }
        }

        refs
    }

    /// Read `FROM a [alias], b [alias], ...`.
    fn read_table_list(&self, mut pos: usize, tables: &mut BTreeSet<String>) {
        loop {
            let Some(next) = self.read_table_item(pos, tables) else {
                return;
            };

            pos = self.skip_alias(next);
            if matches!(self.tokens.get(pos), Some(Token::Comma)) {
                pos += 1;
            } else {
                return;
            }
        }
    }

    /// Read one `FROM` / `JOIN` item: a table, a parenthesized table list
    /// such as `(orders)`, a derived table or a table function. Returns the
    /// position after the item.
    fn read_table_item(&self, pos: usize, tables: &mut BTreeSet<String>) -> Option<usize> {
        if let Some((name, next)) = self.read_table(pos) {
            tables.insert(name);
            return Some(next);
        }

        let Some(end) = self.skip_to_group_end(pos) else {
            // `generate_series(1, 10)`: skip the argument list
            return match self.tokens.get(pos + 1) {
                Some(Token::LParen) if self.word_at(pos).is_some() => {
                    self.skip_to_group_end(pos + 1)
                }
                _ => None,
            };
        };
        // A subquery's own FROM / JOIN clauses are picked up by the main scan
        let is_subquery = self
            .word_at(pos + 1)
            .is_some_and(|w| SUBQUERY_WORDS.iter().any(|k| is_keyword(w, k)));
        if !is_subquery {
            self.read_table_list(pos + 1, tables);
        }
        Some(end)
    }

    /// Read one table reference starting at `pos`, returning the normalized
    /// name and the position after it.
    fn read_table(&self, mut pos: usize) -> Option<(String, usize)> {
        if let Some(word) = self.word_at(pos) {
            if is_keyword(word, "LATERAL") {
                return None;
            }
            if is_keyword(word, "ONLY") {
                pos += 1;
            }
        }

        let (mut name, mut pos) = self.read_segment(pos)?;
        while matches!(self.tokens.get(pos), Some(Token::Period)) {
            let (segment, next) = self.read_segment(pos + 1)?;
            name = segment;
            pos = next;
        }

        // `FROM generate_series(...)` is a table function, not a table
        if matches!(self.tokens.get(pos), Some(Token::LParen)) {
            return None;
        }

        let name = name.to_lowercase();
        if name.is_empty() {
            None
        } else {
            Some((name, pos))
        }
    }

    /// Read one identifier segment: a word or a `[bracketed]` word.
    fn read_segment(&self, pos: usize) -> Option<(String, usize)> {
        match self.tokens.get(pos)? {
            Token::Word(word) => Some((word.value.clone(), pos + 1)),
            Token::LBracket => {
                let mut value = String::new();
                let mut cursor = pos + 1;
                loop {
                    match self.tokens.get(cursor)? {
                        Token::RBracket => return Some((value, cursor + 1)),
                        Token::Word(word) => {
                            // Whitespace tokens were dropped; restore word gaps
                            if !value.is_empty() {
                                value.push(' ');
                            }
                            value.push_str(&word.value);
                        }
                        other => value.push_str(&other.to_string()),
                    }
                    cursor += 1;
                }
            }
            _ => None,
        }
    }

    /// Skip an optional `[AS] alias [(columns)]` after a table reference.
    fn skip_alias(&self, pos: usize) -> usize {
        let next = self.skip_alias_name(pos);
        if next > pos {
            if let Some(end) = self.skip_to_group_end(next) {
                return end;
            }
        }
        next
    }

    fn skip_alias_name(&self, pos: usize) -> usize {
        match self.word_at(pos) {
            Some(word) if is_keyword(word, "AS") => {
                if self.word_at(pos + 1).is_some() {
                    pos + 2
                } else {
                    pos + 1
                }
            }
            Some(word) if !is_clause_word(word) => pos + 1,
            _ => pos,
        }
    }

    /// If `pos` starts a parenthesized group, return the position after
    /// its closing parenthesis.
    fn skip_to_group_end(&self, pos: usize) -> Option<usize> {
        if !matches!(self.tokens.get(pos), Some(Token::LParen)) {
            return None;
        }
        let mut depth = 0usize;
        for (offset, token) in self.tokens[pos..].iter().enumerate() {
            match token {
                Token::LParen => depth += 1,
                Token::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(pos + offset + 1);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Read `[RECURSIVE] name [(cols)] AS [NOT] [MATERIALIZED] (...) [, ...]`.
    fn read_cte_list(&self, mut pos: usize, names: &mut BTreeSet<String>) {
        if self.word_at(pos).is_some_and(|w| is_keyword(w, "RECURSIVE")) {
            pos += 1;
        }

        loop {
            let Some(word) = self.word_at(pos) else {
                return;
            };
            let name = word.value.to_lowercase();
            pos += 1;

            if let Some(next) = self.skip_to_group_end(pos) {
                pos = next;
            }
            if !self.word_at(pos).is_some_and(|w| is_keyword(w, "AS")) {
                return;
            }
            pos += 1;
            if self.word_at(pos).is_some_and(|w| is_keyword(w, "NOT")) {
                pos += 1;
            }
            if self.word_at(pos).is_some_and(|w| is_keyword(w, "MATERIALIZED")) {
                pos += 1;
            }
            let Some(next) = self.skip_to_group_end(pos) else {
                return;
            };
            names.insert(name);

            pos = next;
            if matches!(self.tokens.get(pos), Some(Token::Comma)) {
                pos += 1;
            } else {
                return;
            }
        }
    }

    fn word_at(&self, pos: usize) -> Option<&Word> {
        match self.tokens.get(pos) {
            Some(Token::Word(word)) => Some(word),
            _ => None,
        }
    }
}

/// Unquoted word equal to `keyword`, ignoring case.
fn is_keyword(word: &Word, keyword: &str) -> bool {
    word.quote_style.is_none() && word.value.eq_ignore_ascii_case(keyword)
}

fn is_clause_word(word: &Word) -> bool {
    CLAUSE_WORDS.iter().any(|k| is_keyword(word, k))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables(sql: &str) -> Vec<String> {
        extract_tables(sql).into_iter().collect()
    }

    #[test]
    fn test_simple_from() {
        assert_eq!(tables("SELECT * FROM orders"), vec!["orders"]);
        assert_eq!(tables("select * from Orders where id = 1"), vec!["orders"]);
    }

    #[test]
    fn test_joins_and_aliases() {
        assert_eq!(
            tables("SELECT COUNT(*) FROM orders o JOIN customers c ON o.customer_id = c.id"),
            vec!["customers", "orders"]
        );
        assert_eq!(
            tables(
                "SELECT * FROM a INNER JOIN b ON a.id = b.id LEFT OUTER JOIN c ON c.id = a.id \
                 RIGHT JOIN d ON d.id = a.id FULL JOIN e ON e.id = a.id CROSS JOIN f"
            ),
            vec!["a", "b", "c", "d", "e", "f"]
        );
    }

    #[test]
    fn test_qualified_and_quoted_names() {
        assert_eq!(tables("SELECT * FROM public.orders"), vec!["orders"]);
        assert_eq!(tables(r#"SELECT * FROM "Sales"."Order Items""#), vec!["order items"]);
        assert_eq!(tables("SELECT * FROM `analytics`.`Events`"), vec!["events"]);
        assert_eq!(tables("SELECT * FROM [dbo].[Users]"), vec!["users"]);
    }

    #[test]
    fn test_comma_separated_from() {
        assert_eq!(
            tables("SELECT * FROM orders o, customers AS c, products WHERE o.id = c.id"),
            vec!["customers", "orders", "products"]
        );
    }

    #[test]
    fn test_comment_between_from_and_table() {
        assert_eq!(tables("SELECT * FROM /* note */ orders"), vec!["orders"]);
    }

    #[test]
    fn test_subqueries() {
        assert_eq!(
            tables("SELECT * FROM (SELECT id FROM orders) sub JOIN customers c ON c.id = sub.id"),
            vec!["customers", "orders"]
        );
        assert_eq!(
            tables("SELECT * FROM (SELECT 1) x, products"),
            vec!["products"]
        );
    }

    #[test]
    fn test_parenthesized_table_reference() {
        assert_eq!(tables("SELECT * FROM (custmers)"), vec!["custmers"]);
        assert_eq!(tables("SELECT * FROM ((orders)) o"), vec!["orders"]);
        assert_eq!(
            tables("SELECT * FROM (orders o JOIN customers c ON o.id = c.id)"),
            vec!["customers", "orders"]
        );
        assert_eq!(tables("SELECT * FROM (VALUES (1), (2)) v(x)"), Vec::<String>::new());
    }

    #[test]
    fn test_alias_column_list() {
        assert_eq!(
            tables("SELECT * FROM orders AS o(a, b), custmers"),
            vec!["custmers", "orders"]
        );
        assert_eq!(
            tables("SELECT * FROM (SELECT 1, 2) AS d(x, y), products p"),
            vec!["products"]
        );
    }

    #[test]
    fn test_table_function_keeps_list_going() {
        assert_eq!(
            tables("SELECT * FROM generate_series(1, 10) g, orders"),
            vec!["orders"]
        );
    }

    #[test]
    fn test_extract_function_is_not_a_table() {
        assert_eq!(
            tables("SELECT EXTRACT(YEAR FROM created_at) AS y FROM orders"),
            vec!["orders"]
        );
        assert_eq!(
            tables("SELECT SUBSTRING(name FROM 1 FOR 3) FROM customers"),
            vec!["customers"]
        );
    }

    #[test]
    fn test_is_distinct_from_is_not_a_table() {
        assert_eq!(
            tables("SELECT * FROM orders WHERE status IS DISTINCT FROM 'open'"),
            vec!["orders"]
        );
    }

    #[test]
    fn test_table_function_is_not_a_table() {
        assert!(tables("SELECT * FROM generate_series(1, 10)").is_empty());
    }

    #[test]
    fn test_cte_names() {
        let refs = extract_table_references(
            "WITH recent AS (SELECT * FROM orders), top_c (id) AS (SELECT id FROM customers) \
             SELECT * FROM recent JOIN top_c ON recent.id = top_c.id",
        );
        assert_eq!(
            refs.cte_names,
            BTreeSet::from(["recent".to_string(), "top_c".to_string()])
        );
        let external: Vec<&String> = refs.external_tables().collect();
        assert_eq!(external, vec!["customers", "orders"]);
    }

    #[test]
    fn test_recursive_cte() {
        let refs = extract_table_references(
            "WITH RECURSIVE t(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM t) SELECT * FROM t",
        );
        assert!(refs.cte_names.contains("t"));
        assert_eq!(refs.external_tables().count(), 0);
    }

    #[test]
    fn test_no_tables() {
        assert!(tables("SELECT 1").is_empty());
        assert!(tables("").is_empty());
    }

    #[test]
    fn test_regex_fallback_on_tokenizer_error() {
        // Unterminated string literal fails tokenization
        let refs = extract_table_references("SELECT * FROM public.orders JOIN customers WHERE x = 'oops");
        assert_eq!(
            refs.tables,
            BTreeSet::from(["customers".to_string(), "orders".to_string()])
        );
    }

    #[test]
    fn test_regex_fallback_cte() {
        let refs = extract_with_regex("WITH t AS (SELECT 1) SELECT * FROM t");
        assert!(refs.cte_names.contains("t"));
        assert!(refs.tables.contains("t"));
    }
}
