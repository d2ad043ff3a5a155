//! Statement classification and decoding.
//!
//! Recognition is byte-prefix based (keyword matching on the comment-stripped
//! statement head); regexes are only used for line-level sub-patterns like
//! column definitions, never over whole statements.

use once_cell::sync::Lazy;
use regex::Regex;

/// Column definition line inside a CREATE TABLE body: `` `name` <type...> ``.
static COLUMN_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*`([^`]+)`\s+\S").unwrap());

/// Backtick-quoted names inside an INSERT column list.
static BACKTICK_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub table: String,
    pub columns: Vec<String>,
    pub auto_increment_column: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub table: String,
    /// Explicit column list, if the statement carries one.
    pub columns: Option<Vec<String>>,
    /// Raw VALUES remainder, trailing `;` stripped.
    pub values: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable(CreateTable),
    Insert(Insert),
}

/// Classifies one statement string. Returns `None` for anything that is not
/// a CREATE TABLE or INSERT (SET, LOCK TABLES, UPDATE, comments, ...).
pub fn classify(raw: &str) -> Option<Statement> {
    let sql = strip_leading_comments(raw);
    if sql.is_empty() {
        return None;
    }

    if let Some(rest) = match_keywords(sql, &["CREATE", "TABLE"]) {
        return parse_create_table(sql, rest).map(Statement::CreateTable);
    }

    if let Some(rest) = match_keywords(sql, &["INSERT", "INTO"]) {
        return parse_insert(sql, rest).map(Statement::Insert);
    }

    None
}

/// Removes leading `/* */`, `--`, and `#` comments plus surrounding
/// whitespace. Returns an empty string for comment-only statements.
pub fn strip_leading_comments(stmt: &str) -> &str {
    let mut sql = stmt.trim();

    loop {
        if let Some(rest) = sql.strip_prefix("/*") {
            match rest.find("*/") {
                Some(close) => sql = rest[close + 2..].trim_start(),
                None => return "",
            }
            continue;
        }

        if sql.starts_with("--") || sql.starts_with('#') {
            match sql.find('\n') {
                Some(nl) => sql = sql[nl + 1..].trim_start(),
                None => return "",
            }
            continue;
        }

        return sql.trim_end();
    }
}

/// Lowercased, quote-stripped table name (custom selections, doc keys).
pub fn normalize_table_name(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| !matches!(c, '`' | '"' | '\''))
        .collect::<String>()
        .to_lowercase()
}

/// Last dot-separated segment of a possibly qualified, possibly backticked
/// identifier, normalized.
fn clean_identifier(raw: &str) -> String {
    let last = raw
        .split('.')
        .map(|part| part.trim().trim_matches('`'))
        .filter(|part| !part.is_empty())
        .last()
        .unwrap_or(raw);
    normalize_table_name(last)
}

/// Matches a run of whitespace-separated keywords at the start of `s`,
/// case-insensitively. Returns the byte offset just past the last keyword.
fn match_keywords(s: &str, keywords: &[&str]) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut pos = 0;

    for (i, kw) in keywords.iter().enumerate() {
        if i > 0 {
            let start = pos;
            while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                pos += 1;
            }
            if pos == start {
                return None;
            }
        }

        let end = pos + kw.len();
        if end > bytes.len() || !bytes[pos..end].eq_ignore_ascii_case(kw.as_bytes()) {
            return None;
        }
        // keyword must end at a word boundary
        if let Some(&next) = bytes.get(end) {
            if next.is_ascii_alphanumeric() || next == b'_' {
                return None;
            }
        }
        pos = end;
    }

    Some(pos)
}

fn skip_whitespace(s: &str, mut pos: usize) -> usize {
    let bytes = s.as_bytes();
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

/// Reads a possibly dotted, possibly backticked identifier starting at `pos`.
/// Returns the raw identifier text and the offset just past it.
fn read_identifier(s: &str, start: usize) -> Option<(&str, usize)> {
    let bytes = s.as_bytes();
    let mut pos = start;
    let mut in_backtick = false;

    while pos < bytes.len() {
        let b = bytes[pos];
        if in_backtick {
            if b == b'`' {
                in_backtick = false;
            }
        } else if b == b'`' {
            in_backtick = true;
        } else if b.is_ascii_whitespace() || b == b'(' || b == b';' || b == b',' {
            break;
        }
        pos += 1;
    }

    if pos == start {
        None
    } else {
        Some((&s[start..pos], pos))
    }
}

fn parse_create_table(sql: &str, after_keywords: usize) -> Option<CreateTable> {
    let mut pos = skip_whitespace(sql, after_keywords);

    if let Some(rest) = match_keywords(&sql[pos..], &["IF", "NOT", "EXISTS"]) {
        pos = skip_whitespace(sql, pos + rest);
    }

    let (raw_name, _) = read_identifier(sql, pos)?;
    let table = clean_identifier(raw_name);
    if table.is_empty() {
        return None;
    }

    let body = match (sql.find('('), sql.rfind(')')) {
        (Some(open), Some(close)) if close > open => &sql[open + 1..close],
        _ => {
            return Some(CreateTable {
                table,
                columns: Vec::new(),
                auto_increment_column: None,
            })
        }
    };

    let mut columns = Vec::new();
    let mut auto_increment_column = None;

    for line in body.lines() {
        let Some(caps) = COLUMN_LINE_RE.captures(line) else {
            // constraint, KEY, PRIMARY KEY, ... lines
            continue;
        };
        let column = caps[1].to_string();
        if line.to_ascii_uppercase().contains("AUTO_INCREMENT") {
            auto_increment_column = Some(column.clone());
        }
        columns.push(column);
    }

    Some(CreateTable {
        table,
        columns,
        auto_increment_column,
    })
}

fn parse_insert(sql: &str, after_keywords: usize) -> Option<Insert> {
    let pos = skip_whitespace(sql, after_keywords);
    let (raw_name, after_name) = read_identifier(sql, pos)?;
    let table = clean_identifier(raw_name);
    if table.is_empty() {
        return None;
    }

    let mut pos = skip_whitespace(sql, after_name);
    let mut columns = None;

    if sql.as_bytes().get(pos) == Some(&b'(') {
        let close = find_matching_paren(sql, pos)?;
        columns = Some(parse_column_list(&sql[pos + 1..close]));
        pos = skip_whitespace(sql, close + 1);
    }

    let after_values = pos + match_keywords(&sql[pos..], &["VALUES"])?;
    let values = sql[after_values..]
        .trim()
        .trim_end_matches(';')
        .trim()
        .to_string();

    Some(Insert {
        table,
        columns,
        values,
    })
}

/// Offset of the `)` matching the `(` at `open`, quote-aware.
fn find_matching_paren(s: &str, open: usize) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 0usize;
    let mut in_string: Option<u8> = None;
    let mut pos = open;

    while pos < bytes.len() {
        let b = bytes[pos];
        if let Some(q) = in_string {
            if b == q {
                in_string = None;
            }
        } else {
            match b {
                b'\'' | b'"' | b'`' => in_string = Some(b),
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(pos);
                    }
                }
                _ => {}
            }
        }
        pos += 1;
    }

    None
}

/// Parses an explicit INSERT column list: backtick-delimited names, with a
/// naive comma split as fallback for unquoted lists.
pub fn parse_column_list(raw: &str) -> Vec<String> {
    let extracted: Vec<String> = BACKTICK_NAME_RE
        .captures_iter(raw)
        .map(|c| c[1].to_string())
        .collect();

    if !extracted.is_empty() {
        return extracted;
    }

    raw.split(',')
        .map(|item| {
            item.trim()
                .chars()
                .filter(|c| !matches!(c, '`' | '"' | '\''))
                .collect::<String>()
        })
        .filter(|item| !item.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_create_table_with_columns() {
        let stmt = "CREATE TABLE `tbl_schedule` (\n  `id` int(11) NOT NULL AUTO_INCREMENT,\n  `branch` varchar(64) DEFAULT NULL,\n  PRIMARY KEY (`id`)\n) ENGINE=InnoDB;";
        let Some(Statement::CreateTable(ct)) = classify(stmt) else {
            panic!("expected CREATE TABLE");
        };
        assert_eq!(ct.table, "tbl_schedule");
        assert_eq!(ct.columns, vec!["id", "branch"]);
        assert_eq!(ct.auto_increment_column.as_deref(), Some("id"));
    }

    #[test]
    fn create_table_if_not_exists_and_schema_prefix() {
        let stmt = "CREATE TABLE IF NOT EXISTS `marga`.`TBL_Billing` (\n  `bill_id` int NOT NULL\n);";
        let Some(Statement::CreateTable(ct)) = classify(stmt) else {
            panic!("expected CREATE TABLE");
        };
        assert_eq!(ct.table, "tbl_billing");
        assert_eq!(ct.columns, vec!["bill_id"]);
        assert!(ct.auto_increment_column.is_none());
    }

    #[test]
    fn classifies_insert_with_column_list() {
        let stmt = "INSERT INTO `tbl_billing` (`id`, `amount`) VALUES (1,25.50),(2,30.00);";
        let Some(Statement::Insert(ins)) = classify(stmt) else {
            panic!("expected INSERT");
        };
        assert_eq!(ins.table, "tbl_billing");
        assert_eq!(
            ins.columns,
            Some(vec!["id".to_string(), "amount".to_string()])
        );
        assert_eq!(ins.values, "(1,25.50),(2,30.00)");
    }

    #[test]
    fn classifies_insert_without_column_list() {
        let stmt = "INSERT INTO tbl_x VALUES (1,'a');";
        let Some(Statement::Insert(ins)) = classify(stmt) else {
            panic!("expected INSERT");
        };
        assert_eq!(ins.table, "tbl_x");
        assert!(ins.columns.is_none());
        assert_eq!(ins.values, "(1,'a')");
    }

    #[test]
    fn leading_comments_are_stripped_before_classification() {
        let stmt = "/* dump header */\n-- generated\nINSERT INTO t VALUES (1);";
        assert!(matches!(classify(stmt), Some(Statement::Insert(_))));
    }

    #[test]
    fn other_statements_are_ignored() {
        assert!(classify("DROP TABLE t;").is_none());
        assert!(classify("UPDATE t SET a = 1;").is_none());
        assert!(classify("LOCK TABLES `t` WRITE;").is_none());
        assert!(classify("-- only a comment").is_none());
        assert!(classify("INSERTINTO t VALUES (1);").is_none());
    }

    #[test]
    fn unquoted_column_list_falls_back_to_comma_split() {
        assert_eq!(parse_column_list("id, name ,age"), vec!["id", "name", "age"]);
    }

    #[test]
    fn normalize_strips_quotes_and_lowercases() {
        assert_eq!(normalize_table_name(" `Tbl_X` "), "tbl_x");
    }
}
