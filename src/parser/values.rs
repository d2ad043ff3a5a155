//! VALUES clause tuple splitter.
//!
//! Scans the raw remainder of an extended INSERT, tracking only parenthesis
//! depth and quote state (comments cannot occur inside a VALUES clause).
//! Produces one row per top-level `(...)` group, each row a list of raw
//! literal tokens with quotes and escapes still intact.

pub fn split_value_tuples(values: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut current_row: Option<Vec<String>> = None;
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut single_escape = false;
    let mut double_escape = false;

    let mut chars = values.chars().peekable();

    while let Some(ch) = chars.next() {
        let Some(row) = current_row.as_mut() else {
            if ch == '(' {
                current_row = Some(Vec::new());
                current.clear();
                depth = 1;
            }
            continue;
        };

        if in_single_quote {
            current.push(ch);
            if ch == '\\' {
                single_escape = !single_escape;
                continue;
            }
            if ch == '\'' && !single_escape {
                if chars.peek() == Some(&'\'') {
                    // embedded quote, keep both characters in the token
                    current.push('\'');
                    chars.next();
                } else {
                    in_single_quote = false;
                }
            }
            single_escape = false;
            continue;
        }

        if in_double_quote {
            current.push(ch);
            if ch == '\\' {
                double_escape = !double_escape;
                continue;
            }
            if ch == '"' && !double_escape {
                in_double_quote = false;
            }
            double_escape = false;
            continue;
        }

        match ch {
            '\'' => {
                in_single_quote = true;
                single_escape = false;
                current.push(ch);
            }
            '"' => {
                in_double_quote = true;
                double_escape = false;
                current.push(ch);
            }
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth -= 1;
                if depth == 0 {
                    row.push(current.trim().to_string());
                    rows.push(current_row.take().unwrap());
                    current.clear();
                } else {
                    current.push(ch);
                }
            }
            ',' if depth == 1 => {
                row.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_multiple_rows() {
        let rows = split_value_tuples("(1,'a'),(2,'b')");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["1", "'a'"]);
        assert_eq!(rows[1], vec!["2", "'b'"]);
    }

    #[test]
    fn commas_inside_strings_do_not_split() {
        let rows = split_value_tuples("(1,'a,b,c',2)");
        assert_eq!(rows, vec![vec!["1", "'a,b,c'", "2"]]);
    }

    #[test]
    fn parens_inside_strings_do_not_close_rows() {
        let rows = split_value_tuples("('(open', ')close')");
        assert_eq!(rows, vec![vec!["'(open'", "')close'"]]);
    }

    #[test]
    fn nested_parens_stay_inside_the_field() {
        let rows = split_value_tuples("(1, POINT(3,4), 2)");
        assert_eq!(rows, vec![vec!["1", "POINT(3,4)", "2"]]);
    }

    #[test]
    fn doubled_quote_kept_in_raw_token() {
        let rows = split_value_tuples("('O'' Brien')");
        assert_eq!(rows, vec![vec!["'O'' Brien'"]]);
    }

    #[test]
    fn backslash_escaped_quote_kept_in_raw_token() {
        let rows = split_value_tuples(r"('it\'s'),(2)");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec![r"'it\'s'"]);
    }

    #[test]
    fn junk_between_rows_is_ignored() {
        let rows = split_value_tuples("(1,'a') , (2,'b')");
        assert_eq!(rows.len(), 2);
    }
}
