//! Streaming SQL statement lexer.
//!
//! Splits a dump file into top-level statements without ever holding more
//! than one statement (plus one read buffer) in memory. The scanner is a
//! single byte-level automaton whose state survives buffer refills, so quoted
//! strings, backtick identifiers, and comments that span chunk boundaries are
//! handled correctly.

pub mod statement;
pub mod values;

use std::io::{BufRead, BufReader, Read};

/// Read buffer size for dump scanning.
pub const CHUNK_SIZE: usize = 2 * 1024 * 1024;

#[derive(Debug, Default)]
struct ScanState {
    in_single_quote: bool,
    in_double_quote: bool,
    in_backtick: bool,
    in_line_comment: bool,
    in_block_comment: bool,
    single_escape: bool,
    double_escape: bool,
    // One-byte lookbehind, so the automaton never needs lookahead and the
    // multi-byte openers (`-- `, `/*`, `*/`) work across refill boundaries.
    dash_pending: bool,
    // Saw `--`; the comment only opens if the next byte is whitespace.
    dash2_pending: bool,
    slash_pending: bool,
    star_pending: bool,
    prev_was_ws: bool,
}

/// Lazy, non-restartable sequence of SQL statements read from `R`.
pub struct StatementStream<R: Read> {
    reader: BufReader<R>,
    stmt_buffer: Vec<u8>,
    state: ScanState,
}

impl<R: Read> StatementStream<R> {
    pub fn new(reader: R) -> Self {
        Self::with_chunk_size(reader, CHUNK_SIZE)
    }

    pub fn with_chunk_size(reader: R, chunk_size: usize) -> Self {
        Self {
            reader: BufReader::with_capacity(chunk_size, reader),
            stmt_buffer: Vec::with_capacity(32 * 1024),
            state: ScanState::new(),
        }
    }

    /// Returns the next statement, or `None` at end of input. A non-empty
    /// trailing buffer without a terminating `;` is emitted as a final
    /// statement.
    pub fn read_statement(&mut self) -> std::io::Result<Option<String>> {
        loop {
            let buf = self.reader.fill_buf()?;
            if buf.is_empty() {
                let trailing = std::mem::take(&mut self.stmt_buffer);
                return Ok(non_empty_statement(trailing));
            }

            let len = buf.len();
            let mut consumed = 0;
            let mut terminated = false;

            // `buf` borrows the reader, so the scan goes through the state
            // field directly rather than a method on `self`.
            for (i, &b) in buf.iter().enumerate() {
                self.stmt_buffer.push(b);
                if self.state.scan_byte(b) {
                    consumed = i + 1;
                    terminated = true;
                    break;
                }
            }

            if terminated {
                self.reader.consume(consumed);
                let stmt = std::mem::take(&mut self.stmt_buffer);
                if let Some(text) = non_empty_statement(stmt) {
                    return Ok(Some(text));
                }
                continue;
            }

            self.reader.consume(len);
        }
    }
}

impl ScanState {
    fn new() -> Self {
        ScanState {
            prev_was_ws: true,
            ..ScanState::default()
        }
    }

    /// Advances the automaton by one byte. Returns true when the byte is a
    /// statement terminator (an unquoted, uncommented `;`).
    fn scan_byte(&mut self, b: u8) -> bool {
        let st = self;

        if st.in_line_comment {
            if b == b'\n' {
                st.in_line_comment = false;
                st.prev_was_ws = true;
            }
            return false;
        }

        if st.in_block_comment {
            if st.star_pending && b == b'/' {
                st.in_block_comment = false;
                st.star_pending = false;
                st.prev_was_ws = true;
            } else {
                st.star_pending = b == b'*';
            }
            return false;
        }

        if st.in_single_quote {
            if st.single_escape {
                st.single_escape = false;
            } else if b == b'\\' {
                st.single_escape = true;
            } else if b == b'\'' {
                // A doubled '' re-enters the string on the very next byte,
                // which is equivalent to treating it as an embedded quote.
                st.in_single_quote = false;
            }
            return false;
        }

        if st.in_double_quote {
            if st.double_escape {
                st.double_escape = false;
            } else if b == b'\\' {
                st.double_escape = true;
            } else if b == b'"' {
                st.in_double_quote = false;
            }
            return false;
        }

        if st.in_backtick {
            if b == b'`' {
                st.in_backtick = false;
            }
            return false;
        }

        if st.dash2_pending {
            if b.is_ascii_whitespace() {
                st.dash2_pending = false;
                st.in_line_comment = b != b'\n';
                st.prev_was_ws = true;
                return false;
            }
            if b == b'-' {
                // a longer dash run still ends in a `--` pair
                return false;
            }
            // no whitespace after the dashes, so they were ordinary bytes
            st.dash2_pending = false;
        }

        if st.dash_pending {
            st.dash_pending = false;
            if b == b'-' {
                st.dash2_pending = true;
                st.prev_was_ws = false;
                return false;
            }
        }

        if st.slash_pending {
            st.slash_pending = false;
            if b == b'*' {
                st.in_block_comment = true;
                st.star_pending = false;
                st.prev_was_ws = false;
                return false;
            }
        }

        let was_ws = st.prev_was_ws;
        st.prev_was_ws = b.is_ascii_whitespace();

        match b {
            b'#' => st.in_line_comment = true,
            b'-' if was_ws => st.dash_pending = true,
            b'/' => st.slash_pending = true,
            b'\'' => {
                st.in_single_quote = true;
                st.single_escape = false;
            }
            b'"' => {
                st.in_double_quote = true;
                st.double_escape = false;
            }
            b'`' => st.in_backtick = true,
            b';' => return true,
            _ => {}
        }

        false
    }
}

fn non_empty_statement(raw: Vec<u8>) -> Option<String> {
    let text = String::from_utf8_lossy(&raw);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statements(sql: &str) -> Vec<String> {
        let mut stream = StatementStream::with_chunk_size(sql.as_bytes(), 16);
        let mut out = Vec::new();
        while let Some(stmt) = stream.read_statement().unwrap() {
            out.push(stmt);
        }
        out
    }

    #[test]
    fn splits_on_unquoted_semicolons() {
        let out = statements("CREATE TABLE t1 (id INT); INSERT INTO t1 VALUES (1);");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], "CREATE TABLE t1 (id INT);");
        assert_eq!(out[1], "INSERT INTO t1 VALUES (1);");
    }

    #[test]
    fn semicolon_inside_string_does_not_terminate() {
        let out = statements("INSERT INTO t1 VALUES ('hello; world');");
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn backslash_escaped_quote_stays_in_string() {
        let out = statements(r"INSERT INTO t1 VALUES ('it\'s; fine');");
        assert_eq!(out.len(), 1);
        assert!(out[0].contains("fine"));
    }

    #[test]
    fn doubled_quote_stays_in_string() {
        let out = statements("INSERT INTO t1 VALUES ('O'' Brien; Esq');");
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn line_comment_hides_semicolon() {
        let out = statements("SELECT 1 -- not here;\n;SELECT 2;");
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn hash_comment_hides_semicolon() {
        let out = statements("SELECT 1 # nope;\n;");
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn block_comment_hides_semicolon() {
        let out = statements("SELECT /* ; */ 1;");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0], "SELECT /* ; */ 1;");
    }

    #[test]
    fn backtick_identifier_hides_semicolon() {
        let out = statements("CREATE TABLE `weird;name` (id INT);");
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn trailing_statement_without_terminator_is_emitted() {
        let out = statements("INSERT INTO t VALUES (1); INSERT INTO t VALUES (2)");
        assert_eq!(out.len(), 2);
        assert_eq!(out[1], "INSERT INTO t VALUES (2)");
    }

    #[test]
    fn dashes_need_trailing_whitespace_to_open_a_comment() {
        let out = statements("INSERT INTO t VALUES (1) --x;\nINSERT INTO t VALUES (2);");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], "INSERT INTO t VALUES (1) --x;");
        assert_eq!(out[1], "INSERT INTO t VALUES (2);");
    }

    #[test]
    fn dash_run_ending_in_whitespace_opens_a_comment() {
        let out = statements("SELECT 1 --- not here;\n;");
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn dashes_at_end_of_line_open_an_empty_comment() {
        let out = statements("SELECT 1 --\n; SELECT 2;");
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn dashes_inside_values_are_not_comments() {
        let out = statements("INSERT INTO t VALUES (-1,-2); INSERT INTO t VALUES (3);");
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn state_survives_tiny_chunks() {
        // chunk size of 1 forces every transition across a refill boundary
        let sql = "INSERT INTO t VALUES ('a;b', \"c;d\"); /* ; */ INSERT INTO t VALUES (2);";
        let mut stream = StatementStream::with_chunk_size(sql.as_bytes(), 1);
        let mut count = 0;
        while stream.read_statement().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 2);
    }
}
