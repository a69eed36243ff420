//! Per-line classification for the ps sample log.

/// What a single read from the sample log produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'a> {
    /// Nothing left to read.
    Eof,
    /// A line with no tokens.
    Blank,
    /// A line holding exactly one token, e.g. `14:00:00`.
    Timestamp,
    /// Two or more tokens: a header or a data row.
    Row(Vec<&'a str>),
}

impl<'a> Line<'a> {
    pub fn classify(text: &'a str) -> Self {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        match tokens.len() {
            0 => Line::Blank,
            1 => Line::Timestamp,
            _ => Line::Row(tokens),
        }
    }
}

/// Split a line into its body and its terminator (`\r\n`, `\n` or nothing).
pub fn split_terminator(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}
