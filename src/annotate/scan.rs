use crate::annotate::line::{Line, split_terminator};
use crate::error::{Error, FormatIssue, Result};
use crate::topology::TopologyTable;
use std::io::{BufRead, Write};
use tracing::{debug, info};

const PSR: &str = "PSR";
const NUMA: &str = "NUMA";

/// Counts gathered over one annotation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub timestamps: usize,
    pub blocks: usize,
    pub data_lines: usize,
}

/// Column layout of the block being read, taken from its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlockContext {
    psr_column: usize,
    columns: usize,
}

impl BlockContext {
    fn from_header(tokens: &[&str], line: usize) -> Result<Self> {
        if tokens.contains(&NUMA) {
            return Err(Error::format(line, FormatIssue::AlreadyAnnotated));
        }
        let psr_column = tokens
            .iter()
            .position(|t| *t == PSR)
            .ok_or_else(|| Error::format(line, FormatIssue::MissingPsr))?;
        Ok(Self {
            psr_column,
            columns: tokens.len(),
        })
    }
}

enum State {
    /// Nothing read yet; the first line is a timestamp or a header.
    Start,
    /// A timestamp was just emitted; the next line is a header.
    AfterTimestamp,
    /// The buffered line is a header.
    Header,
    /// Reading data rows of a block.
    Block(BlockContext),
    Done,
}

/// Single line of lookahead over the input.
struct Scanner<R> {
    input: R,
    buf: String,
    line_no: usize,
    eof: bool,
}

impl<R: BufRead> Scanner<R> {
    fn new(input: R) -> Self {
        Self {
            input,
            buf: String::new(),
            line_no: 0,
            eof: false,
        }
    }

    fn read_next(&mut self) -> Result<()> {
        self.buf.clear();
        if self.input.read_line(&mut self.buf)? == 0 {
            self.eof = true;
        } else {
            self.line_no += 1;
        }
        Ok(())
    }

    fn line(&self) -> Line<'_> {
        if self.eof {
            Line::Eof
        } else {
            Line::classify(&self.buf)
        }
    }

    fn text(&self) -> &str {
        &self.buf
    }
}

/// Copy a `ps -L -o pid,lwp,psr,comm` sample log from `input` to `output`,
/// appending `NUMA` to every header and the node of the PSR processor to
/// every data row.
///
/// Output is written line by line, so whatever precedes a failing line has
/// already been emitted when an error is returned. A blank line ends the
/// run like end of input does.
pub fn annotate<R: BufRead, W: Write>(
    table: &TopologyTable,
    input: R,
    mut output: W,
) -> Result<Summary> {
    let mut scanner = Scanner::new(input);
    let mut summary = Summary::default();
    let mut state = State::Start;

    loop {
        state = match state {
            State::Start => {
                scanner.read_next()?;
                match scanner.line() {
                    Line::Eof | Line::Blank => State::Done,
                    Line::Timestamp => {
                        output.write_all(scanner.text().as_bytes())?;
                        summary.timestamps += 1;
                        State::AfterTimestamp
                    }
                    Line::Row(_) => State::Header,
                }
            }

            State::AfterTimestamp => {
                scanner.read_next()?;
                match scanner.line() {
                    Line::Eof | Line::Blank => State::Done,
                    Line::Timestamp | Line::Row(_) => State::Header,
                }
            }

            State::Header => {
                let tokens: Vec<&str> = scanner.text().split_whitespace().collect();
                let ctx = BlockContext::from_header(&tokens, scanner.line_no)?;
                append_column(&mut output, scanner.text(), NUMA)?;
                summary.blocks += 1;
                debug!(
                    line = scanner.line_no,
                    psr_column = ctx.psr_column,
                    columns = ctx.columns,
                    "sample block"
                );
                State::Block(ctx)
            }

            State::Block(ctx) => {
                scanner.read_next()?;
                match scanner.line() {
                    Line::Eof | Line::Blank => State::Done,
                    Line::Timestamp => {
                        output.write_all(scanner.text().as_bytes())?;
                        summary.timestamps += 1;
                        State::AfterTimestamp
                    }
                    // COMMAND is last and may contain spaces, so extra tokens are fine.
                    Line::Row(tokens) if tokens.len() >= ctx.columns => {
                        let processor = tokens[ctx.psr_column];
                        if processor.parse::<u32>().is_ok() {
                            let node = table.node_of(processor).ok_or_else(|| Error::Lookup {
                                line: scanner.line_no,
                                processor: processor.to_string(),
                            })?;
                            append_column(&mut output, scanner.text(), node)?;
                            summary.data_lines += 1;
                            State::Block(ctx)
                        } else if tokens.contains(&PSR) {
                            // Repeated header with no timestamp in front of it.
                            State::Header
                        } else {
                            return Err(Error::format(
                                scanner.line_no,
                                FormatIssue::NotAProcessor(processor.to_string()),
                            ));
                        }
                    }
                    Line::Row(tokens) => {
                        return Err(Error::format(
                            scanner.line_no,
                            FormatIssue::UnexpectedColumns {
                                expected: ctx.columns,
                                found: tokens.len(),
                            },
                        ));
                    }
                }
            }

            State::Done => break,
        };
    }

    output.flush()?;
    info!(
        blocks = summary.blocks,
        data_lines = summary.data_lines,
        timestamps = summary.timestamps,
        lines = scanner.line_no,
        "annotation finished"
    );
    Ok(summary)
}

/// Write `line` with ` column` inserted before its terminator.
fn append_column<W: Write>(output: &mut W, line: &str, column: &str) -> Result<()> {
    let (body, terminator) = split_terminator(line);
    write!(output, "{} {}{}", body, column, terminator)?;
    Ok(())
}
