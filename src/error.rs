//! Error type shared by the topology indexer and the sample annotator.
//!
//! Topology variants point at the lscpu file, sample variants point at the
//! ps output, so the message alone tells the user which input to fix.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot read lscpu file {}", .path.display())]
    Configuration {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("lscpu file line {line}: {reason}")]
    TopologyFormat { line: usize, reason: String },

    #[error("lscpu file has no `CPU(s):` line, cannot tell whether every CPU has a NUMA node")]
    CpuCountMissing,

    #[error(
        "lscpu file declares {declared} CPUs but only {mapped} are associated with a NUMA node. \
         Please check the lscpu file"
    )]
    TopologyIncomplete { declared: usize, mapped: usize },

    #[error("unexpected data format at line {line}: {issue}. Please check ps output")]
    Format { line: usize, issue: FormatIssue },

    #[error(
        "CPU {processor} at line {line} is not associated with any NUMA node in the lscpu file. \
         Please check if ps file and lscpu file are from the same server"
    )]
    Lookup { line: usize, processor: String },

    #[error("invalid line pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// What was wrong with a ps log line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatIssue {
    #[error("header has no PSR column")]
    MissingPsr,

    #[error("header already has a NUMA column, the log looks annotated")]
    AlreadyAnnotated,

    #[error("PSR column holds {0:?}, not a processor id")]
    NotAProcessor(String),

    #[error("expected {expected} columns, found {found}")]
    UnexpectedColumns { expected: usize, found: usize },
}

impl Error {
    pub(crate) fn topology_format(line: usize, reason: impl Into<String>) -> Self {
        Self::TopologyFormat {
            line,
            reason: reason.into(),
        }
    }

    pub(crate) fn format(line: usize, issue: FormatIssue) -> Self {
        Self::Format { line, issue }
    }
}
