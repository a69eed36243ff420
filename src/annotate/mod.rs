//! Streaming annotation of `ps` thread samples with NUMA nodes.

pub mod line;
pub mod scan;

pub use scan::annotate;
