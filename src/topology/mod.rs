//! Processor to NUMA node table built from an `lscpu` report.

pub mod parse;
pub mod table;

pub use parse::{NodeIdMode, load_topology};
pub use table::TopologyTable;
