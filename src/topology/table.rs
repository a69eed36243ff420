use serde::Serialize;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// Decimal string form of a logical CPU id, as it appears in the PSR column.
pub type ProcessorId = String;

/// NUMA node id, kept in the textual form it is appended to ps lines with.
pub type NodeId = String;

/// Processor to node lookup. Only `parse_topology` builds one, and only
/// after checking it covers every declared CPU.
#[derive(Debug, Clone, Default)]
pub struct TopologyTable {
    nodes: HashMap<ProcessorId, NodeId>,
    declared_nodes: Option<usize>,
}

impl TopologyTable {
    pub fn node_of(&self, processor: &str) -> Option<&str> {
        self.nodes.get(processor).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Node count from the `NUMA node(s):` line, if the report had one.
    pub fn declared_nodes(&self) -> Option<usize> {
        self.declared_nodes
    }

    /// All mappings in ascending processor order.
    pub fn sorted(&self) -> Vec<(&str, &str)> {
        let mut pairs: Vec<(&str, &str)> = self
            .nodes
            .iter()
            .map(|(cpu, node)| (cpu.as_str(), node.as_str()))
            .collect();
        // Keys are canonical decimals, so a shorter key is a smaller number.
        pairs.sort_by(|a, b| a.0.len().cmp(&b.0.len()).then_with(|| a.0.cmp(b.0)));
        pairs
    }

    pub fn view(&self) -> TopologyView<'_> {
        TopologyView {
            cpus: self.len(),
            nodes: self.declared_nodes,
            mapping: self
                .sorted()
                .into_iter()
                .map(|(cpu, node)| CpuNode { cpu, node })
                .collect(),
        }
    }

    /// Returns the node the processor was previously mapped to, if any.
    pub(crate) fn insert(&mut self, processor: ProcessorId, node: NodeId) -> Option<NodeId> {
        match self.nodes.entry(processor) {
            Entry::Occupied(mut e) => Some(e.insert(node)),
            Entry::Vacant(e) => {
                e.insert(node);
                None
            }
        }
    }

    pub(crate) fn set_declared_nodes(&mut self, nodes: usize) {
        self.declared_nodes = Some(nodes);
    }
}

/// Serializable snapshot of a table, for `psnuma topology --json`.
#[derive(Debug, Serialize)]
pub struct TopologyView<'a> {
    pub cpus: usize,
    pub nodes: Option<usize>,
    pub mapping: Vec<CpuNode<'a>>,
}

#[derive(Debug, Serialize)]
pub struct CpuNode<'a> {
    pub cpu: &'a str,
    pub node: &'a str,
}
