use crate::error::{Error, Result};
use crate::topology::table::{NodeId, TopologyTable};
use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// How the node id is taken from a `NUMA node<k>` label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum NodeIdMode {
    /// Last character of the label. Only correct for machines with fewer
    /// than ten nodes.
    #[default]
    LastChar,
    /// Whole numeric suffix after `node`.
    Suffix,
}

/// Read an lscpu report from disk and build its table.
///
/// The file is read rather than stat'ed, so pipes such as `<(lscpu)` work.
pub fn load_topology(path: &Path, mode: NodeIdMode) -> Result<TopologyTable> {
    let text = fs::read_to_string(path).map_err(|source| Error::Configuration {
        path: path.to_path_buf(),
        source,
    })?;
    parse_topology(&text, mode)
}

/// Parse the text of an lscpu report into a processor to node table.
///
/// Recognized lines (leading whitespace allowed, newer lscpu indents the
/// NUMA section):
///
/// CPU(s):              8
/// NUMA node(s):        2
/// NUMA node0 CPU(s):   0-3,8
/// NUMA node1 CPU(s):   4-7
///
/// Everything else is ignored. Fails unless every CPU counted by `CPU(s):`
/// ends up with a node.
pub fn parse_topology(text: &str, mode: NodeIdMode) -> Result<TopologyTable> {
    let cpu_count_re = Regex::new(r"^\s*CPU\(s\):\s*(\S*)\s*$")?;
    let node_count_re = Regex::new(r"^\s*NUMA node\(s\):\s*(\S*)\s*$")?;
    // The CPU list is the last token; memory-only nodes have none.
    let node_cpus_re = Regex::new(r"^\s*NUMA (node\S*)\s+CPU\(s\):\s*(\S*)\s*$")?;

    let mut declared_cpus: Option<usize> = None;
    let mut table = TopologyTable::default();

    for (lineno, line) in text.lines().enumerate() {
        let lno = lineno + 1;

        if let Some(caps) = cpu_count_re.captures(line) {
            let cpus = parse_count(&caps[1], lno, "CPU(s)")?;
            info!(cpus, "lscpu declares CPU count");
            declared_cpus = Some(cpus);
            continue;
        }

        if let Some(caps) = node_count_re.captures(line) {
            let nodes = parse_count(&caps[1], lno, "NUMA node(s)")?;
            info!(nodes, "lscpu declares NUMA node count");
            table.set_declared_nodes(nodes);
            continue;
        }

        let Some(caps) = node_cpus_re.captures(line) else {
            continue;
        };

        let label = &caps[1];
        let list = &caps[2];
        let node = node_id(label, mode, lno)?;

        if list.is_empty() {
            debug!(node = %node, "NUMA node has no CPUs");
            continue;
        }

        let cpus = parse_cpu_list(list, lno)?;
        debug!(node = %node, count = cpus.len(), list, "NUMA node CPUs");
        for cpu in cpus {
            if let Some(prev) = table.insert(cpu.to_string(), node.clone()) {
                warn!(cpu, prev = %prev, node = %node, "CPU listed under more than one NUMA node");
            }
        }
    }

    let declared = declared_cpus.ok_or(Error::CpuCountMissing)?;
    if table.len() != declared {
        return Err(Error::TopologyIncomplete {
            declared,
            mapped: table.len(),
        });
    }

    Ok(table)
}

fn parse_count(raw: &str, lno: usize, field: &str) -> Result<usize> {
    raw.parse()
        .map_err(|_| Error::topology_format(lno, format!("bad {} value {:?}", field, raw)))
}

fn node_id(label: &str, mode: NodeIdMode, lno: usize) -> Result<NodeId> {
    match mode {
        NodeIdMode::LastChar => label
            .chars()
            .last()
            .map(String::from)
            .ok_or_else(|| Error::topology_format(lno, "empty NUMA node label")),
        NodeIdMode::Suffix => label
            .strip_prefix("node")
            .and_then(|suffix| suffix.parse::<u32>().ok())
            .map(|id| id.to_string())
            .ok_or_else(|| {
                Error::topology_format(lno, format!("no numeric node id in {:?}", label))
            }),
    }
}

/// Parse "0-3,8,10-11" into [0, 1, 2, 3, 8, 10, 11]. Ranges are inclusive.
fn parse_cpu_list(raw: &str, lno: usize) -> Result<Vec<u32>> {
    let mut ret = Vec::new();

    for part in raw.split(',') {
        let bad = || Error::topology_format(lno, format!("bad CPU list entry {:?}", part));

        match part.split_once('-') {
            Some((lo, hi)) => {
                let lo: u32 = lo.parse().map_err(|_| bad())?;
                let hi: u32 = hi.parse().map_err(|_| bad())?;
                if lo > hi {
                    return Err(bad());
                }
                ret.extend(lo..=hi);
            }
            None => ret.push(part.parse().map_err(|_| bad())?),
        }
    }

    Ok(ret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const TWO_NODES: &str = "\
Architecture:        x86_64
CPU(s):              4
On-line CPU(s) list: 0-3
NUMA node(s):        2
NUMA node0 CPU(s):   0-1
NUMA node1 CPU(s):   2,3
";

    #[test]
    fn two_node_report() {
        let t = parse_topology(TWO_NODES, NodeIdMode::LastChar).unwrap();
        assert_eq!(t.len(), 4);
        assert_eq!(t.declared_nodes(), Some(2));
        assert_eq!(
            t.sorted(),
            vec![("0", "0"), ("1", "0"), ("2", "1"), ("3", "1")]
        );
    }

    #[test]
    fn ranges_are_inclusive_and_mix_with_singletons() {
        assert_eq!(parse_cpu_list("0-3", 1).unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(
            parse_cpu_list("0-1,4,6-7", 1).unwrap(),
            vec![0, 1, 4, 6, 7]
        );
        assert_eq!(parse_cpu_list("5-5", 1).unwrap(), vec![5]);
    }

    #[test]
    fn bad_cpu_list_entries() {
        for raw in ["3-1", "a", "1-", "-2", "1,,2", "1-2-3"] {
            assert!(
                matches!(
                    parse_cpu_list(raw, 9),
                    Err(Error::TopologyFormat { line: 9, .. })
                ),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn missing_cpu_is_incomplete() {
        let text = "CPU(s): 4\nNUMA node(s): 2\nNUMA node0 CPU(s): 0-1\nNUMA node1 CPU(s): 2\n";
        match parse_topology(text, NodeIdMode::LastChar) {
            Err(Error::TopologyIncomplete { declared, mapped }) => {
                assert_eq!((declared, mapped), (4, 3));
            }
            other => panic!("expected incomplete topology, got {other:?}"),
        }
    }

    #[test]
    fn cpu_listed_twice_is_incomplete() {
        let text = "CPU(s): 4\nNUMA node0 CPU(s): 0-1\nNUMA node1 CPU(s): 1,2\n";
        assert!(matches!(
            parse_topology(text, NodeIdMode::LastChar),
            Err(Error::TopologyIncomplete {
                declared: 4,
                mapped: 3
            })
        ));
    }

    #[test]
    fn no_cpu_count_line() {
        let text = "NUMA node0 CPU(s): 0-1\n";
        assert!(matches!(
            parse_topology(text, NodeIdMode::LastChar),
            Err(Error::CpuCountMissing)
        ));
    }

    #[test]
    fn node_count_line_is_not_a_node() {
        // "NUMA node(s): 1" would otherwise read as a node named "node(s):".
        let text = "CPU(s): 2\nNUMA node(s): 1\nNUMA node0 CPU(s): 0,1\n";
        let t = parse_topology(text, NodeIdMode::LastChar).unwrap();
        assert_eq!(t.sorted(), vec![("0", "0"), ("1", "0")]);
    }

    #[test]
    fn indented_numa_section() {
        let text = "\
CPU(s):                  4
NUMA:
  NUMA node(s):          2
  NUMA node0 CPU(s):     0,2
  NUMA node1 CPU(s):     1,3
";
        let t = parse_topology(text, NodeIdMode::LastChar).unwrap();
        assert_eq!(t.node_of("2"), Some("0"));
        assert_eq!(t.node_of("3"), Some("1"));
    }

    #[test]
    fn memory_only_node_is_skipped() {
        let text = "CPU(s): 2\nNUMA node0 CPU(s): 0-1\nNUMA node1 CPU(s):\n";
        let t = parse_topology(text, NodeIdMode::LastChar).unwrap();
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn bad_count_is_a_format_error() {
        let text = "CPU(s): many\n";
        assert!(matches!(
            parse_topology(text, NodeIdMode::LastChar),
            Err(Error::TopologyFormat { line: 1, .. })
        ));
    }

    #[test]
    fn node_id_modes() {
        assert_eq!(node_id("node12", NodeIdMode::LastChar, 1).unwrap(), "2");
        assert_eq!(node_id("node12", NodeIdMode::Suffix, 1).unwrap(), "12");
        assert_eq!(node_id("node3", NodeIdMode::Suffix, 1).unwrap(), "3");
        assert!(node_id("nodeX", NodeIdMode::Suffix, 1).is_err());
    }

    #[test]
    fn suffix_mode_keeps_two_digit_nodes_apart() {
        let text = "CPU(s): 2\nNUMA node1 CPU(s): 0\nNUMA node11 CPU(s): 1\n";
        let last = parse_topology(text, NodeIdMode::LastChar).unwrap();
        assert_eq!(last.node_of("1"), Some("1"));
        let suffix = parse_topology(text, NodeIdMode::Suffix).unwrap();
        assert_eq!(suffix.node_of("1"), Some("11"));
    }

    #[test]
    fn load_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TWO_NODES.as_bytes()).unwrap();
        let t = load_topology(file.path(), NodeIdMode::LastChar).unwrap();
        assert_eq!(t.node_of("3"), Some("1"));
    }

    #[test]
    fn unreadable_path_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("lscpu.txt");
        assert!(matches!(
            load_topology(&missing, NodeIdMode::LastChar),
            Err(Error::Configuration { .. })
        ));
    }
}
