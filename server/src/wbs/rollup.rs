//! WBS cost rollup.
//!
//! Nodes are identified by dotted codes ("1.2.3"); a node's parent is
//! the code with the last dot segment removed. The engine folds every
//! node's direct hours/cost up through its ancestors so each node's
//! aggregate covers itself plus all descendants.

use std::collections::HashMap;

/// Aggregate hours and cost for one node.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Totals {
    pub hours: f64,
    pub cost: f64,
}

/// Minimal node view the engine needs: id plus dotted code.
#[derive(Debug, Clone)]
pub struct RollupNode {
    pub id: String,
    pub code: String,
}

/// One dotted-code segment. Numeric segments compare as integers so
/// "1.10" sorts after "1.2" — a plain string sort would put "1.10"
/// first and break the parent-before-descendant walk order for
/// double-digit codes. Numeric segments sort before free-text ones.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Segment {
    Number(u64),
    Text(String),
}

/// Structural sort key for a dotted code. A prefix always compares
/// before its extensions, so parents precede all their descendants.
fn code_key(code: &str) -> Vec<Segment> {
    code.split('.')
        .map(|part| match part.parse::<u64>() {
            Ok(n) => Segment::Number(n),
            Err(_) => Segment::Text(part.to_string()),
        })
        .collect()
}

/// Compute aggregate hours/cost per node id.
///
/// Initialize each node's aggregate from its direct totals (missing
/// entries are zero), then walk the nodes innermost-first: each node's
/// aggregate is added to its parent's, so by the time a parent is
/// visited all its descendants have been folded in. A node whose
/// parent code matches nothing is a rollup root — its aggregate stays
/// where it is. Inputs are never mutated; repeated calls on the same
/// inputs yield identical output.
pub fn rollup(
    nodes: &[RollupNode],
    direct_hours: &HashMap<String, f64>,
    direct_cost: &HashMap<String, f64>,
) -> HashMap<String, Totals> {
    let mut sorted: Vec<&RollupNode> = nodes.iter().collect();
    sorted.sort_by_cached_key(|n| code_key(&n.code));

    let code_to_id: HashMap<&str, &str> = sorted
        .iter()
        .map(|n| (n.code.as_str(), n.id.as_str()))
        .collect();

    let mut totals: HashMap<String, Totals> = nodes
        .iter()
        .map(|n| {
            (
                n.id.clone(),
                Totals {
                    hours: direct_hours.get(&n.id).copied().unwrap_or(0.0),
                    cost: direct_cost.get(&n.id).copied().unwrap_or(0.0),
                },
            )
        })
        .collect();

    // Reverse order: children before parents, so multi-level trees
    // accumulate transitively without double-counting.
    for node in sorted.iter().rev() {
        let Some((parent_code, _)) = node.code.rsplit_once('.') else {
            continue; // root code, nothing above it
        };
        let Some(parent_id) = code_to_id.get(parent_code) else {
            continue; // orphan — acts as a rollup root
        };
        let child = totals.get(&node.id).copied().unwrap_or_default();
        if let Some(parent) = totals.get_mut(*parent_id) {
            parent.hours += child.hours;
            parent.cost += child.cost;
        }
    }

    totals
}
