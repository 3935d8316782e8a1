//! Temporal chain builder: stitches pairwise SAME_AS links into per-unit
//! lineages spanning the census years.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use log::info;

use crate::types::{Confidence, OverlapLink, Relationship};

/// Written in place of a name that the source data never provided for a
/// chain head. Never counted as a real name by the consensus engine.
pub const START_SENTINEL: &str = "[start of chain]";

/// Which links are admitted as chain edges.
#[derive(Debug, Clone)]
pub struct ChainOptions {
    /// IoU floor for an edge. Chains demand a near-perfect spatial match;
    /// the name may still disagree (that is the point of the consensus
    /// engine downstream).
    pub min_iou: f64,
    /// Admit SAME_AS links from the ambiguous bucket too: an OCR-mangled
    /// name must not break an otherwise perfect spatial chain.
    pub include_ambiguous_same_as: bool,
    /// Also admit WITHIN/CONTAINS edges (administrative restructuring).
    pub include_containment: bool,
    /// Minimum entries for a lineage to be retained.
    pub min_length: usize,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            min_iou: 0.999,
            include_ambiguous_same_as: true,
            include_containment: false,
            min_length: 2,
        }
    }
}

/// A unit observed in one census year.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct NodeKey {
    year: u16,
    id: Arc<str>,
}

/// One entry of a lineage. `name` is `None` when the source data had no
/// name for this unit-year.
#[derive(Debug, Clone)]
pub struct LineageEntry {
    pub year: u16,
    pub id: Arc<str>,
    pub name: Option<Arc<str>>,
}

/// A maximal path of admitted edges: the multi-year identity of one unit.
#[derive(Debug, Clone)]
pub struct Lineage {
    pub chain_id: String,
    pub entries: Vec<LineageEntry>,
}

/// Audit record for a node with several outgoing chain edges (a genuine
/// split, or inconsistent data). None of the edges is followed; the
/// targets start their own chains.
#[derive(Debug, Clone)]
pub struct BranchPoint {
    pub year: u16,
    pub id: Arc<str>,
    pub targets: Vec<(u16, Arc<str>)>,
}

#[derive(Debug, Default)]
pub struct ChainSet {
    pub lineages: Vec<Lineage>,
    pub branches: Vec<BranchPoint>,
}

struct Edge {
    to: NodeKey,
    name_from: Option<Arc<str>>,
    name_to: Option<Arc<str>>,
}

fn admitted(link: &OverlapLink, opts: &ChainOptions) -> bool {
    if link.iou < opts.min_iou {
        return false;
    }
    match link.relationship {
        Relationship::SameAs => {
            link.confidence == Confidence::High || opts.include_ambiguous_same_as
        }
        Relationship::Within | Relationship::Contains => opts.include_containment,
        _ => false,
    }
}

/// Assemble lineages from the full cross-year edge set. Single pass, O(E):
/// the visited set is owned by this invocation (callers may build several
/// chain sets concurrently) and guarantees each node joins at most one
/// lineage even on cyclic or re-entrant misdata.
pub fn build_chains(links: &[OverlapLink], opts: &ChainOptions) -> ChainSet {
    // Group admitted edges by source node, deduplicating identical targets
    // (the same link can appear in both confidence tables).
    let mut outgoing: AHashMap<NodeKey, Vec<Edge>> = AHashMap::new();
    for link in links.iter().filter(|l| admitted(l, opts)) {
        let from = NodeKey { year: link.year_from, id: link.id_from.clone() };
        let to = NodeKey { year: link.year_to, id: link.id_to.clone() };
        let edges = outgoing.entry(from).or_default();
        if !edges.iter().any(|e| e.to == to) {
            edges.push(Edge {
                to,
                name_from: link.name_from.clone(),
                name_to: link.name_to.clone(),
            });
        }
    }

    // A node with several outgoing edges is an explicit, auditable branch:
    // drop all of its edges from the chainable set (its chain ends there,
    // the targets become chain starts) instead of silently following one.
    let mut branches: Vec<BranchPoint> = Vec::new();
    outgoing.retain(|node, edges| {
        if edges.len() > 1 {
            edges.sort_by(|a, b| a.to.cmp(&b.to));
            branches.push(BranchPoint {
                year: node.year,
                id: node.id.clone(),
                targets: edges.iter().map(|e| (e.to.year, e.to.id.clone())).collect(),
            });
            false
        } else {
            true
        }
    });
    branches.sort_by(|a, b| (a.year, &a.id).cmp(&(b.year, &b.id)));

    // Universe of chainable nodes and the set with an incoming edge.
    let mut incoming: AHashSet<NodeKey> = AHashSet::new();
    let mut universe: AHashSet<NodeKey> = AHashSet::new();
    for (from, edges) in &outgoing {
        universe.insert(from.clone());
        for edge in edges {
            universe.insert(edge.to.clone());
            incoming.insert(edge.to.clone());
        }
    }

    let mut starts: Vec<NodeKey> = universe.iter().filter(|n| !incoming.contains(*n)).cloned().collect();
    starts.sort();

    let mut lineages: Vec<Lineage> = Vec::new();
    let mut visited: AHashSet<NodeKey> = AHashSet::new();

    for start in starts {
        if visited.contains(&start) {
            continue;
        }

        // The chain head's name comes from its outgoing edge's source side.
        let head_name = outgoing.get(&start).and_then(|edges| edges[0].name_from.clone());
        let mut entries = vec![LineageEntry { year: start.year, id: start.id.clone(), name: head_name }];
        visited.insert(start.clone());

        let mut current = start;
        while let Some(edges) = outgoing.get(&current) {
            let edge = &edges[0]; // single by construction
            if visited.contains(&edge.to) {
                break; // cycle or re-entry into an earlier chain
            }
            entries.push(LineageEntry {
                year: edge.to.year,
                id: edge.to.id.clone(),
                name: edge.name_to.clone(),
            });
            visited.insert(edge.to.clone());
            current = edge.to.clone();
        }

        if entries.len() >= opts.min_length {
            lineages.push(Lineage { chain_id: format!("chain_{:05}", lineages.len()), entries });
        }
    }

    info!("built {} lineages ({} branch points) from {} links", lineages.len(), branches.len(), links.len());
    ChainSet { lineages, branches }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn same_as(year_from: u16, from: &str, year_to: u16, to: &str) -> OverlapLink {
        OverlapLink {
            year_from,
            year_to,
            id_from: Arc::from(from),
            id_to: Arc::from(to),
            name_from: Some(Arc::from(format!("{from}-name").as_str())),
            name_to: Some(Arc::from(format!("{to}-name").as_str())),
            division_from: None,
            division_to: None,
            province_from: None,
            province_to: None,
            relationship: Relationship::SameAs,
            iou: 1.0,
            frac_from: 1.0,
            frac_to: 1.0,
            name_similarity: 100.0,
            confidence: Confidence::High,
        }
    }

    #[test]
    fn unbroken_unit_spans_all_eight_years() {
        let years = [1851u16, 1861, 1871, 1881, 1891, 1901, 1911, 1921];
        let links: Vec<OverlapLink> = years
            .windows(2)
            .map(|w| same_as(w[0], &format!("U{}", w[0]), w[1], &format!("U{}", w[1])))
            .collect();
        let set = build_chains(&links, &ChainOptions::default());
        assert_eq!(set.lineages.len(), 1);
        assert_eq!(set.lineages[0].entries.len(), 8);
        assert_eq!(set.lineages[0].entries[0].year, 1851);
        assert_eq!(set.lineages[0].entries[7].year, 1921);
        // Head takes its real source-year name, not the sentinel.
        assert_eq!(set.lineages[0].entries[0].name.as_deref(), Some("U1851-name"));
    }

    #[test]
    fn chain_building_is_idempotent() {
        let links = vec![
            same_as(1851, "A", 1861, "B"),
            same_as(1861, "B", 1871, "C"),
            same_as(1851, "X", 1861, "Y"),
        ];
        let opts = ChainOptions::default();
        let first = build_chains(&links, &opts);
        let second = build_chains(&links, &opts);
        let shape = |set: &ChainSet| {
            set.lineages
                .iter()
                .map(|l| (l.chain_id.clone(), l.entries.iter().map(|e| e.id.clone()).collect::<Vec<_>>()))
                .collect::<Vec<_>>()
        };
        assert_eq!(shape(&first), shape(&second));
        assert_eq!(first.lineages.len(), 2);
    }

    #[test]
    fn cycle_halts_without_duplicates() {
        let links = vec![
            same_as(1851, "A", 1861, "B"),
            same_as(1861, "B", 1871, "C"),
            same_as(1871, "C", 1851, "A"), // cyclic misdata
        ];
        let set = build_chains(&links, &ChainOptions::default());
        // No start node exists in a pure cycle until one is picked; with
        // every node having an incoming edge there are no starts, so no
        // lineage is emitted and nothing loops forever.
        assert!(set.lineages.is_empty());
    }

    #[test]
    fn multi_way_split_becomes_branch_audit_plus_new_starts() {
        let links = vec![
            same_as(1851, "A", 1861, "B"),
            same_as(1861, "B", 1871, "C1"),
            same_as(1861, "B", 1871, "C2"), // data inconsistency: two successors
            same_as(1871, "C1", 1881, "D1"),
            same_as(1871, "C2", 1881, "D2"),
        ];
        let set = build_chains(&links, &ChainOptions::default());

        assert_eq!(set.branches.len(), 1);
        assert_eq!(&*set.branches[0].id, "B");
        assert_eq!(set.branches[0].targets.len(), 2);

        // A-B ends at the branch; C1-D1 and C2-D2 restart.
        let ids: Vec<Vec<&str>> = set
            .lineages
            .iter()
            .map(|l| l.entries.iter().map(|e| &*e.id).collect())
            .collect();
        assert_eq!(ids, vec![vec!["A", "B"], vec!["C1", "D1"], vec!["C2", "D2"]]);
    }

    #[test]
    fn low_iou_and_non_same_as_links_are_not_edges() {
        let mut weak = same_as(1851, "A", 1861, "B");
        weak.iou = 0.95;
        let mut contains = same_as(1861, "B", 1871, "C");
        contains.relationship = Relationship::Contains;
        let set = build_chains(&[weak, contains], &ChainOptions::default());
        assert!(set.lineages.is_empty());
    }

    #[test]
    fn containment_edges_are_admitted_when_configured() {
        let mut contains = same_as(1851, "A", 1861, "B");
        contains.relationship = Relationship::Within;
        let links = vec![contains, same_as(1861, "B", 1871, "C")];
        let opts = ChainOptions { include_containment: true, ..Default::default() };
        let set = build_chains(&links, &opts);
        assert_eq!(set.lineages.len(), 1);
        assert_eq!(set.lineages[0].entries.len(), 3);
    }

    #[test]
    fn short_chains_are_dropped() {
        // A single admitted link yields a two-entry lineage; a lone node
        // (no admitted outgoing) yields nothing.
        let links = vec![same_as(1851, "A", 1861, "B")];
        let set = build_chains(&links, &ChainOptions::default());
        assert_eq!(set.lineages.len(), 1);
        assert_eq!(set.lineages[0].entries.len(), 2);
    }
}
