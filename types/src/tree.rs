//! Path-indexed tree of mutants, the model behind a test-explorer view.
//!
//! Nodes live in an arena addressed by index, with a child-lookup map per
//! node; removal pushes slots onto a free list. Directory and file nodes are
//! keyed by path segment; below each file node sit mutant leaves keyed by
//! the derived mutant identity, so re-discovery recognizes the same logical
//! mutant even when the server reissues ids.
//!
//! The tree is owned by exactly one presenter and is not safe for concurrent
//! mutation; callers serialize discovery/test-result processing.

use std::collections::HashMap;

use crate::mutant::MutantPayload;
use crate::params::{DiscoverResult, MutationTestResult};

/// Stable handle to a tree node. Invalidated when the node is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
struct Node {
    segment: String,
    parent: Option<usize>,
    children: HashMap<String, usize>,
    payload: Option<MutantPayload>,
}

impl Node {
    fn new(segment: String, parent: Option<usize>) -> Self {
        Self {
            segment,
            parent,
            children: HashMap::new(),
            payload: None,
        }
    }
}

#[derive(Debug)]
pub struct MutantTree {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
}

impl Default for MutantTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MutantTree {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Some(Node::new(String::new(), None))],
            free: Vec::new(),
        }
    }

    fn node(&self, index: usize) -> &Node {
        self.nodes[index]
            .as_ref()
            .unwrap_or_else(|| unreachable!("live node index {index}"))
    }

    fn node_mut(&mut self, index: usize) -> &mut Node {
        self.nodes[index]
            .as_mut()
            .unwrap_or_else(|| unreachable!("live node index {index}"))
    }

    fn alloc(&mut self, node: Node) -> usize {
        if let Some(index) = self.free.pop() {
            self.nodes[index] = Some(node);
            index
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    fn release_subtree(&mut self, index: usize) {
        let mut stack = vec![index];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes[current].take() {
                stack.extend(node.children.values().copied());
                self.free.push(current);
            }
        }
    }

    fn child_of(&mut self, parent: usize, segment: &str) -> usize {
        if let Some(&existing) = self.node(parent).children.get(segment) {
            return existing;
        }
        let child = self.alloc(Node::new(segment.to_string(), Some(parent)));
        self.node_mut(parent)
            .children
            .insert(segment.to_string(), child);
        child
    }

    /// Walk/create one node per path segment, then create or replace the
    /// mutant leaf keyed by the payload's identity. Idempotent: re-upserting
    /// the same identity at the same path updates the payload in place.
    pub fn upsert(&mut self, relative_file_path: &str, payload: impl Into<MutantPayload>) -> NodeId {
        let payload = payload.into();
        let mut current = 0;
        for segment in segments(relative_file_path) {
            current = self.child_of(current, segment);
        }
        let leaf = self.child_of(current, &payload.identity());
        self.node_mut(leaf).payload = Some(payload);
        NodeId(leaf)
    }

    /// Clear all mutant leaves under the file node, then upsert `mutants`,
    /// so mutants removed by a re-discovery disappear from the tree.
    pub fn replace_mutants_of_file(
        &mut self,
        relative_file_path: &str,
        mutants: impl IntoIterator<Item = MutantPayload>,
    ) {
        if let Some(NodeId(file)) = self.find(relative_file_path) {
            let stale: Vec<usize> = self.node_mut(file).children.drain().map(|(_, v)| v).collect();
            for index in stale {
                self.release_subtree(index);
            }
        }
        for mutant in mutants {
            self.upsert(relative_file_path, mutant);
        }
    }

    /// Delete the file node, pruning ancestor directories left empty, up to
    /// (but not including) the first ancestor that still has children.
    pub fn remove_file(&mut self, relative_file_path: &str) -> bool {
        let Some(NodeId(file)) = self.find(relative_file_path) else {
            return false;
        };
        let mut removed = file;
        loop {
            let parent = self.node(removed).parent;
            let segment = self.node(removed).segment.clone();
            self.release_subtree(removed);
            let Some(parent) = parent else {
                break; // the root itself is never released
            };
            self.node_mut(parent).children.remove(&segment);
            if parent == 0 || !self.node(parent).children.is_empty() {
                break;
            }
            removed = parent;
        }
        true
    }

    /// Exact segment-by-segment lookup; absent if any intermediate segment
    /// is missing, regardless of overlapping prefixes of other paths.
    #[must_use]
    pub fn find(&self, relative_file_path: &str) -> Option<NodeId> {
        let mut current = 0;
        for segment in segments(relative_file_path) {
            current = *self.node(current).children.get(segment)?;
        }
        Some(NodeId(current))
    }

    #[must_use]
    pub fn segment(&self, id: NodeId) -> &str {
        &self.node(id.0).segment
    }

    #[must_use]
    pub fn payload(&self, id: NodeId) -> Option<&MutantPayload> {
        self.node(id.0).payload.as_ref()
    }

    #[must_use]
    pub fn child_count(&self, id: NodeId) -> usize {
        self.node(id.0).children.len()
    }

    /// Mutant payloads under a file node, ordered by identity for
    /// deterministic presentation.
    #[must_use]
    pub fn mutants_of_file(&self, relative_file_path: &str) -> Vec<&MutantPayload> {
        let Some(NodeId(file)) = self.find(relative_file_path) else {
            return Vec::new();
        };
        let mut children: Vec<&Node> = self
            .node(file)
            .children
            .values()
            .map(|&index| self.node(index))
            .collect();
        children.sort_by(|a, b| a.segment.cmp(&b.segment));
        children.iter().filter_map(|n| n.payload.as_ref()).collect()
    }

    /// Live nodes, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// Reconcile a discovery outcome: per reported file, replace the mutant
    /// set wholesale (the server's answer is authoritative for that file).
    pub fn apply_discovery(&mut self, result: &DiscoverResult) {
        for (path, file) in &result.files {
            self.replace_mutants_of_file(
                path,
                file.mutants.iter().cloned().map(MutantPayload::Discovered),
            );
        }
    }

    /// Fold tested outcomes in without clearing: identities already present
    /// upgrade in place, new ones are inserted.
    pub fn apply_test_result(&mut self, result: &MutationTestResult) {
        for (path, file) in &result.files {
            for mutant in &file.mutants {
                self.upsert(path, mutant.clone());
            }
        }
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}
