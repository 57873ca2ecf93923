use crate::mcts::node::{Node, NodeId};

use std::collections::VecDeque;
use std::mem;

/// Owns every node of a search tree. Nodes refer to each other by [`NodeId`].
#[derive(Clone, Debug, Default)]
pub struct Arena {
    nodes: Vec<Node>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn push(&mut self, node: Node) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(node);
        id
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id as usize]
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Drops every node outside of the subtree rooted at `root`, and returns the new id of `root`.
    ///
    /// Surviving nodes are renumbered breadth-first, so `root` becomes node 0 and keeps no parent.
    /// Children keep their relative order.
    pub fn retain_subtree(&mut self, root: NodeId) -> NodeId {
        let mut old_nodes: Vec<Option<Node>> =
            mem::take(&mut self.nodes).into_iter().map(Some).collect();

        let mut queue = VecDeque::from([(root, None)]);
        while let Some((old_id, new_parent)) = queue.pop_front() {
            let mut node = match old_nodes.get_mut(old_id as usize).and_then(Option::take) {
                Some(node) => node,
                None => continue,
            };

            let children = mem::take(&mut node.children);
            node.parent = new_parent;
            let new_id = self.push(node);

            if let Some(parent_id) = new_parent {
                self.get_mut(parent_id).children.push(new_id);
            }
            queue.extend(children.into_iter().map(|child| (child, Some(new_id))));
        }

        0
    }
}
