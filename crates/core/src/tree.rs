//! Tree builder — turns a flat, creation-ordered list of comments into a
//! forest of reply trees.
//!
//! Comments are stored as an adjacency list (each row names its parent).
//! Assembly works on an arena indexed by input position:
//!
//! 1. index every comment identity to its position
//! 2. link each position to its parent's child list, or to the root list
//! 3. break any parent cycle left unreachable from a root
//!
//! Nodes are then materialized with an explicit post-order stack, so a child
//! is always complete before its parent takes ownership of it and deep
//! chains never recurse. Nothing is re-sorted: roots and siblings keep the
//! order of the input sequence.
//!
//! A parent reference links whenever it names a comment in the input,
//! wherever that comment appears. An unknown parent degrades the comment to
//! a root. A cycle of parent references is cut at its earliest member,
//! which becomes a root. Both are reported as a [`TreeAnomaly`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::model::{Comment, CommentId};

/// A comment together with its replies, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub children: Vec<CommentNode>,
}

impl CommentNode {
    /// Number of nodes in this subtree, including itself.
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}

/// Data-integrity problems tolerated while building a forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeAnomaly {
    /// The parent is not in the input; the comment was promoted to a root.
    DanglingParent {
        comment: CommentId,
        parent: CommentId,
    },
    /// The comment's ancestry loops back to itself; the link to `parent`
    /// was cut and the comment promoted to a root.
    ParentCycle {
        comment: CommentId,
        parent: CommentId,
    },
    /// A comment id appeared more than once; only the first was kept.
    DuplicateId { comment: CommentId },
}

/// Output of [`build_forest`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Forest {
    pub roots: Vec<CommentNode>,
    pub anomalies: Vec<TreeAnomaly>,
}

impl Forest {
    /// Total number of nodes across all trees.
    pub fn node_count(&self) -> usize {
        self.roots.iter().map(CommentNode::size).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

/// Build the reply forest of a single discussion.
///
/// `records` must belong to one discussion and be sorted by creation order
/// (timestamp, then id).
pub fn build_forest(records: Vec<Comment>) -> Forest {
    let mut anomalies = Vec::new();

    // Pass 1: identity → position
    let mut index: HashMap<CommentId, usize> = HashMap::with_capacity(records.len());
    let mut arena: Vec<Comment> = Vec::with_capacity(records.len());
    for comment in records {
        if index.contains_key(&comment.id) {
            anomalies.push(TreeAnomaly::DuplicateId {
                comment: comment.id,
            });
            continue;
        }
        index.insert(comment.id, arena.len());
        arena.push(comment);
    }

    // Pass 2: link by position
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); arena.len()];
    let mut parent_of: Vec<Option<usize>> = vec![None; arena.len()];
    let mut root_positions = Vec::new();
    for (position, comment) in arena.iter().enumerate() {
        let Some(parent) = comment.parent_id else {
            root_positions.push(position);
            continue;
        };
        match index.get(&parent) {
            Some(&parent_position) => {
                children[parent_position].push(position);
                parent_of[position] = Some(parent_position);
            }
            None => {
                anomalies.push(TreeAnomaly::DanglingParent {
                    comment: comment.id,
                    parent,
                });
                root_positions.push(position);
            }
        }
    }

    // Pass 3: anything a root cannot reach hangs off a cycle.
    let mut reachable = vec![false; arena.len()];
    for &root in &root_positions {
        mark_reachable(&children, &mut reachable, root);
    }
    let mut walked = vec![usize::MAX; arena.len()];
    for start in 0..arena.len() {
        if reachable[start] {
            continue;
        }
        // Climb until a position repeats; that position is on the cycle.
        let mut entry = start;
        while walked[entry] != start {
            walked[entry] = start;
            match parent_of[entry] {
                Some(parent) => entry = parent,
                None => break,
            }
        }

        let mut earliest = entry;
        let mut cursor = entry;
        while let Some(parent) = parent_of[cursor] {
            if parent == entry {
                break;
            }
            earliest = earliest.min(parent);
            cursor = parent;
        }

        if let Some(parent) = parent_of[earliest].take() {
            children[parent].retain(|&child| child != earliest);
            anomalies.push(TreeAnomaly::ParentCycle {
                comment: arena[earliest].id,
                parent: arena[parent].id,
            });
        }
        root_positions.push(earliest);
        mark_reachable(&children, &mut reachable, earliest);
    }
    root_positions.sort_unstable();

    // Post-order: children are built before the parent collects them.
    let mut slots: Vec<Option<Comment>> = arena.into_iter().map(Some).collect();
    let mut built: Vec<Option<CommentNode>> = Vec::with_capacity(slots.len());
    built.resize_with(slots.len(), || None);
    let mut stack: Vec<(usize, bool)> = root_positions.iter().rev().map(|&p| (p, false)).collect();
    while let Some((position, expanded)) = stack.pop() {
        if !expanded {
            stack.push((position, true));
            stack.extend(children[position].iter().rev().map(|&child| (child, false)));
            continue;
        }
        let Some(comment) = slots[position].take() else {
            continue;
        };
        let replies = children[position]
            .iter()
            .filter_map(|&child| built[child].take())
            .collect();
        built[position] = Some(CommentNode {
            comment,
            children: replies,
        });
    }

    let roots = root_positions
        .into_iter()
        .filter_map(|position| built[position].take())
        .collect();

    for anomaly in &anomalies {
        match anomaly {
            TreeAnomaly::DanglingParent { comment, parent } => {
                warn!(comment = %comment, parent = %parent, "Comment parent unresolved; attached as root");
            }
            TreeAnomaly::ParentCycle { comment, parent } => {
                warn!(comment = %comment, parent = %parent, "Comment parent forms a cycle; attached as root");
            }
            TreeAnomaly::DuplicateId { comment } => {
                warn!(comment = %comment, "Duplicate comment id; later copy dropped");
            }
        }
    }

    Forest { roots, anomalies }
}

fn mark_reachable(children: &[Vec<usize>], reachable: &mut [bool], from: usize) {
    let mut stack = vec![from];
    while let Some(position) = stack.pop() {
        if !std::mem::replace(&mut reachable[position], true) {
            stack.extend(children[position].iter().copied());
        }
    }
}
