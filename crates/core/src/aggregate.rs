//! Discussion aggregator — attaches each discussion's reply forest.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::model::{Comment, CommentId, Discussion, DiscussionId};
use crate::tree::{CommentNode, TreeAnomaly, build_forest};

/// A discussion with its comments assembled into reply trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscussionWithTree {
    #[serde(flatten)]
    pub discussion: Discussion,
    pub comments: Vec<CommentNode>,
}

/// Integrity problems absorbed while aggregating.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// Comments whose discussion was not among the supplied discussions.
    pub orphaned_comments: Vec<CommentId>,
    /// Tree anomalies, per discussion.
    pub tree_anomalies: Vec<(DiscussionId, TreeAnomaly)>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.orphaned_comments.is_empty() && self.tree_anomalies.is_empty()
    }

    pub fn issue_count(&self) -> usize {
        self.orphaned_comments.len() + self.tree_anomalies.len()
    }
}

/// Output of [`aggregate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    pub discussions: Vec<DiscussionWithTree>,
    pub report: IntegrityReport,
}

/// Group `records` by discussion and build one forest per discussion.
///
/// The result has one entry per input discussion, in input order, including
/// discussions without comments. Partitioning is stable, so each forest sees
/// its comments in the order they were supplied.
pub fn aggregate(discussions: Vec<Discussion>, records: Vec<Comment>) -> Aggregation {
    let mut partitions: HashMap<DiscussionId, Vec<Comment>> = discussions
        .iter()
        .map(|discussion| (discussion.id, Vec::new()))
        .collect();

    let mut report = IntegrityReport::default();
    for comment in records {
        match partitions.get_mut(&comment.discussion_id) {
            Some(partition) => partition.push(comment),
            None => {
                warn!(
                    comment = %comment.id,
                    discussion = %comment.discussion_id,
                    "Comment references unknown discussion; excluded"
                );
                report.orphaned_comments.push(comment.id);
            }
        }
    }

    let discussions: Vec<DiscussionWithTree> = discussions
        .into_iter()
        .map(|discussion| {
            let records = partitions.remove(&discussion.id).unwrap_or_default();
            let forest = build_forest(records);
            report.tree_anomalies.extend(
                forest
                    .anomalies
                    .into_iter()
                    .map(|anomaly| (discussion.id, anomaly)),
            );
            DiscussionWithTree {
                discussion,
                comments: forest.roots,
            }
        })
        .collect();

    debug!(
        discussions = discussions.len(),
        issues = report.issue_count(),
        "Aggregated discussions"
    );

    Aggregation {
        discussions,
        report,
    }
}
