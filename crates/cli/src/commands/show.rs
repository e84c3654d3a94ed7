//! `numthread show` — Print discussions as reply trees.

use numthread_config::AppConfig;
use numthread_core::model::DiscussionId;
use numthread_core::tree::TreeAnomaly;
use numthread_core::{Aggregation, CommentNode, DiscussionStore, DiscussionWithTree, thread};
use std::fmt::Write;

pub async fn run(discussion: Option<i64>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let store = numthread_store::open_store(&config.database).await?;

    let aggregation = load(store.as_ref(), discussion.map(DiscussionId)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&aggregation.discussions)?);
    } else {
        print!("{}", render(&aggregation));
    }
    Ok(())
}

async fn load(
    store: &dyn DiscussionStore,
    only: Option<DiscussionId>,
) -> Result<Aggregation, Box<dyn std::error::Error>> {
    let Some(id) = only else {
        return Ok(thread::load_discussions(store).await?);
    };
    let aggregation = thread::load_discussion(store, id)
        .await?
        .ok_or_else(|| format!("Discussion {id} not found"))?;
    Ok(aggregation)
}

/// Render discussions as indented text, followed by any integrity issues.
fn render(aggregation: &Aggregation) -> String {
    let mut out = String::new();
    if aggregation.discussions.is_empty() {
        out.push_str("No discussions yet.\n");
    }
    for discussion in &aggregation.discussions {
        render_discussion(&mut out, discussion);
    }

    let report = &aggregation.report;
    if !report.is_clean() {
        let _ = writeln!(out, "{} integrity issue(s):", report.issue_count());
        for id in &report.orphaned_comments {
            let _ = writeln!(out, "  comment #{id} belongs to no known discussion");
        }
        for (discussion, anomaly) in &report.tree_anomalies {
            let _ = match anomaly {
                TreeAnomaly::DanglingParent { comment, parent } => writeln!(
                    out,
                    "  discussion #{discussion}: comment #{comment} shown as root, parent #{parent} not in this discussion"
                ),
                TreeAnomaly::ParentCycle { comment, parent } => writeln!(
                    out,
                    "  discussion #{discussion}: comment #{comment} shown as root, parent #{parent} loops back to it"
                ),
                TreeAnomaly::DuplicateId { comment } => writeln!(
                    out,
                    "  discussion #{discussion}: duplicate comment #{comment} skipped"
                ),
            };
        }
    }
    out
}

fn render_discussion(out: &mut String, entry: &DiscussionWithTree) {
    let d = &entry.discussion;
    let _ = writeln!(
        out,
        "#{} {} started with {} ({})",
        d.id,
        d.username,
        d.start_number,
        d.created_at.format("%Y-%m-%d %H:%M")
    );

    // Depth-first with an explicit stack; children are pushed in reverse so
    // they print oldest first. A root that names a parent was detached from
    // it, so the number it was computed from is unknown here.
    let mut stack: Vec<(&CommentNode, usize, Option<f64>)> = entry
        .comments
        .iter()
        .rev()
        .map(|node| {
            let previous = node.comment.parent_id.is_none().then_some(d.start_number);
            (node, 1, previous)
        })
        .collect();
    while let Some((node, depth, previous)) = stack.pop() {
        let c = &node.comment;
        let _ = match previous {
            Some(previous) => writeln!(
                out,
                "{:indent$}#{} {}: {} {} {} = {}",
                "",
                c.id,
                c.username,
                previous,
                c.operation.symbol(),
                c.operand,
                c.result,
                indent = depth * 2
            ),
            None => writeln!(
                out,
                "{:indent$}#{} {}: {} (reply to #{}, shown as root)",
                "",
                c.id,
                c.username,
                c.result,
                c.parent_id.map(|p| p.to_string()).unwrap_or_default(),
                indent = depth * 2
            ),
        };
        stack.extend(
            node.children
                .iter()
                .rev()
                .map(|child| (child, depth + 1, Some(c.result))),
        );
    }
    out.push('\n');
}
