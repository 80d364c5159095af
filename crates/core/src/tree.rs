//! Reply tree construction.
//!
//! The collaborator returns a thread as a flat list where replies point at their parent by id.
//! [`build_forest`] turns that list into nested [`CommentNode`]s for rendering:
//!
//! - a comment without a parent is a root
//! - a comment whose parent is in the list is nested under it
//! - a comment whose parent is missing (deleted, or never loaded) is promoted to a root
//!
//! Roots and siblings keep the order of the input list, so building twice from the same list
//! yields identical forests.
//!
//! Malformed input is tolerated rather than trusted. A comment naming itself as parent is a root.
//! Comments caught in a parent cycle cannot be reached from any root; the first of them in list
//! order is promoted to a root so that every comment still appears exactly once. Nesting beyond
//! [`MAX_THREAD_DEPTH`] is reported as [`DiscussionError::ThreadTooDeep`].

use crate::constants::MAX_THREAD_DEPTH;
use crate::error::{DiscussionError, DiscussionResult};
use crate::model::{Comment, CommentId};
use serde::Serialize;
use std::collections::HashMap;

/// A comment together with its replies, in thread order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentNode {
    pub comment: Comment,
    pub children: Vec<CommentNode>,
}

impl CommentNode {
    pub fn id(&self) -> CommentId {
        self.comment.id
    }

    /// Number of comments in this subtree, including this one.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(CommentNode::subtree_len).sum::<usize>()
    }
}

/// Build the reply forest for a flat, already-loaded thread.
///
/// If an id occurs more than once, replies attach to its first occurrence.
///
/// # Errors
///
/// Returns [`DiscussionError::ThreadTooDeep`] if any reply chain is longer than
/// [`MAX_THREAD_DEPTH`].
pub fn build_forest(comments: &[Comment]) -> DiscussionResult<Vec<CommentNode>> {
    let mut index_of: HashMap<CommentId, usize> = HashMap::with_capacity(comments.len());
    for (i, comment) in comments.iter().enumerate() {
        index_of.entry(comment.id).or_insert(i);
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); comments.len()];
    let mut roots: Vec<usize> = Vec::new();
    for (i, comment) in comments.iter().enumerate() {
        match comment.parent_id.and_then(|p| index_of.get(&p).copied()) {
            Some(parent) if parent != i => children[parent].push(i),
            _ => roots.push(i),
        }
    }

    let mut visited = vec![false; comments.len()];
    let mut forest: Vec<(usize, CommentNode)> = Vec::with_capacity(roots.len());
    for &root in &roots {
        forest.push((root, materialise(comments, &children, &mut visited, root, 1)?));
    }

    // Whatever is still unvisited sits on a parent cycle.
    let mut promoted = false;
    for i in 0..comments.len() {
        if !visited[i] {
            tracing::warn!(
                comment_id = comments[i].id,
                "reply cycle in thread, promoting comment to root"
            );
            forest.push((i, materialise(comments, &children, &mut visited, i, 1)?));
            promoted = true;
        }
    }
    if promoted {
        forest.sort_by_key(|(i, _)| *i);
    }

    Ok(forest.into_iter().map(|(_, node)| node).collect())
}

fn materialise(
    comments: &[Comment],
    children: &[Vec<usize>],
    visited: &mut [bool],
    index: usize,
    depth: usize,
) -> DiscussionResult<CommentNode> {
    if depth > MAX_THREAD_DEPTH {
        return Err(DiscussionError::ThreadTooDeep {
            comment_id: comments[index].id,
            limit: MAX_THREAD_DEPTH,
        });
    }
    visited[index] = true;

    let mut nested = Vec::with_capacity(children[index].len());
    for &child in &children[index] {
        if visited[child] {
            continue;
        }
        nested.push(materialise(comments, children, visited, child, depth + 1)?);
    }

    Ok(CommentNode {
        comment: comments[index].clone(),
        children: nested,
    })
}

/// A comment placed at its indentation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadRow<'a> {
    pub depth: usize,
    pub comment: &'a Comment,
}

/// Walk a forest in display order (each comment followed by its replies).
pub fn flatten(forest: &[CommentNode]) -> Vec<ThreadRow<'_>> {
    let mut rows = Vec::new();
    let mut stack: Vec<(usize, &CommentNode)> = forest.iter().rev().map(|n| (0, n)).collect();
    while let Some((depth, node)) = stack.pop() {
        rows.push(ThreadRow {
            depth,
            comment: &node.comment,
        });
        stack.extend(node.children.iter().rev().map(|c| (depth + 1, c)));
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CommentKind;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn comment(id: CommentId, parent_id: Option<CommentId>) -> Comment {
        Comment {
            id,
            parent_id,
            author_id: 1,
            author_name: "Tester".into(),
            body_text: format!("comment {}", id),
            kind: CommentKind::General,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            edited_flag: false,
            reaction_summary: BTreeMap::new(),
        }
    }

    /// `id(children...)` rendering, for compact structural assertions.
    fn shape(forest: &[CommentNode]) -> String {
        forest
            .iter()
            .map(|n| {
                if n.children.is_empty() {
                    n.id().to_string()
                } else {
                    format!("{}({})", n.id(), shape(&n.children))
                }
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    #[test]
    fn test_builds_nested_forest() {
        let comments = vec![
            comment(1, None),
            comment(2, Some(1)),
            comment(3, None),
            comment(4, Some(2)),
        ];
        let forest = build_forest(&comments).unwrap();
        assert_eq!(shape(&forest), "1(2(4)),3");
        assert_eq!(forest[0].subtree_len(), 3);
    }

    #[test]
    fn test_building_twice_is_identical() {
        let comments = vec![
            comment(10, None),
            comment(11, Some(10)),
            comment(12, Some(10)),
            comment(13, Some(11)),
            comment(14, None),
            comment(15, Some(14)),
        ];
        assert_eq!(build_forest(&comments).unwrap(), build_forest(&comments).unwrap());
    }

    #[test]
    fn test_siblings_keep_input_order() {
        let comments = vec![
            comment(5, None),
            comment(9, Some(5)),
            comment(7, Some(5)),
            comment(8, Some(5)),
        ];
        let forest = build_forest(&comments).unwrap();
        assert_eq!(shape(&forest), "5(9,7,8)");
    }

    #[test]
    fn test_reply_listed_before_parent_still_nests() {
        let comments = vec![comment(2, Some(1)), comment(1, None)];
        assert_eq!(shape(&build_forest(&comments).unwrap()), "1(2)");
    }

    #[test]
    fn test_orphan_becomes_root() {
        let comments = vec![comment(1, None), comment(2, Some(99)), comment(3, Some(2))];
        let forest = build_forest(&comments).unwrap();
        assert_eq!(shape(&forest), "1,2(3)");
    }

    #[test]
    fn test_self_parent_is_root() {
        let comments = vec![comment(1, Some(1)), comment(2, Some(1))];
        assert_eq!(shape(&build_forest(&comments).unwrap()), "1(2)");
    }

    #[test]
    fn test_cycle_is_broken_without_dropping_comments() {
        let comments = vec![
            comment(1, None),
            comment(2, Some(3)),
            comment(3, Some(2)),
            comment(4, Some(3)),
        ];
        let forest = build_forest(&comments).unwrap();
        assert_eq!(shape(&forest), "1,2(3(4))");
        let total: usize = forest.iter().map(CommentNode::subtree_len).sum();
        assert_eq!(total, comments.len());
    }

    #[test]
    fn test_depth_limit() {
        let at_limit: Vec<Comment> = (1..=MAX_THREAD_DEPTH as CommentId)
            .map(|id| comment(id, if id == 1 { None } else { Some(id - 1) }))
            .collect();
        assert!(build_forest(&at_limit).is_ok());

        let mut too_deep = at_limit.clone();
        let next = MAX_THREAD_DEPTH as CommentId + 1;
        too_deep.push(comment(next, Some(next - 1)));
        assert!(matches!(
            build_forest(&too_deep),
            Err(DiscussionError::ThreadTooDeep { comment_id, .. }) if comment_id == next
        ));
    }

    #[test]
    fn test_empty_thread() {
        assert!(build_forest(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_flatten_is_preorder_with_depths() {
        let comments = vec![
            comment(1, None),
            comment(2, Some(1)),
            comment(3, None),
            comment(4, Some(2)),
            comment(5, Some(1)),
        ];
        let forest = build_forest(&comments).unwrap();
        let rows: Vec<(usize, CommentId)> = flatten(&forest)
            .iter()
            .map(|r| (r.depth, r.comment.id))
            .collect();
        assert_eq!(rows, vec![(0, 1), (1, 2), (2, 4), (1, 5), (0, 3)]);
    }
}
