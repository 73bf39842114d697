//! Rebuilding reply threads from the flat comment list of a post.

use crate::model::{
    Id,
    comment::{Comment, CommentMarker},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    /// 0 for roots.
    pub depth: usize,
    pub children: Vec<CommentNode>,
}

/// Deepest nesting a forest holds, roots being 0.
pub const MAX_DEPTH: usize = 32;

/// Turns the comments of one post, oldest first, into a forest of reply trees.
///
/// Siblings keep their input order at every level. Comments whose parent is
/// missing from `comments` (orphans) become roots, and so does any comment that
/// would close a parent cycle: for each cycle the member appearing first in the
/// input is promoted. Every input comment ends up in the forest exactly once.
///
/// Replies that would nest deeper than [`MAX_DEPTH`] are attached to their
/// ancestor at `MAX_DEPTH - 1` instead, in input order among its children.
#[must_use]
pub fn build_comment_forest(comments: Vec<Comment>) -> Vec<CommentNode> {
    let mut positions = HashMap::<Id<CommentMarker>, usize>::with_capacity(comments.len());
    for (position, comment) in comments.iter().enumerate() {
        positions.entry(comment.id).or_insert(position);
    }

    let mut parents: Vec<Option<usize>> = comments
        .iter()
        .enumerate()
        .map(|(position, comment)| {
            comment
                .parent_comment_id
                .and_then(|parent_id| positions.get(&parent_id).copied())
                .filter(|&parent| parent != position)
        })
        .collect();
    break_cycles(&mut parents);

    let mut depths = depths(&parents);
    let mut by_depth = vec![Vec::new(); depths.iter().max().map_or(0, |max| max + 1)];
    for (position, &depth) in depths.iter().enumerate() {
        by_depth[depth].push(position);
    }
    cap_depth(&mut parents, &mut depths, &mut by_depth);

    let mut children = vec![Vec::new(); comments.len()];
    let mut roots = Vec::new();
    for (position, parent) in parents.iter().enumerate() {
        match parent {
            Some(parent) => children[*parent].push(position),
            None => roots.push(position),
        }
    }

    // Deepest level first, so every child node is complete before its parent takes it.
    let mut pending: Vec<Option<Comment>> = comments.into_iter().map(Some).collect();
    let mut built: Vec<Option<CommentNode>> = vec![None; pending.len()];
    for &position in by_depth.iter().rev().flatten() {
        let Some(comment) = pending[position].take() else {
            continue;
        };
        let node_children = children[position]
            .iter()
            .filter_map(|&child| built[child].take())
            .collect();

        built[position] = Some(CommentNode {
            comment,
            depth: depths[position],
            children: node_children,
        });
    }

    roots
        .into_iter()
        .filter_map(|root| built[root].take())
        .collect()
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Visit {
    Unvisited,
    OnPath,
    Done,
}

fn break_cycles(parents: &mut [Option<usize>]) {
    let mut visits = vec![Visit::Unvisited; parents.len()];
    let mut path = Vec::new();

    for start in 0..parents.len() {
        let mut current = Some(start);
        while let Some(position) = current {
            match visits[position] {
                Visit::Done => break,
                Visit::OnPath => {
                    if let Some(cycle_start) = path.iter().position(|&p| p == position)
                        && let Some(&first) = path[cycle_start..].iter().min()
                    {
                        parents[first] = None;
                    }
                    break;
                }
                Visit::Unvisited => {
                    visits[position] = Visit::OnPath;
                    path.push(position);
                    current = parents[position];
                }
            }
        }

        for position in path.drain(..) {
            visits[position] = Visit::Done;
        }
    }
}

/// Moves every comment below [`MAX_DEPTH`] up to its ancestor at `MAX_DEPTH - 1`.
fn cap_depth(
    parents: &mut [Option<usize>],
    depths: &mut [usize],
    by_depth: &mut Vec<Vec<usize>>,
) {
    if by_depth.len() <= MAX_DEPTH + 1 {
        return;
    }

    let too_deep = by_depth.split_off(MAX_DEPTH + 1);
    for position in too_deep.into_iter().flatten() {
        // Levels go top down, so the parent either sits at MAX_DEPTH or was
        // already moved under the ancestor this comment needs.
        parents[position] = parents[position].and_then(|parent| parents[parent]);
        depths[position] = MAX_DEPTH;
        by_depth[MAX_DEPTH].push(position);
    }
}

/// Expects `parents` to be acyclic.
fn depths(parents: &[Option<usize>]) -> Vec<usize> {
    let mut depths: Vec<Option<usize>> = vec![None; parents.len()];
    let mut path = Vec::new();

    for start in 0..parents.len() {
        let mut known = None;
        let mut current = Some(start);
        while let Some(position) = current {
            if let Some(depth) = depths[position] {
                known = Some(depth);
                break;
            }
            path.push(position);
            current = parents[position];
        }

        // Without a known ancestor the walk ended on a root.
        let mut depth = known.map_or(0, |depth| depth + 1);
        for position in path.drain(..).rev() {
            depths[position] = Some(depth);
            depth += 1;
        }
    }

    depths.into_iter().map(Option::unwrap_or_default).collect()
}
