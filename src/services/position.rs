//! Position Calculator
//!
//! Pure placement math for the mutation engine. Given a target node and a
//! relative placement, these functions compute where a new node lands or how
//! far an existing subtree must travel. Nothing here touches the store.
//!
//! The four placements share one parameter table (anchor column, left
//! offset, level offset), taken from the classic MPTT formulation:
//!
//! | placement      | anchor | left_offset | level_offset |
//! |----------------|--------|-------------|--------------|
//! | first child    | left   | 1           | 1            |
//! | last child     | right  | 0           | 1            |
//! | prev sibling   | left   | 0           | 0            |
//! | next sibling   | right  | 1           | 0            |

use crate::models::TreeNode;

/// Where a node is inserted or moved, relative to a target node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    FirstChild,
    LastChild,
    PrevSibling,
    NextSibling,
}

impl Placement {
    /// The target boundary the new left value is computed from.
    fn anchor(self, target: &TreeNode) -> i64 {
        match self {
            Placement::FirstChild | Placement::PrevSibling => target.left,
            Placement::LastChild | Placement::NextSibling => target.right,
        }
    }

    fn left_offset(self) -> i64 {
        match self {
            Placement::FirstChild | Placement::NextSibling => 1,
            Placement::LastChild | Placement::PrevSibling => 0,
        }
    }

    fn level_offset(self) -> i64 {
        match self {
            Placement::FirstChild | Placement::LastChild => 1,
            Placement::PrevSibling | Placement::NextSibling => 0,
        }
    }

    /// Sibling placements cannot target a root: a root has no siblings.
    pub fn allows_root_target(self) -> bool {
        matches!(self, Placement::FirstChild | Placement::LastChild)
    }
}

/// Computed landing position for a brand-new leaf node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertPlan {
    pub left: i64,
    pub right: i64,
    pub level: i64,
    /// The new node's parent: the target for child placements, the target's
    /// own parent for sibling placements (the new node stands beside the
    /// target, not under it).
    pub parent_id: Option<String>,
    pub scope: String,
}

/// Computed parameters for a subtree move.
///
/// `raw_left` is where the subtree's left boundary should land, evaluated
/// against the target's pre-gap state. The engine opens a gap of `size` at
/// `raw_left` first, reloads the source, and only then derives the actual
/// shift, because the gap opening may displace the source itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan {
    pub raw_left: i64,
    pub level_delta: i64,
    pub size: i64,
    /// The moved node's parent after the move: the target for child
    /// placements, the target's own parent for sibling placements.
    pub parent_id: Option<String>,
}

/// Compute the landing position of a new node relative to `target`.
pub fn plan_insert(target: &TreeNode, placement: Placement) -> InsertPlan {
    let left = placement.anchor(target) + placement.left_offset();
    let parent_id = match placement {
        Placement::FirstChild | Placement::LastChild => Some(target.id.clone()),
        Placement::PrevSibling | Placement::NextSibling => target.parent_id.clone(),
    };
    InsertPlan {
        left,
        right: left + 1,
        level: target.level + placement.level_offset(),
        parent_id,
        scope: target.scope.clone(),
    }
}

/// Compute the travel parameters for moving `node` relative to `target`.
pub fn plan_move(node: &TreeNode, target: &TreeNode, placement: Placement) -> MovePlan {
    let parent_id = match placement {
        Placement::FirstChild | Placement::LastChild => Some(target.id.clone()),
        Placement::PrevSibling | Placement::NextSibling => target.parent_id.clone(),
    };
    MovePlan {
        raw_left: placement.anchor(target) + placement.left_offset(),
        level_delta: target.level - node.level + placement.level_offset(),
        size: node.size(),
        parent_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn node(left: i64, right: i64, level: i64) -> TreeNode {
        TreeNode {
            id: format!("n-{}", left),
            scope: "shop".to_string(),
            left,
            right,
            level,
            parent_id: None,
            content: String::new(),
            path_part: None,
            path: None,
            created_at: Utc::now(),
            modified_at: Utc::now(),
            properties: json!({}),
        }
    }

    #[test]
    fn insert_plan_matches_placement_table() {
        // target occupies [3, 8] at level 1, under parent "p"
        let mut target = node(3, 8, 1);
        target.parent_id = Some("p".to_string());

        let first = plan_insert(&target, Placement::FirstChild);
        assert_eq!((first.left, first.right, first.level), (4, 5, 2));

        let last = plan_insert(&target, Placement::LastChild);
        assert_eq!((last.left, last.right, last.level), (8, 9, 2));

        let prev = plan_insert(&target, Placement::PrevSibling);
        assert_eq!((prev.left, prev.right, prev.level), (3, 4, 1));

        let next = plan_insert(&target, Placement::NextSibling);
        assert_eq!((next.left, next.right, next.level), (9, 10, 1));

        // child placements hang under the target; sibling placements stand
        // beside it, sharing its parent
        assert_eq!(first.parent_id.as_deref(), Some(target.id.as_str()));
        assert_eq!(last.parent_id.as_deref(), Some(target.id.as_str()));
        assert_eq!(prev.parent_id.as_deref(), Some("p"));
        assert_eq!(next.parent_id.as_deref(), Some("p"));
        assert_eq!(first.scope, "shop");
    }

    #[test]
    fn move_plan_level_delta_and_size() {
        let source = node(10, 15, 3); // subtree of width 6
        let target = node(2, 7, 1);

        let plan = plan_move(&source, &target, Placement::FirstChild);
        assert_eq!(plan.raw_left, 3);
        assert_eq!(plan.level_delta, -1); // 1 - 3 + 1
        assert_eq!(plan.size, 6);
        assert_eq!(plan.parent_id.as_deref(), Some(target.id.as_str()));

        let plan = plan_move(&source, &target, Placement::NextSibling);
        assert_eq!(plan.raw_left, 8);
        assert_eq!(plan.level_delta, -2); // 1 - 3 + 0
        assert_eq!(plan.parent_id, target.parent_id);
    }

    #[test]
    fn only_child_placements_allow_root_targets() {
        assert!(Placement::FirstChild.allows_root_target());
        assert!(Placement::LastChild.allows_root_target());
        assert!(!Placement::PrevSibling.allows_root_target());
        assert!(!Placement::NextSibling.allows_root_target());
    }
}
