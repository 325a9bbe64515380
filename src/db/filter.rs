//! Typed Predicate Builder
//!
//! Structural queries against the `nodes` table are expressed as
//! [`NodeFilter`] values instead of SQL strings. Every comparison targets a
//! column from a closed set and every operand travels as a bound parameter,
//! so no caller-supplied text (scope names included) is ever spliced into a
//! statement.
//!
//! # Examples
//!
//! ```rust
//! use arbor_core::db::{Cmp, NodeFilter, OrderDirection};
//!
//! // descendants of [2, 9] in scope "shop", preorder
//! let filter = NodeFilter::new()
//!     .scope("shop")
//!     .left(Cmp::Gt, 2)
//!     .right(Cmp::Lt, 9)
//!     .order_by_left(OrderDirection::Asc);
//!
//! let (sql, params) = filter.to_sql();
//! assert!(sql.contains("lft > ?"));
//! assert_eq!(params.len(), 3);
//! ```

use libsql::Value;

/// Comparison operators usable in a filter condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Cmp {
    fn as_sql(self) -> &'static str {
        match self {
            Cmp::Eq => "=",
            Cmp::Ne => "<>",
            Cmp::Lt => "<",
            Cmp::Le => "<=",
            Cmp::Gt => ">",
            Cmp::Ge => ">=",
        }
    }
}

/// Ordering direction for the `lft` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    fn as_sql(self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

/// The two boundary columns the space allocator may shift.
///
/// A closed set: bulk increment statements pick their column by matching on
/// this enum, never from a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionColumn {
    Left,
    Right,
}

impl PositionColumn {
    /// Physical column name in the `nodes` table
    pub fn column_name(self) -> &'static str {
        match self {
            PositionColumn::Left => "lft",
            PositionColumn::Right => "rgt",
        }
    }
}

#[derive(Debug, Clone)]
enum Condition {
    Scope(String),
    IdEq(String),
    IdNe(String),
    ParentEq(String),
    Left(Cmp, i64),
    Right(Cmp, i64),
    Level(Cmp, i64),
    /// `rgt = lft + 1` - leaf rows
    Leaf,
    /// `lft >= rgt` - structurally impossible rows (verifier)
    Inverted,
}

/// AND-composed structural predicate over the `nodes` table.
///
/// Builder-style: each method appends one condition. An empty filter
/// matches every row.
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    conditions: Vec<Condition>,
    order: Option<OrderDirection>,
    limit: Option<u64>,
}

impl NodeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to one scope (`scope = ?`)
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.conditions.push(Condition::Scope(scope.into()));
        self
    }

    /// Match a single node by id
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.conditions.push(Condition::IdEq(id.into()));
        self
    }

    /// Exclude a node by id (`id <> ?`)
    pub fn id_ne(mut self, id: impl Into<String>) -> Self {
        self.conditions.push(Condition::IdNe(id.into()));
        self
    }

    /// Restrict to direct children of a parent (`parent_id = ?`)
    pub fn parent(mut self, parent_id: impl Into<String>) -> Self {
        self.conditions.push(Condition::ParentEq(parent_id.into()));
        self
    }

    /// Compare the `lft` column against a constant
    pub fn left(mut self, cmp: Cmp, value: i64) -> Self {
        self.conditions.push(Condition::Left(cmp, value));
        self
    }

    /// Compare the `rgt` column against a constant
    pub fn right(mut self, cmp: Cmp, value: i64) -> Self {
        self.conditions.push(Condition::Right(cmp, value));
        self
    }

    /// Compare the `lvl` column against a constant
    pub fn level(mut self, cmp: Cmp, value: i64) -> Self {
        self.conditions.push(Condition::Level(cmp, value));
        self
    }

    /// Restrict to leaf rows (`rgt = lft + 1`)
    pub fn leaf(mut self) -> Self {
        self.conditions.push(Condition::Leaf);
        self
    }

    /// Restrict to inverted rows (`lft >= rgt`); only the verifier wants these
    pub fn inverted(mut self) -> Self {
        self.conditions.push(Condition::Inverted);
        self
    }

    /// Order results by `lft`
    pub fn order_by_left(mut self, direction: OrderDirection) -> Self {
        self.order = Some(direction);
        self
    }

    /// Cap the number of returned rows
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Render the filter as a SQL suffix (`WHERE ... ORDER BY ... LIMIT ...`)
    /// plus its bound parameters, in positional order.
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let mut clauses = Vec::with_capacity(self.conditions.len());
        let mut params = Vec::new();

        for condition in &self.conditions {
            match condition {
                Condition::Scope(scope) => {
                    clauses.push("scope = ?".to_string());
                    params.push(Value::Text(scope.clone()));
                }
                Condition::IdEq(id) => {
                    clauses.push("id = ?".to_string());
                    params.push(Value::Text(id.clone()));
                }
                Condition::IdNe(id) => {
                    clauses.push("id <> ?".to_string());
                    params.push(Value::Text(id.clone()));
                }
                Condition::ParentEq(parent) => {
                    clauses.push("parent_id = ?".to_string());
                    params.push(Value::Text(parent.clone()));
                }
                Condition::Left(cmp, value) => {
                    clauses.push(format!("lft {} ?", cmp.as_sql()));
                    params.push(Value::Integer(*value));
                }
                Condition::Right(cmp, value) => {
                    clauses.push(format!("rgt {} ?", cmp.as_sql()));
                    params.push(Value::Integer(*value));
                }
                Condition::Level(cmp, value) => {
                    clauses.push(format!("lvl {} ?", cmp.as_sql()));
                    params.push(Value::Integer(*value));
                }
                Condition::Leaf => clauses.push("rgt = lft + 1".to_string()),
                Condition::Inverted => clauses.push("lft >= rgt".to_string()),
            }
        }

        let mut sql = String::new();
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        if let Some(direction) = self.order {
            sql.push_str(" ORDER BY lft ");
            sql.push_str(direction.as_sql());
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        (sql, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_matches_everything() {
        let (sql, params) = NodeFilter::new().to_sql();
        assert_eq!(sql, "");
        assert!(params.is_empty());
    }

    #[test]
    fn conditions_join_with_and_in_order() {
        let (sql, params) = NodeFilter::new()
            .scope("shop")
            .left(Cmp::Ge, 2)
            .right(Cmp::Le, 9)
            .order_by_left(OrderDirection::Asc)
            .to_sql();

        assert_eq!(
            sql,
            " WHERE scope = ? AND lft >= ? AND rgt <= ? ORDER BY lft ASC"
        );
        assert_eq!(params.len(), 3);
        assert_eq!(params[0], Value::Text("shop".to_string()));
        assert_eq!(params[1], Value::Integer(2));
        assert_eq!(params[2], Value::Integer(9));
    }

    #[test]
    fn column_to_column_conditions_bind_no_params() {
        let (sql, params) = NodeFilter::new().scope("s").leaf().inverted().to_sql();
        assert!(sql.contains("rgt = lft + 1"));
        assert!(sql.contains("lft >= rgt"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn scope_value_is_bound_not_spliced() {
        let hostile = "shop'; DROP TABLE nodes; --";
        let (sql, params) = NodeFilter::new().scope(hostile).to_sql();
        assert_eq!(sql, " WHERE scope = ?");
        assert_eq!(params[0], Value::Text(hostile.to_string()));
    }

    #[test]
    fn limit_and_desc_order_render() {
        let (sql, _) = NodeFilter::new()
            .parent("p-1")
            .order_by_left(OrderDirection::Desc)
            .limit(5)
            .to_sql();
        assert_eq!(sql, " WHERE parent_id = ? ORDER BY lft DESC LIMIT 5");
    }

    #[test]
    fn position_column_names_are_closed() {
        assert_eq!(PositionColumn::Left.column_name(), "lft");
        assert_eq!(PositionColumn::Right.column_name(), "rgt");
    }
}
