//! Query shaping options and their composition into a [`QueryPlan`].
//!
//! Options are plain values. A handler builds a list of them from the request
//! and [`QueryPlan::compose`] folds that list, left to right, into the plan a
//! persistence backend executes. Options that shape different concerns
//! (filtering, pagination, ordering) commute. Preloads are kept per path so
//! `Order.Product` stays distinct from a sibling `Product` preload.

use std::fmt;

use serde_json::Value;

use crate::model::ModelSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    IsNull,
    IsNotNull,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Like => "LIKE",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        };
        f.write_str(op)
    }
}

/// A single condition on one field. Predicates in a plan are joined with AND.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub op: Operator,
    pub value: Value,
}

impl Predicate {
    pub fn new(field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            Operator::IsNull | Operator::IsNotNull => write!(f, "{} {}", self.field, self.op),
            _ => write!(f, "{} {} {}", self.field, self.op, self.value),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOption {
    Paginate { limit: u64, offset: u64 },
    OrderBy { field: String, descending: bool },
    /// Equality filter.
    FilterBy { field: String, value: Value },
    Where(Predicate),
    /// Eager-load the relation at `path` (dot separated), shaping it with
    /// `options`.
    Preload { path: String, options: Vec<QueryOption> },
    /// Eager-load every direct relation.
    PreloadAll,
}

impl QueryOption {
    #[must_use]
    pub fn paginate(limit: u64, offset: u64) -> Self {
        Self::Paginate { limit, offset }
    }

    pub fn order_by(field: impl Into<String>, descending: bool) -> Self {
        Self::OrderBy {
            field: field.into(),
            descending,
        }
    }

    pub fn filter_by(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::FilterBy {
            field: field.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn where_(predicate: Predicate) -> Self {
        Self::Where(predicate)
    }

    pub fn preload(path: impl Into<String>) -> Self {
        Self::preload_with(path, Vec::new())
    }

    pub fn preload_with(path: impl Into<String>, options: Vec<QueryOption>) -> Self {
        Self::Preload {
            path: path.into(),
            options,
        }
    }
}

impl fmt::Display for QueryOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Paginate { limit, offset } => write!(f, "limit {limit} offset {offset}"),
            Self::OrderBy { field, descending } => {
                write!(f, "order by {field}")?;
                if *descending {
                    f.write_str(" desc")?;
                }
                Ok(())
            }
            Self::FilterBy { field, value } => write!(f, "filter {field} = {value}"),
            Self::Where(predicate) => write!(f, "where {predicate}"),
            Self::Preload { path, options } if options.is_empty() => write!(f, "preload {path}"),
            Self::Preload { path, options } => {
                write!(f, "preload {path} (")?;
                for (i, option) in options.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{option}")?;
                }
                f.write_str(")")
            }
            Self::PreloadAll => f.write_str("preload *"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Canonical field name.
    pub field: String,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreloadSpec {
    pub path: String,
    pub options: Vec<QueryOption>,
}

/// The composed query context for one read.
///
/// Field names are canonical (resolved against the schema). Names that match
/// no field keep their normalized spelling and are rejected by the backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPlan {
    pub page: Option<Page>,
    pub order: Vec<Order>,
    pub conditions: Vec<Predicate>,
    pub preloads: Vec<PreloadSpec>,
    pub preload_all: bool,
}

impl QueryPlan {
    #[must_use]
    pub fn compose(schema: &ModelSchema, options: &[QueryOption]) -> Self {
        options.iter().fold(Self::default(), |mut plan, option| {
            plan.apply(schema, option);
            plan
        })
    }

    fn apply(&mut self, schema: &ModelSchema, option: &QueryOption) {
        match option {
            QueryOption::Paginate { limit, offset } => {
                self.page = Some(Page {
                    limit: *limit,
                    offset: *offset,
                });
            }
            QueryOption::OrderBy { field, descending } => self.order.push(Order {
                field: schema.resolve(field),
                descending: *descending,
            }),
            QueryOption::FilterBy { field, value } => self.conditions.push(Predicate {
                field: schema.resolve(field),
                op: Operator::Eq,
                value: value.clone(),
            }),
            QueryOption::Where(predicate) => self.conditions.push(Predicate {
                field: schema.resolve(&predicate.field),
                ..predicate.clone()
            }),
            QueryOption::Preload { path, options } => self.preloads.push(PreloadSpec {
                path: path.clone(),
                options: options.clone(),
            }),
            QueryOption::PreloadAll => self.preload_all = true,
        }
    }

    /// Whether any relation is eager-loaded.
    #[must_use]
    pub fn has_preloads(&self) -> bool {
        self.preload_all || !self.preloads.is_empty()
    }
}
