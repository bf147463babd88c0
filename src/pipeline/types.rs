//! Pipeline types.
//!
//! A pipeline is plain data: the name of its root collection and an ordered
//! list of [`Stage`]s. Query definitions build pipelines with the builder
//! methods on [`Pipeline`]; the executor in `executor.rs` interprets them.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single pipeline stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Keep the first `n` documents.
    Limit(usize),

    /// Attach every document of `from` whose `foreign_field` equals the
    /// current document's `local_field`, as an array under `as_field`.
    Join {
        from: String,
        local_field: String,
        foreign_field: String,
        as_field: String,
    },

    /// Expand the array at `path` into one document per element.
    Flatten {
        path: String,
        /// Keep documents whose array is empty or missing.
        preserve_unmatched: bool,
    },

    /// Set computed fields on every document.
    AddFields(Vec<(String, Expr)>),

    /// Partition by a compound key and aggregate each partition.
    GroupBy {
        key: Vec<(String, Expr)>,
        accumulators: Vec<(String, Accumulator)>,
    },

    /// Replace each document by the listed computed fields.
    Project(Vec<(String, Expr)>),
}

/// Expressions evaluated against a single document.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Dotted field path.
    Field(String),
    Literal(Value),
    /// Convert to a double; numeric text is parsed.
    ToDouble(Box<Expr>),
    /// Parse a date-like value; unparseable input yields null.
    ToDate(Box<Expr>),
    /// Calendar year (UTC) of a date.
    Year(Box<Expr>),
    /// Calendar month (1-12, UTC) of a date.
    Month(Box<Expr>),
    Multiply(Vec<Expr>),
}

impl Expr {
    pub fn field(path: impl Into<String>) -> Self {
        Expr::Field(path.into())
    }

    pub fn to_double(self) -> Self {
        Expr::ToDouble(Box::new(self))
    }

    pub fn to_date(self) -> Self {
        Expr::ToDate(Box::new(self))
    }

    pub fn year(self) -> Self {
        Expr::Year(Box::new(self))
    }

    pub fn month(self) -> Self {
        Expr::Month(Box::new(self))
    }

    pub fn multiply(operands: Vec<Expr>) -> Self {
        Expr::Multiply(operands)
    }
}

/// Group accumulators.
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    /// Sum of numeric values; null and non-numeric values are skipped.
    Sum(Expr),
    /// Mean of numeric values; null when the group has none.
    Avg(Expr),
}

/// What `ToDouble` does with a value that is not numeric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericPolicy {
    /// Abort the query with `PipelineError::InvalidNumber`.
    #[default]
    Error,
    /// Treat the value as missing.
    Null,
}

/// Execution options shared by every stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecOptions {
    pub numeric_policy: NumericPolicy,
}

/// A query pipeline over one root collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub root: String,
    pub stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            stages: Vec::new(),
        }
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Cap the root collection. `None` leaves it unbounded.
    pub fn limit(self, limit: Option<usize>) -> Self {
        match limit {
            Some(n) => self.stage(Stage::Limit(n)),
            None => self,
        }
    }

    /// Join `from` and flatten the matches into `as_field`.
    ///
    /// With `preserve_unmatched` the join behaves as a left outer join,
    /// otherwise as an inner join.
    pub fn join(
        self,
        from: &str,
        local_field: &str,
        foreign_field: &str,
        as_field: &str,
        preserve_unmatched: bool,
    ) -> Self {
        self.stage(Stage::Join {
            from: from.to_string(),
            local_field: local_field.to_string(),
            foreign_field: foreign_field.to_string(),
            as_field: as_field.to_string(),
        })
        .stage(Stage::Flatten {
            path: as_field.to_string(),
            preserve_unmatched,
        })
    }

    pub fn add_fields(self, fields: Vec<(&str, Expr)>) -> Self {
        self.stage(Stage::AddFields(
            fields
                .into_iter()
                .map(|(name, expr)| (name.to_string(), expr))
                .collect(),
        ))
    }

    pub fn group_by(
        self,
        key: Vec<(&str, Expr)>,
        accumulators: Vec<(&str, Accumulator)>,
    ) -> Self {
        self.stage(Stage::GroupBy {
            key: key
                .into_iter()
                .map(|(name, expr)| (name.to_string(), expr))
                .collect(),
            accumulators: accumulators
                .into_iter()
                .map(|(name, acc)| (name.to_string(), acc))
                .collect(),
        })
    }

    pub fn project(self, fields: Vec<(&str, Expr)>) -> Self {
        self.stage(Stage::Project(
            fields
                .into_iter()
                .map(|(name, expr)| (name.to_string(), expr))
                .collect(),
        ))
    }

    /// Every collection the pipeline reads, root first.
    pub fn collections(&self) -> Vec<&str> {
        let mut names = vec![self.root.as_str()];
        for stage in &self.stages {
            if let Stage::Join { from, .. } = stage {
                if !names.contains(&from.as_str()) {
                    names.push(from.as_str());
                }
            }
        }
        names
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Field(path) => write!(f, "${path}"),
            Expr::Literal(value) => write!(f, "{value}"),
            Expr::ToDouble(inner) => write!(f, "toDouble({inner})"),
            Expr::ToDate(inner) => write!(f, "toDate({inner})"),
            Expr::Year(inner) => write!(f, "year({inner})"),
            Expr::Month(inner) => write!(f, "month({inner})"),
            Expr::Multiply(operands) => {
                let parts: Vec<String> = operands.iter().map(|e| e.to_string()).collect();
                write!(f, "{}", parts.join(" * "))
            }
        }
    }
}

impl fmt::Display for Accumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Accumulator::Sum(expr) => write!(f, "sum({expr})"),
            Accumulator::Avg(expr) => write!(f, "avg({expr})"),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Limit(n) => write!(f, "Limit {n}"),
            Stage::Join {
                from,
                local_field,
                foreign_field,
                as_field,
            } => write!(
                f,
                "Join {from} ON {local_field} = {foreign_field} AS {as_field}"
            ),
            Stage::Flatten {
                path,
                preserve_unmatched,
            } => {
                if *preserve_unmatched {
                    write!(f, "Flatten {path} (preserve unmatched)")
                } else {
                    write!(f, "Flatten {path}")
                }
            }
            Stage::AddFields(fields) => write!(f, "AddFields {}", named_list(fields)),
            Stage::GroupBy { key, accumulators } => write!(
                f,
                "GroupBy {} COMPUTE {}",
                named_list(key),
                named_list(accumulators)
            ),
            Stage::Project(fields) => write!(f, "Project {}", named_list(fields)),
        }
    }
}

fn named_list<T: fmt::Display>(items: &[(String, T)]) -> String {
    items
        .iter()
        .map(|(name, item)| format!("{name}: {item}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_emits_join_and_flatten() {
        let pipeline = Pipeline::new("products").join(
            "sales_order_lines",
            "productID",
            "productID",
            "salesData",
            false,
        );
        assert_eq!(pipeline.stages.len(), 2);
        assert!(matches!(pipeline.stages[0], Stage::Join { .. }));
        assert_eq!(
            pipeline.stages[1],
            Stage::Flatten {
                path: "salesData".to_string(),
                preserve_unmatched: false,
            }
        );
    }

    #[test]
    fn test_limit_none_adds_no_stage() {
        assert!(Pipeline::new("x").limit(None).stages.is_empty());
        assert_eq!(Pipeline::new("x").limit(Some(3)).stages, vec![Stage::Limit(3)]);
    }

    #[test]
    fn test_collections_deduplicated() {
        let pipeline = Pipeline::new("a")
            .join("b", "x", "x", "bs", true)
            .join("a", "y", "y", "as", true)
            .join("b", "z", "z", "bz", true);
        assert_eq!(pipeline.collections(), vec!["a", "b"]);
    }

    #[test]
    fn test_stage_display() {
        let stage = Stage::Flatten {
            path: "orderDetails".to_string(),
            preserve_unmatched: true,
        };
        assert_eq!(stage.to_string(), "Flatten orderDetails (preserve unmatched)");

        let expr = Expr::multiply(vec![
            Expr::field("q").to_double(),
            Expr::field("p").to_double(),
        ]);
        assert_eq!(expr.to_string(), "toDouble($q) * toDouble($p)");
    }

    #[test]
    fn test_numeric_policy_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: NumericPolicy,
        }
        let w: Wrapper = toml::from_str("policy = \"null\"").unwrap();
        assert_eq!(w.policy, NumericPolicy::Null);
    }
}
