//! Pipeline execution.
//!
//! Stages run one after another over an in-memory batch of documents. The
//! dataset is only ever borrowed, so running the same pipeline twice, or
//! several pipelines at once, always produces the same output.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::doc::{match_key, number_value, remove_field, resolve_field, set_field};
use super::error::{PipelineError, PipelineResult};
use super::types::{Accumulator, ExecOptions, Expr, Pipeline, Stage};
use crate::db::Dataset;

/// Row counts observed while running a pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionStats {
    /// Root documents that entered the first join.
    pub root_documents: usize,
    /// Documents remaining after each stage, in stage order.
    pub stage_rows: Vec<usize>,
}

/// Documents produced by a pipeline together with its stats.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub documents: Vec<Value>,
    pub stats: ExecutionStats,
}

impl Pipeline {
    /// Run the pipeline against `dataset`.
    pub fn execute(&self, dataset: &Dataset, options: &ExecOptions) -> PipelineResult<PipelineOutput> {
        let root = dataset.collection(&self.root);
        // A leading limit only ever needs the first `n` root documents.
        let mut current: Vec<Value> = match self.stages.first() {
            Some(Stage::Limit(n)) => root[..(*n).min(root.len())].to_vec(),
            _ => root.to_vec(),
        };
        let mut stats = ExecutionStats {
            root_documents: current.len(),
            stage_rows: Vec::with_capacity(self.stages.len()),
        };
        let mut before_first_join = true;

        for stage in &self.stages {
            if matches!(stage, Stage::Join { .. }) {
                before_first_join = false;
            }
            current = execute_stage(stage, current, dataset, options)?;
            if before_first_join {
                stats.root_documents = current.len();
            }
            debug!(root = %self.root, stage = %stage, rows = current.len(), "stage complete");
            stats.stage_rows.push(current.len());
        }

        Ok(PipelineOutput {
            documents: current,
            stats,
        })
    }
}

fn execute_stage(
    stage: &Stage,
    docs: Vec<Value>,
    dataset: &Dataset,
    options: &ExecOptions,
) -> PipelineResult<Vec<Value>> {
    match stage {
        Stage::Limit(n) => exec_limit(docs, *n),
        Stage::Join {
            from,
            local_field,
            foreign_field,
            as_field,
        } => Ok(exec_join(
            docs,
            dataset.collection(from),
            local_field,
            foreign_field,
            as_field,
        )),
        Stage::Flatten {
            path,
            preserve_unmatched,
        } => Ok(exec_flatten(docs, path, *preserve_unmatched)),
        Stage::AddFields(fields) => exec_add_fields(docs, fields, options),
        Stage::GroupBy { key, accumulators } => exec_group(docs, key, accumulators, options),
        Stage::Project(fields) => exec_project(docs, fields, options),
    }
}

fn exec_limit(docs: Vec<Value>, n: usize) -> PipelineResult<Vec<Value>> {
    if n == 0 {
        return Err(PipelineError::InvalidStage(
            "limit must be positive".to_string(),
        ));
    }
    Ok(docs.into_iter().take(n).collect())
}

/// Hash join: index the foreign collection once, then probe per document.
fn exec_join(
    docs: Vec<Value>,
    foreign: &[Value],
    local_field: &str,
    foreign_field: &str,
    as_field: &str,
) -> Vec<Value> {
    let mut index: HashMap<String, Vec<&Value>> = HashMap::new();
    for candidate in foreign {
        index
            .entry(match_key(resolve_field(candidate, foreign_field)))
            .or_default()
            .push(candidate);
    }

    docs.into_iter()
        .map(|mut doc| {
            let key = match_key(resolve_field(&doc, local_field));
            let matches: Vec<Value> = index
                .get(&key)
                .map(|found| found.iter().map(|v| (*v).clone()).collect())
                .unwrap_or_default();
            set_field(&mut doc, as_field, Value::Array(matches));
            doc
        })
        .collect()
}

fn exec_flatten(docs: Vec<Value>, path: &str, preserve_unmatched: bool) -> Vec<Value> {
    let mut result = Vec::with_capacity(docs.len());
    for mut doc in docs {
        match resolve_field(&doc, path).cloned() {
            Some(Value::Array(items)) if !items.is_empty() => {
                for item in items {
                    let mut expanded = doc.clone();
                    set_field(&mut expanded, path, item);
                    result.push(expanded);
                }
            }
            None | Some(Value::Null) | Some(Value::Array(_)) => {
                if preserve_unmatched {
                    remove_field(&mut doc, path);
                    result.push(doc);
                }
            }
            Some(_) => result.push(doc),
        }
    }
    result
}

fn exec_add_fields(
    docs: Vec<Value>,
    fields: &[(String, Expr)],
    options: &ExecOptions,
) -> PipelineResult<Vec<Value>> {
    docs.into_iter()
        .map(|mut doc| {
            // All expressions see the document as it was before this stage.
            let values = fields
                .iter()
                .map(|(_, expr)| expr.eval(&doc, options.numeric_policy))
                .collect::<PipelineResult<Vec<_>>>()?;
            for ((name, _), value) in fields.iter().zip(values) {
                set_field(&mut doc, name, value);
            }
            Ok(doc)
        })
        .collect()
}

enum AccumulatorState {
    Sum(f64),
    Avg { sum: f64, count: u64 },
}

impl AccumulatorState {
    fn new(acc: &Accumulator) -> Self {
        match acc {
            Accumulator::Sum(_) => AccumulatorState::Sum(0.0),
            Accumulator::Avg(_) => AccumulatorState::Avg { sum: 0.0, count: 0 },
        }
    }

    fn add(&mut self, value: &Value) {
        let Some(n) = value.as_f64() else {
            return;
        };
        match self {
            AccumulatorState::Sum(total) => *total += n,
            AccumulatorState::Avg { sum, count } => {
                *sum += n;
                *count += 1;
            }
        }
    }

    fn finish(self) -> Value {
        match self {
            AccumulatorState::Sum(total) => {
                if !total.is_finite() {
                    warn!(total, "sum overflowed, reported as null");
                }
                number_value(total)
            }
            AccumulatorState::Avg { count: 0, .. } => Value::Null,
            AccumulatorState::Avg { sum, count } => {
                if !sum.is_finite() {
                    warn!(sum, count, "average overflowed, reported as null");
                }
                number_value(sum / count as f64)
            }
        }
    }
}

struct Group {
    key: Map<String, Value>,
    states: Vec<AccumulatorState>,
}

fn exec_group(
    docs: Vec<Value>,
    key: &[(String, Expr)],
    accumulators: &[(String, Accumulator)],
    options: &ExecOptions,
) -> PipelineResult<Vec<Value>> {
    let policy = options.numeric_policy;
    let mut groups: Vec<Group> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for doc in &docs {
        let mut key_doc = Map::new();
        let mut identity = Vec::with_capacity(key.len());
        for (name, expr) in key {
            let value = expr.eval(doc, policy)?;
            identity.push(match_key(Some(&value)));
            if !value.is_null() {
                key_doc.insert(name.clone(), value);
            }
        }

        let position = *positions.entry(identity.join("\u{1f}")).or_insert_with(|| {
            groups.push(Group {
                key: key_doc,
                states: accumulators
                    .iter()
                    .map(|(_, acc)| AccumulatorState::new(acc))
                    .collect(),
            });
            groups.len() - 1
        });

        let group = &mut groups[position];
        for ((_, acc), state) in accumulators.iter().zip(group.states.iter_mut()) {
            let value = match acc {
                Accumulator::Sum(expr) | Accumulator::Avg(expr) => expr.eval(doc, policy)?,
            };
            state.add(&value);
        }
    }

    Ok(groups
        .into_iter()
        .map(|group| {
            let mut out = Map::new();
            out.insert("_id".to_string(), Value::Object(group.key));
            for ((name, _), state) in accumulators.iter().zip(group.states) {
                out.insert(name.clone(), state.finish());
            }
            Value::Object(out)
        })
        .collect())
}

fn exec_project(
    docs: Vec<Value>,
    fields: &[(String, Expr)],
    options: &ExecOptions,
) -> PipelineResult<Vec<Value>> {
    docs.iter()
        .map(|doc| {
            let mut out = Map::new();
            for (name, expr) in fields {
                out.insert(name.clone(), expr.eval(doc, options.numeric_policy)?);
            }
            Ok(Value::Object(out))
        })
        .collect()
}
