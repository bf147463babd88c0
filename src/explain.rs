//! Plain-text rendering of a pipeline, optionally annotated with the row
//! counts observed while running it.

use crate::pipeline::{ExecutionStats, Pipeline, Stage};

/// Factor above which a stage is flagged as multiplying its input.
const FAN_OUT_RATIO: f64 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct PlanNode {
    pub label: String,
    pub rows: Option<usize>,
    /// Set when a join expanded its input by at least [`FAN_OUT_RATIO`].
    pub fan_out: Option<f64>,
}

/// One node for the root scan followed by one per stage.
pub fn plan_nodes(pipeline: &Pipeline, stats: Option<&ExecutionStats>) -> Vec<PlanNode> {
    let mut nodes = vec![PlanNode {
        label: format!("Scan {}", pipeline.root),
        rows: None,
        fan_out: None,
    }];

    let mut previous: Option<usize> = None;
    for (i, stage) in pipeline.stages.iter().enumerate() {
        let rows = stats.and_then(|s| s.stage_rows.get(i).copied());
        let fan_out = match (stage, previous, rows) {
            (Stage::Flatten { .. }, Some(before), Some(after)) => fan_out(before, after),
            _ => None,
        };
        nodes.push(PlanNode {
            label: stage.to_string(),
            rows,
            fan_out,
        });
        previous = rows;
    }
    nodes
}

fn fan_out(before: usize, after: usize) -> Option<f64> {
    if before == 0 {
        return None;
    }
    let ratio = after as f64 / before as f64;
    (ratio >= FAN_OUT_RATIO).then_some(ratio)
}

/// Render one line per stage, in execution order.
pub fn render_plan(pipeline: &Pipeline, stats: Option<&ExecutionStats>) -> String {
    let mut output = String::new();
    for (depth, node) in plan_nodes(pipeline, stats).iter().enumerate() {
        if depth > 0 {
            output.push_str("  -> ");
        }
        output.push_str(&node.label);
        if let Some(rows) = node.rows {
            output.push_str(&format!("  (rows={rows})"));
        }
        if let Some(ratio) = node.fan_out {
            output.push_str(&format!("  [fan-out x{ratio:.1}]"));
        }
        output.push('\n');
    }
    output
}
