use std::collections::HashMap;
use std::fmt::Write;

use petgraph::graph::NodeIndex;

use crate::blueprint::Pipeline;
use crate::executor::TaskExecution;

/// Per-task timings and outcomes of one pipeline run.
#[derive(Debug, Default)]
pub struct Diagnostics {
    /// A map of task node indices to their execution metrics.
    pub execution_times: HashMap<NodeIndex, TaskExecution>,
}

impl Diagnostics {
    /// Inputs skipped because of a per-file error, across all tasks.
    pub fn failed(&self) -> usize {
        self.execution_times.values().map(|t| t.report.failed).sum()
    }

    /// Files written, across all tasks.
    pub fn written(&self) -> usize {
        self.execution_times
            .values()
            .map(|t| t.report.written.len())
            .sum()
    }

    /// Renders the task graph as a Mermaid diagram with each task's duration.
    ///
    /// * **Green**: finished cleanly
    /// * **Yellow**: finished, some inputs skipped
    /// * **Grey**: never ran
    pub fn render_mermaid(&self, pipeline: &Pipeline) -> String {
        let mut f = String::new();
        let _ = writeln!(f, "graph LR");

        for index in pipeline.graph.node_indices() {
            let name = pipeline.graph[index].name().replace('"', "\\\"");

            let (label, color) = match self.execution_times.get(&index) {
                Some(exec) if exec.report.failed > 0 => (
                    format!("{:.2?}, {} failed", exec.duration, exec.report.failed),
                    "#FFD700",
                ),
                Some(exec) => (format!("{:.2?}", exec.duration), "#90EE90"),
                None => (String::from("Skipped"), "#D3D3D3"),
            };

            let _ = writeln!(f, "    {:?}[\"{}\\n{}\"]", index.index(), name, label);
            let _ = writeln!(f, "    style {:?} fill:{}", index.index(), color);
        }

        for edge in pipeline.graph.raw_edges() {
            let _ = writeln!(
                f,
                "    {:?} --> {:?}",
                edge.source().index(),
                edge.target().index()
            );
        }

        f
    }
}
