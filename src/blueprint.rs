//! Pipeline composition.
//!
//! A pipeline is described as a [`Step`] tree built with [`task`],
//! [`series`] and [`parallel`], and compiled into a task graph:
//!
//! ```no_run
//! # use kasane::blueprint::{Pipeline, parallel, series, task};
//! # use kasane::task::*;
//! # fn build(env: &kasane::Environment) -> Pipeline {
//! Pipeline::compile(series([
//!     task(Clean::new(env)),
//!     parallel([task(CompileStyles::new(env)), task(BundleScripts::new(env))]),
//!     task(RenderPages::new(env)),
//! ]))
//! # }
//! ```
//!
//! Every member of a stage depends on every tail of the stage before it, so
//! a parallel group acts as a barrier for whatever follows.

use std::fmt::Display;
use std::sync::Arc;

use petgraph::Graph;
use petgraph::graph::NodeIndex;

use crate::task::Task;

/// A node of the composition tree.
#[derive(Clone)]
pub enum Step {
    Task(Arc<dyn Task>),
    /// Children run one after another.
    Series(Vec<Step>),
    /// Children run with no ordering between them.
    Parallel(Vec<Step>),
}

pub fn task(task: impl Task + 'static) -> Step {
    Step::Task(Arc::new(task))
}

pub fn series(steps: impl IntoIterator<Item = Step>) -> Step {
    Step::Series(steps.into_iter().collect())
}

pub fn parallel(steps: impl IntoIterator<Item = Step>) -> Step {
    Step::Parallel(steps.into_iter().collect())
}

/// A compiled task DAG with a single completion point: the run is over when
/// every node has finished.
pub struct Pipeline {
    pub(crate) graph: Graph<Arc<dyn Task>, ()>,
}

impl Pipeline {
    pub fn compile(step: Step) -> Self {
        let mut graph = Graph::new();
        add_step(&mut graph, step, &[]);
        Self { graph }
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Task names in insertion order.
    pub fn task_names(&self) -> Vec<String> {
        self.graph
            .node_indices()
            .map(|index| self.graph[index].name().into_owned())
            .collect()
    }
}

/// Adds `step` after `deps` and returns the nodes that finish it.
fn add_step(
    graph: &mut Graph<Arc<dyn Task>, ()>,
    step: Step,
    deps: &[NodeIndex],
) -> Vec<NodeIndex> {
    match step {
        Step::Task(task) => {
            let index = graph.add_node(task);
            for &dep in deps {
                graph.add_edge(dep, index, ());
            }
            vec![index]
        }
        Step::Series(steps) => {
            let mut tails = deps.to_vec();
            for step in steps {
                tails = add_step(graph, step, &tails);
            }
            tails
        }
        Step::Parallel(steps) => {
            let mut tails = Vec::new();
            for step in steps {
                tails.extend(add_step(graph, step, deps));
            }
            if tails.is_empty() {
                deps.to_vec()
            } else {
                tails
            }
        }
    }
}

impl Display for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "graph LR")?;

        for index in self.graph.node_indices() {
            let name = self.graph[index].name().replace('"', "\\\""); // Simple escape
            writeln!(f, "    {:?}[\"{}\"]", index.index(), name)?;
        }

        for edge in self.graph.raw_edges() {
            writeln!(
                f,
                "    {:?} --> {:?}",
                edge.source().index(),
                edge.target().index()
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::borrow::Cow;

    use petgraph::Direction;

    use super::*;
    use crate::error::TaskError;
    use crate::task::Report;

    pub(crate) struct Named(pub &'static str);

    impl Task for Named {
        fn name(&self) -> Cow<'static, str> {
            Cow::Borrowed(self.0)
        }

        fn run(&self) -> Result<Report, TaskError> {
            Ok(Report::default())
        }
    }

    fn deps(pipeline: &Pipeline, name: &str) -> Vec<String> {
        let graph = &pipeline.graph;
        let index = graph
            .node_indices()
            .find(|&i| graph[i].name() == name)
            .unwrap();

        let mut names: Vec<_> = graph
            .neighbors_directed(index, Direction::Incoming)
            .map(|i| graph[i].name().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_series_with_parallel_barrier() {
        let pipeline = Pipeline::compile(series([
            task(Named("clean")),
            parallel([task(Named("styles")), task(Named("scripts"))]),
            task(Named("pages")),
            task(Named("report")),
        ]));

        assert_eq!(pipeline.len(), 5);
        assert!(deps(&pipeline, "clean").is_empty());
        assert_eq!(deps(&pipeline, "styles"), ["clean"]);
        assert_eq!(deps(&pipeline, "scripts"), ["clean"]);
        assert_eq!(deps(&pipeline, "pages"), ["scripts", "styles"]);
        assert_eq!(deps(&pipeline, "report"), ["pages"]);
    }

    #[test]
    fn test_nested_series_in_parallel() {
        let pipeline = Pipeline::compile(series([
            task(Named("a")),
            parallel([
                series([task(Named("b1")), task(Named("b2"))]),
                task(Named("c")),
            ]),
            task(Named("d")),
        ]));

        assert_eq!(deps(&pipeline, "b1"), ["a"]);
        assert_eq!(deps(&pipeline, "b2"), ["b1"]);
        assert_eq!(deps(&pipeline, "c"), ["a"]);
        assert_eq!(deps(&pipeline, "d"), ["b2", "c"]);
    }

    #[test]
    fn test_empty_groups_are_transparent() {
        let pipeline = Pipeline::compile(series([
            task(Named("a")),
            parallel([]),
            series([]),
            task(Named("b")),
        ]));

        assert_eq!(deps(&pipeline, "b"), ["a"]);
        assert!(Pipeline::compile(series([])).is_empty());
    }

    #[test]
    fn test_mermaid() {
        let pipeline = Pipeline::compile(series([task(Named("a")), task(Named("b"))]));
        assert_eq!(
            pipeline.to_string(),
            "graph LR\n    0[\"a\"]\n    1[\"b\"]\n    0 --> 1\n"
        );
    }
}
