mod diagnostics;

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::mpsc::channel;
use std::time::{Duration, Instant};

use petgraph::Direction;
use petgraph::Graph;
use petgraph::graph::NodeIndex;
use rayon::{Scope, ThreadPool};
use tracing::{Level, Span, debug};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::blueprint::Pipeline;
use crate::error::{BuildError, TaskError};
use crate::task::{Report, Task};
use crate::utils::{get_style_main, get_style_task};

pub use diagnostics::Diagnostics;

#[derive(Debug, Clone)]
pub struct TaskExecution {
    pub start: Instant,
    pub duration: Duration,
    pub report: Report,
}

/// Executes the pipeline on the global rayon pool. Tasks start as soon as
/// all of their dependencies have finished.
///
/// The algorithm works as follows:
/// 1. Every node with no dependencies is spawned.
/// 2. The calling thread waits on a result channel.
/// 3. When a task completes, the dependency counts of the tasks that depend
///    on it are decremented, and those reaching zero are spawned.
/// 4. A task error stops all further spawning. Tasks already in flight are
///    awaited, then the first error is returned.
///
/// Panics inside a task are caught and reported as [`TaskError::Panicked`].
///
/// The wait happens on the calling thread rather than on a pool worker, so a
/// pool with a single thread still makes progress. Calling this from inside
/// a task of the same pool is not supported.
pub fn run_pipeline(pipeline: &Pipeline) -> Result<Diagnostics, BuildError> {
    execute(pipeline, None)
}

/// Like [`run_pipeline`], but spawns the tasks on `pool`.
pub fn run_pipeline_on(pool: &ThreadPool, pipeline: &Pipeline) -> Result<Diagnostics, BuildError> {
    execute(pipeline, Some(pool))
}

fn execute(pipeline: &Pipeline, pool: Option<&ThreadPool>) -> Result<Diagnostics, BuildError> {
    let graph = &pipeline.graph;

    if let Err(cycle) = petgraph::algo::toposort(graph, None) {
        return Err(BuildError::Cycle(graph[cycle.node_id()].name().into_owned()));
    }

    let total_tasks = graph.node_count() as u64;
    if total_tasks == 0 {
        return Ok(Diagnostics::default());
    }

    let root_span = tracing::span!(Level::INFO, "running_tasks");
    root_span.pb_set_length(total_tasks);
    if let Ok(style) = get_style_main() {
        root_span.pb_set_style(&style);
    }
    root_span.pb_set_message("Running tasks...");
    let _enter = root_span.enter();

    let mut state = Schedule::new(graph, &root_span);

    let failure = match pool {
        Some(pool) => pool.in_place_scope(|s| state.drive(s)),
        None => rayon::in_place_scope(|s| state.drive(s)),
    };

    match failure {
        Some(e) => Err(e),
        None => Ok(Diagnostics {
            execution_times: state.execution_times,
        }),
    }
}

type Outcome = (NodeIndex, Result<Report, TaskError>, Instant, Duration);

/// Bookkeeping for one pipeline run.
struct Schedule<'a> {
    graph: &'a Graph<Arc<dyn Task>, ()>,
    root_span: &'a Span,
    dependents: HashMap<NodeIndex, Vec<NodeIndex>>,
    dependency_counts: HashMap<NodeIndex, usize>,
    execution_times: HashMap<NodeIndex, TaskExecution>,
}

impl<'a> Schedule<'a> {
    fn new(graph: &'a Graph<Arc<dyn Task>, ()>, root_span: &'a Span) -> Self {
        let mut dependents: HashMap<NodeIndex, Vec<NodeIndex>> = HashMap::new();
        for edge in graph.raw_edges() {
            dependents
                .entry(edge.source())
                .or_default()
                .push(edge.target());
        }

        let dependency_counts = graph
            .node_indices()
            .map(|i| (i, graph.neighbors_directed(i, Direction::Incoming).count()))
            .collect();

        Self {
            graph,
            root_span,
            dependents,
            dependency_counts,
            execution_times: HashMap::new(),
        }
    }

    /// Spawns ready tasks into `s` and collects their results until nothing
    /// is left in flight. Returns the first fatal error.
    fn drive<'scope>(&mut self, s: &Scope<'scope>) -> Option<BuildError> {
        let (result_sender, result_receiver) = channel::<Outcome>();

        // regular task style with no progress
        let pb_style = get_style_task().ok();

        let graph = self.graph;

        let spawn_task = |index: NodeIndex| {
            let task = graph[index].clone();
            let sender = result_sender.clone();
            let pb_style = pb_style.clone();

            s.spawn(move |_| {
                let span = tracing::span!(Level::INFO, "task", name = %task.name());
                if let Some(style) = &pb_style {
                    span.pb_set_style(style);
                }
                span.pb_set_message(&format!("Running {}", task.name()));
                let _enter = span.enter();

                let start_time = Instant::now();

                let result = match catch_unwind(AssertUnwindSafe(|| task.run())) {
                    Ok(result) => result,
                    Err(panic) => {
                        let msg = if let Some(s) = panic.downcast_ref::<&str>() {
                            s.to_string()
                        } else if let Some(s) = panic.downcast_ref::<String>() {
                            s.clone()
                        } else {
                            String::from("unknown payload")
                        };

                        Err(TaskError::Panicked(msg))
                    }
                };

                let elapsed = start_time.elapsed();

                // The receiver outlives every spawned task.
                let _ = sender.send((index, result, start_time, elapsed));
            });
        };

        let mut in_flight = 0;
        for index in graph.node_indices() {
            if self.dependency_counts[&index] == 0 {
                spawn_task(index);
                in_flight += 1;
            }
        }

        let mut failure = None;

        while in_flight > 0 {
            let Ok((index, result, start, duration)) = result_receiver.recv() else {
                break;
            };
            in_flight -= 1;
            self.root_span.pb_inc(1);

            let report = match result {
                Ok(report) => report,
                Err(e) => {
                    let name = graph[index].name();
                    debug!("task {name} failed, draining {in_flight} running");
                    failure.get_or_insert(BuildError::Task(name.into_owned(), e));
                    continue;
                }
            };

            self.execution_times.insert(
                index,
                TaskExecution {
                    start,
                    duration,
                    report,
                },
            );

            if failure.is_some() {
                continue;
            }

            if let Some(next) = self.dependents.get(&index) {
                for &index in next {
                    if let Some(count) = self.dependency_counts.get_mut(&index) {
                        *count -= 1;
                        if *count == 0 {
                            spawn_task(index);
                            in_flight += 1;
                        }
                    }
                }
            }
        }

        failure
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;
    use std::sync::{Arc, Mutex};
    use std::thread;

    use super::*;
    use crate::blueprint::{parallel, series, task};
    use crate::task::Task;

    type Log = Arc<Mutex<Vec<String>>>;

    enum Behaviour {
        Ok,
        Fail,
        Panic,
        Skip,
    }

    struct Fake {
        name: &'static str,
        log: Log,
        behaviour: Behaviour,
    }

    fn fake(name: &'static str, log: &Log, behaviour: Behaviour) -> Fake {
        Fake {
            name,
            log: log.clone(),
            behaviour,
        }
    }

    impl Task for Fake {
        fn name(&self) -> Cow<'static, str> {
            Cow::Borrowed(self.name)
        }

        fn run(&self) -> Result<Report, TaskError> {
            self.log.lock().unwrap().push(format!("start {}", self.name));
            thread::sleep(Duration::from_millis(20));
            self.log.lock().unwrap().push(format!("end {}", self.name));

            match self.behaviour {
                Behaviour::Ok => Ok(Report::default()),
                Behaviour::Skip => Ok(Report {
                    written: vec![],
                    failed: 1,
                }),
                Behaviour::Fail => Err(TaskError::io("out/index.html")(std::io::Error::other(
                    "disk full",
                ))),
                Behaviour::Panic => panic!("boom"),
            }
        }
    }

    fn position(log: &[String], entry: &str) -> usize {
        log.iter().position(|e| e == entry).unwrap()
    }

    #[test]
    fn test_barrier_between_stages() {
        let log = Log::default();
        let pipeline = Pipeline::compile(series([
            task(fake("clean", &log, Behaviour::Ok)),
            parallel([
                task(fake("styles", &log, Behaviour::Ok)),
                task(fake("scripts", &log, Behaviour::Skip)),
            ]),
            task(fake("pages", &log, Behaviour::Ok)),
        ]));

        let diagnostics = run_pipeline(&pipeline).unwrap();
        assert_eq!(diagnostics.execution_times.len(), 4);
        assert_eq!(diagnostics.failed(), 1);

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 8);
        assert!(position(&log, "end clean") < position(&log, "start styles"));
        assert!(position(&log, "end clean") < position(&log, "start scripts"));
        assert!(position(&log, "end styles") < position(&log, "start pages"));
        assert!(position(&log, "end scripts") < position(&log, "start pages"));
    }

    #[test]
    fn test_error_stops_pipeline() {
        let log = Log::default();
        let pipeline = Pipeline::compile(series([
            task(fake("clean", &log, Behaviour::Fail)),
            task(fake("pages", &log, Behaviour::Ok)),
        ]));

        match run_pipeline(&pipeline) {
            Err(BuildError::Task(name, TaskError::Io { path, .. })) => {
                assert_eq!(name, "clean");
                assert_eq!(path, "out/index.html");
            }
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(*log.lock().unwrap(), ["start clean", "end clean"]);
    }

    #[test]
    fn test_error_waits_for_siblings() {
        let log = Log::default();
        let pipeline = Pipeline::compile(series([
            parallel([
                task(fake("styles", &log, Behaviour::Fail)),
                task(fake("scripts", &log, Behaviour::Ok)),
            ]),
            task(fake("pages", &log, Behaviour::Ok)),
        ]));

        assert!(run_pipeline(&pipeline).is_err());

        let log = log.lock().unwrap();
        assert!(log.contains(&"end scripts".to_string()));
        assert!(!log.contains(&"start pages".to_string()));
    }

    #[test]
    fn test_panic_is_reported() {
        let log = Log::default();
        let pipeline = Pipeline::compile(task(fake("boom", &log, Behaviour::Panic)));

        match run_pipeline(&pipeline) {
            Err(BuildError::Task(name, TaskError::Panicked(msg))) => {
                assert_eq!(name, "boom");
                assert_eq!(msg, "boom");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_single_thread_pool() {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(1)
            .build()
            .unwrap();

        let log = Log::default();
        let pipeline = Pipeline::compile(series([
            task(fake("clean", &log, Behaviour::Ok)),
            parallel([
                task(fake("styles", &log, Behaviour::Ok)),
                task(fake("scripts", &log, Behaviour::Ok)),
            ]),
            task(fake("pages", &log, Behaviour::Ok)),
        ]));

        let (tx, rx) = std::sync::mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(run_pipeline_on(&pool, &pipeline).map(|d| d.execution_times.len()));
        });

        let finished = rx.recv_timeout(Duration::from_secs(20)).expect("pipeline stalled");
        assert_eq!(finished.unwrap(), 4);
        assert_eq!(log.lock().unwrap().len(), 8);
    }

    #[test]
    fn test_empty_pipeline() {
        let diagnostics = run_pipeline(&Pipeline::compile(series([]))).unwrap();
        assert!(diagnostics.execution_times.is_empty());
    }
}
