//! Parallel build driver over the online sorter
//!
//! The calling thread owns the sorter and hands ready nodes to a rayon pool of
//! `jobs` workers. Workers report back over a channel; a success unblocks the
//! node's dependents, a failure leaves them waiting so they end up blocked.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;

use rayon::ThreadPoolBuilder;
use tracing::{debug, info, warn};

use crate::dependency::graph::NodeKey;
use crate::dependency::sorter::TopologicalSorter;
use crate::error::{Error, Result};

/// Outcome of a scheduled build run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Nodes built successfully, in completion order
    pub built: Vec<NodeKey>,
    /// Nodes whose build function failed, with the error text
    pub failed: Vec<(NodeKey, String)>,
    /// Nodes never released because a prerequisite failed
    pub blocked: Vec<NodeKey>,
}

impl BuildReport {
    /// True when every node was built
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.blocked.is_empty()
    }
}

/// Runs builds in dependency order with bounded parallelism
pub struct BuildScheduler;

impl BuildScheduler {
    /// Build every node of `sorter` with at most `jobs` builds in flight
    ///
    /// A node is handed to `build_fn` only after all of its prerequisites
    /// built successfully.
    pub fn run<F>(mut sorter: TopologicalSorter, jobs: usize, build_fn: F) -> Result<BuildReport>
    where
        F: Fn(&NodeKey) -> anyhow::Result<()> + Sync,
    {
        if jobs == 0 {
            return Err(Error::scheduling("worker pool needs at least one job"));
        }
        sorter.prepare()?;

        let pool = ThreadPoolBuilder::new()
            .num_threads(jobs)
            .thread_name(|i| format!("wheelwright-build-{i}"))
            .build()
            .map_err(|e| Error::scheduling(format!("failed to start worker pool: {e}")))?;

        info!(nodes = sorter.len(), jobs, "starting build run");

        let mut report = BuildReport::default();
        let (tx, rx) = mpsc::channel::<(NodeKey, anyhow::Result<()>)>();
        let build_fn = &build_fn;

        pool.in_place_scope(|scope| -> Result<()> {
            let mut in_flight = 0usize;
            loop {
                for key in sorter.get_available()? {
                    debug!(node = %key, "dispatching build");
                    in_flight += 1;
                    let tx = tx.clone();
                    scope.spawn(move |_| {
                        // Every job must report back, or the loop below waits forever.
                        let result = panic::catch_unwind(AssertUnwindSafe(|| build_fn(&key)))
                            .unwrap_or_else(|_| Err(anyhow::anyhow!("build of {key} panicked")));
                        // The receiver outlives the scope, so the send cannot fail.
                        let _ = tx.send((key, result));
                    });
                }

                if in_flight == 0 {
                    return Ok(());
                }

                let (key, result) = rx
                    .recv()
                    .map_err(|_| Error::scheduling("build workers disconnected"))?;
                in_flight -= 1;

                match result {
                    Ok(()) => {
                        sorter.mark_done(&key)?;
                        report.built.push(key);
                    }
                    Err(e) => {
                        warn!(node = %key, error = %e, "build failed");
                        report.failed.push((key, format!("{e:#}")));
                    }
                }
            }
        })?;

        let failed: Vec<&NodeKey> = report.failed.iter().map(|(k, _)| k).collect();
        report.blocked = sorter
            .unfinished()
            .into_iter()
            .filter(|k| !failed.contains(&k))
            .collect();

        info!(
            built = report.built.len(),
            failed = report.failed.len(),
            blocked = report.blocked.len(),
            "build run finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::graph::DependencyGraph;
    use crate::requirements::{Requirement, RequirementType};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn key(s: &str) -> NodeKey {
        NodeKey::parse(s).unwrap()
    }

    fn sorter_for(edges: &[(Option<&str>, &str)]) -> TopologicalSorter {
        let graph = DependencyGraph::new();
        for (parent, child) in edges {
            let child = key(child);
            let kind = if parent.is_some() {
                RequirementType::Install
            } else {
                RequirementType::TopLevel
            };
            graph
                .add_dependency(
                    parent.map(key).as_ref(),
                    kind,
                    &Requirement::parse(child.name()).unwrap(),
                    child.version(),
                    "",
                    false,
                )
                .unwrap();
        }
        TopologicalSorter::from_graph(&graph).unwrap()
    }

    #[test]
    fn test_builds_in_dependency_order() {
        let sorter = sorter_for(&[
            (None, "app==1"),
            (Some("app==1"), "lib==1"),
            (Some("lib==1"), "base==1"),
            (None, "tool==1"),
        ]);
        let order = Mutex::new(Vec::new());

        let report = BuildScheduler::run(sorter, 3, |k| {
            order.lock().unwrap().push(k.name().to_string());
            Ok(())
        })
        .unwrap();

        assert!(report.is_success());
        assert_eq!(report.built.len(), 4);
        let order = order.into_inner().unwrap();
        let pos = |n: &str| order.iter().position(|x| x == n).unwrap();
        assert!(pos("base") < pos("lib"));
        assert!(pos("lib") < pos("app"));
    }

    #[test]
    fn test_failure_blocks_dependents_only() {
        let sorter = sorter_for(&[
            (None, "app==1"),
            (Some("app==1"), "broken==1"),
            (None, "other==1"),
        ]);

        let report = BuildScheduler::run(sorter, 2, |k| {
            if k.name() == "broken" {
                anyhow::bail!("compiler exploded")
            }
            Ok(())
        })
        .unwrap();

        assert_eq!(report.built, vec![key("other==1")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, key("broken==1"));
        assert!(report.failed[0].1.contains("compiler exploded"));
        assert_eq!(report.blocked, vec![key("app==1")]);
        assert!(!report.is_success());
    }

    #[test]
    fn test_panicking_build_is_reported_as_failure() {
        let sorter = sorter_for(&[
            (None, "app==1"),
            (Some("app==1"), "crashy==1"),
            (None, "other==1"),
        ]);

        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let report = BuildScheduler::run(sorter, 2, |k| {
                if k.name() == "crashy" {
                    panic!("build script crashed");
                }
                Ok(())
            });
            let _ = tx.send(report);
        });

        let report = rx
            .recv_timeout(std::time::Duration::from_secs(10))
            .expect("scheduler did not return")
            .unwrap();
        assert_eq!(report.built, vec![key("other==1")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, key("crashy==1"));
        assert!(report.failed[0].1.contains("panicked"));
        assert_eq!(report.blocked, vec![key("app==1")]);
    }

    #[test]
    fn test_parallelism_is_bounded() {
        let edges: Vec<(Option<&str>, String)> =
            (0..12).map(|i| (None, format!("pkg{i}==1"))).collect();
        let edges: Vec<(Option<&str>, &str)> =
            edges.iter().map(|(p, c)| (*p, c.as_str())).collect();
        let sorter = sorter_for(&edges);

        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let report = BuildScheduler::run(sorter, 2, |_| {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(5));
            active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

        assert_eq!(report.built.len(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_zero_jobs_rejected() {
        let sorter = sorter_for(&[(None, "a==1")]);
        let err = BuildScheduler::run(sorter, 0, |_| Ok(())).unwrap_err();
        assert!(matches!(err, Error::Scheduling { .. }));
    }

    #[test]
    fn test_cycle_is_reported_before_building() {
        let sorter = sorter_for(&[
            (None, "a==1"),
            (Some("a==1"), "b==1"),
            (Some("b==1"), "a==1"),
        ]);
        let calls = AtomicUsize::new(0);
        let err = BuildScheduler::run(sorter, 1, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, Error::Cycle { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
