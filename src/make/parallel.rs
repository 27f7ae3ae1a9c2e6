//! Bounded worker pool executor.
//!
//! The calling thread owns the scheduling state. Ready job indices go to the
//! workers over one channel; outcomes come back over another. A job becomes
//! ready once every producer it depends on has reported success, so targets
//! are only visible to dependents after their action returned `Ok`.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, PoisonError, mpsc};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{BuildReport, MakeOptions, Plan, Policy, RunContext};
use crate::rule::ActionError;

type Outcome = (usize, Result<(), ActionError>, Duration);

pub(super) fn execute(plan: &Plan, ctx: &RunContext<'_>, options: MakeOptions) -> BuildReport {
    let total = plan.len();
    let workers = options.jobs.min(total).max(1);
    let mut waiting: Vec<usize> = plan.jobs().iter().map(|job| job.deps.len()).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); total];
    for (index, job) in plan.jobs().iter().enumerate() {
        for &dep in &job.deps {
            if let Some(list) = dependents.get_mut(dep) {
                list.push(index);
            }
        }
    }
    let mut ready: VecDeque<usize> = waiting
        .iter()
        .enumerate()
        .filter(|(_, count)| **count == 0)
        .map(|(index, _)| index)
        .collect();
    debug!(workers, total, ready = ready.len(), "starting worker pool");

    let (job_tx, job_rx) = mpsc::channel::<usize>();
    let (done_tx, done_rx) = mpsc::channel::<Outcome>();
    let job_rx = Mutex::new(job_rx);
    let mut report = BuildReport::default();
    let mut launched: HashSet<usize> = HashSet::new();

    thread::scope(|scope| {
        for _ in 0..workers {
            let done_tx = done_tx.clone();
            let job_rx = &job_rx;
            scope.spawn(move || {
                loop {
                    let next = job_rx.lock().unwrap_or_else(PoisonError::into_inner).recv();
                    let Ok(index) = next else { break };
                    let Some(job) = plan.jobs().get(index) else {
                        continue;
                    };
                    let (result, elapsed) = job.run_timed(ctx);
                    if done_tx.send((index, result, elapsed)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(done_tx);

        let mut in_flight = 0usize;
        let mut stopped = false;
        loop {
            while !stopped && let Some(index) = ready.pop_front() {
                let Some(job) = plan.jobs().get(index) else {
                    continue;
                };
                if job_tx.send(index).is_err() {
                    stopped = true;
                    break;
                }
                launched.insert(index);
                in_flight += 1;
                info!(job = %job.label(), "running");
                ctx.monitor.job_started(launched.len(), total, &job.label());
            }
            if in_flight == 0 {
                break;
            }
            let Ok((index, result, elapsed)) = done_rx.recv() else {
                break;
            };
            in_flight -= 1;
            let Some(job) = plan.jobs().get(index) else {
                continue;
            };
            report.record(job, elapsed);
            match result {
                Ok(()) => {
                    report.executed.push(job.label());
                    for &dependent in dependents.get(index).into_iter().flatten() {
                        if let Some(count) = waiting.get_mut(dependent) {
                            *count = count.saturating_sub(1);
                            if *count == 0 {
                                ready.push_back(dependent);
                            }
                        }
                    }
                }
                Err(error) => {
                    report.fail(ctx, job, error);
                    if options.policy == Policy::FailFast {
                        stopped = true;
                    }
                }
            }
        }
        drop(job_tx);
    });

    for (index, job) in plan.jobs().iter().enumerate() {
        if !launched.contains(&index) {
            warn!(job = %job.label(), "skipped");
            report.skipped.push(job.label());
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::make::Job;
    use crate::monitor::{Level, RecordingMonitor};
    use crate::remap::{Location, Remapper};
    use crate::rule::{Action, Rule};
    use crate::stdlib::Stdlib;
    use crate::value::Env;
    use camino::Utf8Path;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Probe {
        running: AtomicUsize,
        peak: AtomicUsize,
        order: Mutex<Vec<String>>,
    }

    fn job(probe: &Arc<Probe>, target: &str, deps: Vec<usize>, fails: bool) -> Job {
        let probe = Arc::clone(probe);
        let name = target.to_owned();
        let action = Action::native(move |_| {
            let now = probe.running.fetch_add(1, Ordering::SeqCst) + 1;
            probe.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(30));
            probe
                .order
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(name.clone());
            probe.running.fetch_sub(1, Ordering::SeqCst);
            if fails {
                anyhow::bail!("{name} failed");
            }
            Ok(())
        });
        Job {
            rule: Arc::new(Rule::new(
                vec![target.to_owned()],
                Vec::new(),
                Location::script("make.maat", 1),
                action,
            )),
            deps,
        }
    }

    fn run(jobs: Vec<Job>, jobs_limit: usize, policy: Policy) -> (BuildReport, RecordingMonitor) {
        let monitor = RecordingMonitor::new();
        let env = Env::default();
        let stdlib = Stdlib::new();
        let remapper = Remapper::default();
        let ctx = RunContext {
            env: &env,
            stdlib: &stdlib,
            root: Utf8Path::new("."),
            monitor: &monitor,
            remapper: &remapper,
        };
        let plan = Plan { jobs };
        let options = MakeOptions {
            jobs: jobs_limit,
            policy,
        };
        (execute(&plan, &ctx, options), monitor)
    }

    #[test]
    fn independent_jobs_overlap_up_to_the_limit() {
        let probe = Arc::new(Probe::default());
        let jobs = (0..4)
            .map(|n| job(&probe, &format!("t{n}"), vec![], false))
            .collect();
        let (report, _) = run(jobs, 2, Policy::FailFast);
        assert_eq!(report.executed.len(), 4);
        assert_eq!(report.timings.len(), 4);
        assert!(report.timings.iter().all(|t| t.elapsed >= Duration::from_millis(30)));
        assert_eq!(probe.peak.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dependents_wait_for_their_producers() {
        let probe = Arc::new(Probe::default());
        let jobs = vec![
            job(&probe, "a", vec![], false),
            job(&probe, "b", vec![], false),
            job(&probe, "prog", vec![0, 1], false),
        ];
        let (report, _) = run(jobs, 4, Policy::FailFast);
        assert!(report.success());
        let order = probe.order.lock().unwrap_or_else(PoisonError::into_inner).clone();
        assert_eq!(order.last().map(String::as_str), Some("prog"));
    }

    #[test]
    fn keep_going_skips_only_dependents() {
        let probe = Arc::new(Probe::default());
        let jobs = vec![
            job(&probe, "bad", vec![], true),
            job(&probe, "after", vec![0], false),
            job(&probe, "other", vec![], false),
        ];
        let (report, monitor) = run(jobs, 2, Policy::KeepGoing);
        assert_eq!(report.executed, vec!["other"]);
        assert_eq!(report.skipped, vec!["after"]);
        assert_eq!(monitor.messages(Level::Error).len(), 1);
    }

    #[test]
    fn fail_fast_starts_nothing_new() {
        let probe = Arc::new(Probe::default());
        let jobs = vec![
            job(&probe, "bad", vec![], true),
            job(&probe, "next", vec![0], false),
            job(&probe, "late", vec![1], false),
        ];
        let (report, _) = run(jobs, 2, Policy::FailFast);
        assert!(report.executed.is_empty());
        assert_eq!(report.skipped, vec!["next", "late"]);
    }
}
