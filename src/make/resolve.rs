//! Depth-first goal resolution.
//!
//! Every source is resolved before the rule that reads it is checked, so
//! jobs are appended in a valid topological order.

use std::collections::HashMap;
use std::sync::Arc;

use camino::Utf8Path;
use tracing::debug;

use super::cycle::cycle_from_stack;
use super::{Job, MakeError, Plan};
use crate::path::BuildPath;
use crate::rule::{DataBase, Rule};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    Visiting,
    Fresh,
    Scheduled,
}

/// Resolve `goals` against `db` into the jobs that must run.
///
/// # Errors
///
/// Returns [`MakeError::NoRule`] for a name with neither a producing rule
/// nor an existing file, [`MakeError::Cycle`] for circular dependencies and
/// [`MakeError::Stat`] when modification times cannot be read.
pub fn plan<S: AsRef<str>>(
    db: &DataBase,
    root: &Utf8Path,
    goals: &[S],
) -> Result<Plan, MakeError> {
    let mut resolver = Resolver {
        db,
        root,
        states: HashMap::new(),
        stack: Vec::new(),
        producers: HashMap::new(),
        jobs: Vec::new(),
    };
    for goal in goals {
        resolver.resolve(goal.as_ref(), None)?;
    }
    debug!(jobs = resolver.jobs.len(), "resolution complete");
    Ok(Plan {
        jobs: resolver.jobs,
    })
}

struct Resolver<'a> {
    db: &'a DataBase,
    root: &'a Utf8Path,
    states: HashMap<String, State>,
    stack: Vec<String>,
    /// Target name to the index of the job producing it.
    producers: HashMap<String, usize>,
    jobs: Vec<Job>,
}

impl Resolver<'_> {
    fn resolve(&mut self, goal: &str, needed_by: Option<&str>) -> Result<(), MakeError> {
        match self.states.get(goal) {
            Some(State::Visiting) => {
                return Err(MakeError::Cycle {
                    cycle: cycle_from_stack(&self.stack, goal),
                });
            }
            Some(State::Fresh | State::Scheduled) => return Ok(()),
            None => {}
        }

        let Some(rule) = self.db.rule_for(goal).cloned() else {
            if BuildPath::from(self.root.join(goal)).can_read() {
                debug!(%goal, "existing file, no rule");
                self.states.insert(goal.to_owned(), State::Fresh);
                return Ok(());
            }
            return Err(MakeError::NoRule {
                goal: goal.to_owned(),
                needed_by: needed_by.map(str::to_owned),
            });
        };

        self.states.insert(goal.to_owned(), State::Visiting);
        self.stack.push(goal.to_owned());
        for source in &rule.sources {
            self.resolve(source, Some(goal))?;
        }
        self.stack.pop();

        let rebuilt = rule
            .sources
            .iter()
            .find(|source| self.states.get(source.as_str()) == Some(&State::Scheduled));
        let stale = if let Some(source) = rebuilt {
            debug!(%goal, %source, "source is rebuilt in this run");
            true
        } else {
            rule.needs_update(self.root)
                .map_err(|source| MakeError::Stat {
                    location: rule.location.clone(),
                    source,
                })?
        };

        if stale {
            self.schedule(goal, &rule);
        } else {
            debug!(%goal, "up to date");
            self.settle(goal, &rule, State::Fresh);
        }
        Ok(())
    }

    fn schedule(&mut self, goal: &str, rule: &Arc<Rule>) {
        let index = self.jobs.len();
        let mut deps: Vec<usize> = rule
            .sources
            .iter()
            .filter_map(|source| self.producers.get(source).copied())
            .collect();
        deps.sort_unstable();
        deps.dedup();
        debug!(%goal, job = index, ?deps, "scheduled");
        self.jobs.push(Job {
            rule: Arc::clone(rule),
            deps,
        });
        for target in self.owned_targets(goal, rule) {
            self.producers.insert(target.clone(), index);
        }
        self.settle(goal, rule, State::Scheduled);
    }

    /// Mark every target `rule` still produces. Targets since claimed by a
    /// later registration keep their own state.
    fn settle(&mut self, goal: &str, rule: &Arc<Rule>, state: State) {
        for target in self.owned_targets(goal, rule) {
            self.states.insert(target, state);
        }
    }

    fn owned_targets(&self, goal: &str, rule: &Arc<Rule>) -> Vec<String> {
        rule.targets
            .iter()
            .filter(|target| {
                target.as_str() == goal
                    || self
                        .db
                        .rule_for(target)
                        .is_some_and(|owner| Arc::ptr_eq(owner, rule))
            })
            .cloned()
            .collect()
    }
}
