//! Planner (C6): turns `require()` calls into an ordered [`Plan`] of
//! [`Step`]s, deciding per-transform whether a rebuild is needed from
//! mtime comparisons alone (Invariant: strict `>`, missing destination
//! always rebuilds, equal mtimes never trigger a rebuild — see
//! DESIGN.md Open Question b).

use std::collections::HashSet;
use std::rc::Rc;
use std::time::SystemTime;

use crate::artifact::{Artifact, ArtifactId};
use crate::error::{Arise, Result};
use crate::step::Step;

#[derive(Debug, Default)]
pub struct Plan {
    steps: Vec<Step>,
    seen: HashSet<ArtifactId>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_step(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn already_up_to_date(&self, id: ArtifactId) -> bool {
        self.seen.contains(&id)
    }

    pub fn mark_up_to_date(&mut self, id: ArtifactId) {
        self.seen.insert(id);
    }
}

/// Require every source and decide whether `destination` needs a
/// rebuild: a source itself needed rebuilding (the plan's step count
/// changed), the destination is missing, or the destination is older
/// than the newest source. Exposed separately from [`plan_single`] for
/// transforms (like Copy) that fan one decision out into several steps.
pub fn needs_rebuild(sources: &[Rc<Artifact>], destination: &Rc<Artifact>, plan: &mut Plan, arise: &Arise) -> Result<bool> {
    let before = plan.step_count();
    for source in sources {
        crate::artifact::require(source, plan, arise)?;
    }
    let rebuilt_source = plan.step_count() != before;

    let (dest_time, dest_missing) = destination.earliest_mod_time(arise)?;
    Ok(rebuilt_source || dest_missing || newest_source_after(sources, dest_time, arise)?)
}

/// Plan a transform with a single destination artifact: require every
/// source, then enqueue `step` only if the step count changed (a source
/// needed rebuilding) or the destination is missing or older than the
/// newest source.
pub fn plan_single(
    sources: &[Rc<Artifact>],
    destination: &Rc<Artifact>,
    step: Step,
    plan: &mut Plan,
    arise: &Arise,
) -> Result<()> {
    if needs_rebuild(sources, destination, plan, arise)? {
        plan.add_step(step);
    }
    Ok(())
}

fn newest_source_after(sources: &[Rc<Artifact>], dest_time: SystemTime, arise: &Arise) -> Result<bool> {
    for source in sources {
        let (source_time, source_missing) = source.latest_mod_time(arise)?;
        if !source_missing && source_time > dest_time {
            return Ok(true);
        }
    }
    Ok(false)
}
