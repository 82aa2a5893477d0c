//! `hike`: a declarative build tool. A hikefile declares artifacts (files,
//! directories, and composites of them) and the transforms that produce
//! them; `hike` compiles that declaration into a minimal, dependency-ordered
//! plan and executes only the steps a goal's artifacts actually need.

pub mod archive;
pub mod artifact;
pub mod command_word;
pub mod config;
pub mod copy;
pub mod error;
pub mod filter;
pub mod lexer;
pub mod location;
pub mod parser;
pub mod planner;
pub mod spec_state;
pub mod step;
pub mod transform;

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use error::{Arise, BuildError, BuildErrorKind, Frame, Result};
use location::Location;
use planner::Plan;
use spec_state::SpecState;

/// Parse `hikefile_path` (and anything it `include`s) into a fresh
/// [`SpecState`] for `project_name`, then flatten every artifact and
/// flush every slated resolver via [`SpecState::compile`].
pub fn load_spec(hikefile_path: &Path, project_name: &str) -> Result<SpecState> {
    let mut state = SpecState::new(project_name);
    let canonical = fs::canonicalize(hikefile_path).map_err(|e| {
        BuildError::new(BuildErrorKind::CannotCanonicalizePath { path: hikefile_path.to_path_buf(), source: e })
    })?;
    let source = fs::read_to_string(&canonical).map_err(|e| {
        BuildError::new(BuildErrorKind::CannotStat { path: canonical.clone(), source: e })
    })?;
    let top_dir = canonical.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));

    tracing::debug!(hikefile = %canonical.display(), "parsing top-level hikefile");
    parser::parse_into(&source, Rc::new(canonical), &mut state, top_dir)?;

    state.compile()?;
    Ok(state)
}

/// Produce a [`Plan`] that brings every artifact in `goal_name` up to date.
pub fn plan_goal(state: &SpecState, goal_name: &str) -> Result<Plan> {
    let location = Location::new(Rc::new(PathBuf::from("<cli>")), 0, 0);
    let arise = Arise::new(format!("goal '{goal_name}'"), location.clone());
    let goal = state.require_goal(goal_name, &arise)?;

    let mut plan = Plan::new();
    for artifact in goal {
        artifact::require(artifact, &mut plan, &arise).map_err(|e| {
            e.with_frame(Frame::Attaining { goal: goal_name.to_string(), arise: arise.clone() })
        })?;
    }
    tracing::info!(goal = goal_name, steps = plan.step_count(), "plan built");
    Ok(plan)
}

/// Execute every step in `plan`, in order.
pub fn execute_plan(plan: &Plan) -> Result<()> {
    for step in plan.steps() {
        tracing::info!(step = %step.simple_descr(), "performing step");
        step.perform()?;
    }
    Ok(())
}
