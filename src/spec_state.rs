//! Spec state (C5): the symbol tables and forward-reference machinery
//! built up while parsing one or more hikefiles, and flushed into
//! resolved artifacts/goals before planning begins.
//!
//! Forward references are represented as boxed closures queued in
//! `pending_resolvers` rather than back-pointers stored on artifacts —
//! an artifact never needs to know who referenced it, only that by the
//! time `compile()` runs, every queued resolver has successfully looked
//! up its target by name.

use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use crate::artifact::{Artifact, ArtifactId, ArtifactKey};
use crate::error::{Arise, BuildError, BuildErrorKind, Result};
use crate::location::Location;

pub type Goal = Vec<Rc<Artifact>>;

type Resolver = Box<dyn FnOnce(&mut SpecState) -> Result<()>>;

pub struct SpecState {
    project: String,
    goals: HashMap<String, (Goal, Location)>,
    goal_order: Vec<String>,
    artifacts: HashMap<String, (Rc<Artifact>, Location)>,
    artifact_order: Vec<String>,
    next_artifact_id: ArtifactId,
    strings: HashMap<String, String>,
    ints: HashMap<String, i64>,
    hikefile_stack: Vec<Rc<PathBuf>>,
    pending_resolvers: Vec<Resolver>,
}

impl SpecState {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            goals: HashMap::new(),
            goal_order: Vec::new(),
            artifacts: HashMap::new(),
            artifact_order: Vec::new(),
            next_artifact_id: 0,
            strings: HashMap::new(),
            ints: HashMap::new(),
            hikefile_stack: Vec::new(),
            pending_resolvers: Vec::new(),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn next_artifact_id(&mut self) -> ArtifactId {
        let id = self.next_artifact_id;
        self.next_artifact_id += 1;
        id
    }

    pub fn make_key(&self, name: impl Into<String>) -> ArtifactKey {
        ArtifactKey::new(self.project.clone(), name)
    }

    pub fn push_hikefile(&mut self, path: Rc<PathBuf>) {
        self.hikefile_stack.push(path);
    }

    pub fn pop_hikefile(&mut self) {
        self.hikefile_stack.pop();
    }

    pub fn current_hikefile(&self) -> Option<Rc<PathBuf>> {
        self.hikefile_stack.last().cloned()
    }

    pub fn set_string(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.strings.insert(name.into(), value.into());
    }

    pub fn set_string_default(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.strings.entry(name.into()).or_insert_with(|| value.into());
    }

    pub fn set_int(&mut self, name: impl Into<String>, value: i64) {
        self.ints.insert(name.into(), value);
    }

    pub fn set_int_default(&mut self, name: impl Into<String>, value: i64) {
        self.ints.entry(name.into()).or_insert(value);
    }

    /// Interpolate `${name}` references in `text` against the string
    /// table (including the ambient `${hikefile}`/`${hikefileBase}`
    /// variables tracked by `push_hikefile`/`pop_hikefile`).
    pub fn interpolate_string(&self, text: &str, location: &Location) -> Result<String> {
        let mut out = String::with_capacity(text.len());
        let mut chars = text.char_indices().peekable();
        while let Some((_, c)) = chars.next() {
            if c != '$' {
                out.push(c);
                continue;
            }
            if chars.peek().map(|(_, c)| *c) != Some('{') {
                out.push(c);
                continue;
            }
            chars.next();
            let mut name = String::new();
            let mut closed = false;
            for (_, nc) in chars.by_ref() {
                if nc == '}' {
                    closed = true;
                    break;
                }
                name.push(nc);
            }
            if !closed {
                return Err(BuildError::at(
                    BuildErrorKind::Syntax(format!("unterminated variable reference in '{text}'")),
                    location.clone(),
                ));
            }
            out.push_str(&self.lookup_variable(&name, location)?);
        }
        Ok(out)
    }

    fn lookup_variable(&self, name: &str, location: &Location) -> Result<String> {
        if name == "hikefile" {
            return Ok(self
                .current_hikefile()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default());
        }
        if name == "hikefileBase" {
            return Ok(self
                .current_hikefile()
                .and_then(|p| p.parent().map(|p| p.to_string_lossy().into_owned()))
                .unwrap_or_default());
        }
        if let Some(value) = self.strings.get(name) {
            return Ok(value.clone());
        }
        if let Some(value) = self.ints.get(name) {
            return Ok(value.to_string());
        }
        Err(BuildError::at(BuildErrorKind::Syntax(format!("undefined variable '{name}'")), location.clone()))
    }

    pub fn register_artifact(&mut self, name: String, artifact: Rc<Artifact>, location: Location) -> Result<()> {
        if let Some((_, first)) = self.artifacts.get(&name) {
            return Err(BuildError::at(
                BuildErrorKind::DuplicateArtifact { key: name, first_location: first.clone() },
                location,
            ));
        }
        self.artifact_order.push(name.clone());
        self.artifacts.insert(name, (artifact, location));
        Ok(())
    }

    pub fn register_goal(&mut self, name: String, goal: Goal, location: Location) -> Result<()> {
        if let Some((_, first)) = self.goals.get(&name) {
            return Err(BuildError::at(
                BuildErrorKind::DuplicateGoal { name, first_location: first.clone() },
                location,
            ));
        }
        self.goal_order.push(name.clone());
        self.goals.insert(name, (goal, location));
        Ok(())
    }

    pub fn lookup_artifact(&self, name: &str) -> Option<Rc<Artifact>> {
        self.artifacts.get(name).map(|(a, _)| a.clone())
    }

    pub fn lookup_goal(&self, name: &str) -> Option<&Goal> {
        self.goals.get(name).map(|(g, _)| g)
    }

    pub fn goal_names(&self) -> &[String] {
        &self.goal_order
    }

    pub fn artifact_names(&self) -> &[String] {
        &self.artifact_order
    }

    /// Queue a forward-reference resolver, invoked in registration order
    /// once parsing of the whole spec (including all `include`d
    /// hikefiles) has finished.
    pub fn slate_resolver(&mut self, resolver: Resolver) {
        self.pending_resolvers.push(resolver);
    }

    /// Flatten every registered artifact in registration order, then
    /// flush pending resolvers. Flushing is a repeated drain: resolvers
    /// may themselves slate further resolvers, so each round takes the
    /// current queue, clears it, and runs it; the flush is complete only
    /// once a round leaves the queue empty.
    pub fn compile(&mut self) -> Result<()> {
        for name in self.artifact_order.clone() {
            if let Some((artifact, _)) = self.artifacts.get(&name) {
                artifact.flatten()?;
            }
        }
        loop {
            if self.pending_resolvers.is_empty() {
                return Ok(());
            }
            let resolvers = std::mem::take(&mut self.pending_resolvers);
            for resolver in resolvers {
                resolver(self)?;
            }
        }
    }

    pub fn require_artifact(&self, name: &str, arise: &Arise) -> Result<Rc<Artifact>> {
        self.lookup_artifact(name)
            .ok_or_else(|| BuildError::at(BuildErrorKind::NoSuchArtifact(name.to_string()), arise.location.clone()))
    }

    pub fn require_goal(&self, name: &str, arise: &Arise) -> Result<&Goal> {
        self.lookup_goal(name)
            .ok_or_else(|| BuildError::at(BuildErrorKind::NoSuchGoal(name.to_string()), arise.location.clone()))
    }
}
