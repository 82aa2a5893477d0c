//! Artifact model (C2).
//!
//! An [`Artifact`] is a build graph node representing one or more
//! filesystem paths. Artifacts are polymorphic over five variants (File,
//! Directory, Group, Tree, Split) but are never compared by address:
//! identity is carried by the monotonic [`ArtifactId`], because composite
//! forms (`Group`, `Split`) conceptually wrap other artifacts and two
//! instances wrapping the same children must still be distinguishable in
//! the planner's "already up to date" set.

use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::Rc;
use std::time::SystemTime;

use crate::error::{Arise, BuildError, BuildErrorKind, Frame, Result};
use crate::filter::FileFilter;
use crate::planner::Plan;
use crate::transform::Transform;

pub type ArtifactId = u64;

/// A `(project, name)` pair, unique across the specification. Its unified
/// form is `"project::name"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    pub project: String,
    pub name: String,
}

impl ArtifactKey {
    pub fn new(project: impl Into<String>, name: impl Into<String>) -> Self {
        Self { project: project.into(), name: name.into() }
    }

    pub fn unified(&self) -> String {
        format!("{}::{}", self.project, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    File,
    Directory,
}

#[derive(Debug)]
pub struct ArtifactCommon {
    pub key: ArtifactKey,
    pub id: ArtifactId,
    pub display_name: Option<String>,
    pub arise: Arise,
}

#[derive(Debug)]
pub struct PathArtifact {
    pub common: ArtifactCommon,
    pub kind: PathKind,
    pub path: String,
    pub generating_transform: RefCell<Option<Rc<Transform>>>,
}

#[derive(Debug)]
pub struct GroupArtifact {
    pub common: ArtifactCommon,
    /// Filled in by a slated resolver once every artifact in the
    /// hikefile (including ones defined after this group) has been
    /// registered — see `SpecState::slate_resolver`.
    pub children: RefCell<Vec<Rc<Artifact>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeCacheMode {
    NeverCache,
    CachePending,
    CacheFilled,
}

#[derive(Debug, Default)]
struct TreeCache {
    paths: Vec<String>,
    earliest: Option<SystemTime>,
    latest: Option<SystemTime>,
}

#[derive(Debug)]
pub struct TreeArtifact {
    pub common: ArtifactCommon,
    pub root: String,
    pub filters: Vec<FileFilter>,
    mode: Cell<TreeCacheMode>,
    cache: RefCell<TreeCache>,
}

#[derive(Debug)]
pub struct SplitArtifact {
    pub common: ArtifactCommon,
    pub start: Rc<Artifact>,
    pub end: Rc<Artifact>,
    flipped: Cell<bool>,
}

#[derive(Debug)]
pub enum Artifact {
    File(PathArtifact),
    Directory(PathArtifact),
    Group(GroupArtifact),
    Tree(TreeArtifact),
    Split(SplitArtifact),
}

impl Artifact {
    pub fn new_file(
        key: ArtifactKey,
        id: ArtifactId,
        display_name: Option<String>,
        arise: Arise,
        path: String,
    ) -> Self {
        Artifact::File(PathArtifact {
            common: ArtifactCommon { key, id, display_name, arise },
            kind: PathKind::File,
            path,
            generating_transform: RefCell::new(None),
        })
    }

    pub fn new_directory(
        key: ArtifactKey,
        id: ArtifactId,
        display_name: Option<String>,
        arise: Arise,
        path: String,
    ) -> Self {
        Artifact::Directory(PathArtifact {
            common: ArtifactCommon { key, id, display_name, arise },
            kind: PathKind::Directory,
            path,
            generating_transform: RefCell::new(None),
        })
    }

    pub fn new_group(
        key: ArtifactKey,
        id: ArtifactId,
        display_name: Option<String>,
        arise: Arise,
        children: Vec<Rc<Artifact>>,
    ) -> Self {
        Artifact::Group(GroupArtifact {
            common: ArtifactCommon { key, id, display_name, arise },
            children: RefCell::new(children),
        })
    }

    /// Late-bind a group artifact's children, for forward-referenced
    /// members resolved after the whole hikefile has been parsed.
    pub fn set_group_children(&self, new_children: Vec<Rc<Artifact>>) {
        if let Artifact::Group(g) = self {
            *g.children.borrow_mut() = new_children;
        }
    }

    pub fn new_tree(
        key: ArtifactKey,
        id: ArtifactId,
        display_name: Option<String>,
        arise: Arise,
        root: String,
        filters: Vec<FileFilter>,
        no_cache: bool,
    ) -> Self {
        Artifact::Tree(TreeArtifact {
            common: ArtifactCommon { key, id, display_name, arise },
            root,
            filters,
            mode: Cell::new(if no_cache { TreeCacheMode::NeverCache } else { TreeCacheMode::CachePending }),
            cache: RefCell::new(TreeCache::default()),
        })
    }

    pub fn new_split(
        key: ArtifactKey,
        id: ArtifactId,
        display_name: Option<String>,
        arise: Arise,
        start: Rc<Artifact>,
        end: Rc<Artifact>,
    ) -> Self {
        Artifact::Split(SplitArtifact {
            common: ArtifactCommon { key, id, display_name, arise },
            start,
            end,
            flipped: Cell::new(false),
        })
    }

    fn common(&self) -> &ArtifactCommon {
        match self {
            Artifact::File(p) | Artifact::Directory(p) => &p.common,
            Artifact::Group(g) => &g.common,
            Artifact::Tree(t) => &t.common,
            Artifact::Split(s) => &s.common,
        }
    }

    pub fn key(&self) -> &ArtifactKey {
        &self.common().key
    }

    pub fn id(&self) -> ArtifactId {
        self.common().id
    }

    pub fn arise(&self) -> &Arise {
        &self.common().arise
    }

    /// The active child of a [`Split`](Artifact::Split) artifact: the
    /// start-child before the first successful require, the end-child
    /// afterward. Identity for everything else.
    pub fn routed(&self) -> &Artifact {
        match self {
            Artifact::Split(s) => {
                if s.flipped.get() { s.end.routed() } else { s.start.routed() }
            }
            other => other,
        }
    }

    pub fn display_name(&self) -> String {
        if let Some(name) = &self.common().display_name {
            return name.clone();
        }
        match self {
            Artifact::File(p) | Artifact::Directory(p) => p.path.clone(),
            Artifact::Group(g) => g
                .children
                .borrow()
                .first()
                .map(|c| c.display_name())
                .unwrap_or_else(|| self.key().unified()),
            Artifact::Tree(t) => t.root.clone(),
            Artifact::Split(s) => {
                if s.flipped.get() { s.end.display_name() } else { s.start.display_name() }
            }
        }
    }

    /// Attach a generating transform to a File/Directory artifact.
    pub fn set_generating_transform(&self, transform: Rc<Transform>) {
        match self {
            Artifact::File(p) | Artifact::Directory(p) => {
                *p.generating_transform.borrow_mut() = Some(transform);
            }
            _ => {}
        }
    }

    pub fn generating_transform(&self) -> Option<Rc<Transform>> {
        match self {
            Artifact::File(p) | Artifact::Directory(p) => p.generating_transform.borrow().clone(),
            _ => None,
        }
    }

    /// Append this artifact's filesystem paths to `sink`.
    pub fn paths(&self, sink: &mut Vec<String>) -> Result<()> {
        match self {
            Artifact::File(p) | Artifact::Directory(p) => sink.push(p.path.clone()),
            Artifact::Group(g) => {
                for child in g.children.borrow().iter() {
                    child.paths(sink)?;
                }
            }
            Artifact::Tree(t) => {
                t.fill_cache()?;
                sink.extend(t.cache.borrow().paths.iter().cloned());
            }
            Artifact::Split(s) => {
                if s.flipped.get() { s.end.paths(sink)? } else { s.start.paths(sink)? }
            }
        }
        Ok(())
    }

    pub fn path_list(&self) -> Result<Vec<String>> {
        let mut sink = Vec::new();
        self.paths(&mut sink)?;
        Ok(sink)
    }

    /// `(earliest mtime across this artifact's paths, any path missing)`.
    pub fn earliest_mod_time(&self, arise: &Arise) -> Result<(SystemTime, bool)> {
        match self {
            Artifact::File(p) | Artifact::Directory(p) => stat_mod_time(&p.path, arise),
            Artifact::Group(g) => fold_group(&g.children.borrow(), arise, true),
            Artifact::Tree(t) => {
                t.fill_cache()?;
                let cache = t.cache.borrow();
                Ok((cache.earliest.unwrap_or(SystemTime::UNIX_EPOCH), cache.paths.is_empty()))
            }
            Artifact::Split(s) => {
                if s.flipped.get() { s.end.earliest_mod_time(arise) } else { s.start.earliest_mod_time(arise) }
            }
        }
    }

    /// `(latest mtime across this artifact's paths, any path missing)`.
    pub fn latest_mod_time(&self, arise: &Arise) -> Result<(SystemTime, bool)> {
        match self {
            Artifact::File(p) | Artifact::Directory(p) => stat_mod_time(&p.path, arise),
            Artifact::Group(g) => fold_group(&g.children.borrow(), arise, false),
            Artifact::Tree(t) => {
                t.fill_cache()?;
                let cache = t.cache.borrow();
                Ok((cache.latest.unwrap_or(SystemTime::UNIX_EPOCH), cache.paths.is_empty()))
            }
            Artifact::Split(s) => {
                if s.flipped.get() { s.end.latest_mod_time(arise) } else { s.start.latest_mod_time(arise) }
            }
        }
    }

    /// Eagerly resolve internal structure so errors surface before
    /// planning begins. Recurses children-first into composite forms and
    /// attaches a "flattening" frame on error (see DESIGN.md Open Question a).
    pub fn flatten(&self) -> Result<()> {
        match self {
            Artifact::File(_) | Artifact::Directory(_) => Ok(()),
            Artifact::Group(g) => {
                for child in g.children.borrow().iter() {
                    child.flatten().map_err(|e| {
                        e.with_frame(Frame::Flattening { artifact: child.key().unified() })
                    })?;
                }
                Ok(())
            }
            Artifact::Tree(_) => Ok(()),
            Artifact::Split(s) => {
                s.start.flatten().map_err(|e| {
                    e.with_frame(Frame::Flattening { artifact: s.start.key().unified() })
                })?;
                s.end.flatten().map_err(|e| {
                    e.with_frame(Frame::Flattening { artifact: s.end.key().unified() })
                })
            }
        }
    }
}

fn stat_mod_time(path: &str, arise: &Arise) -> Result<(SystemTime, bool)> {
    match std::fs::metadata(path) {
        Ok(meta) => {
            let mtime = meta.modified().map_err(|e| {
                BuildError::at(
                    BuildErrorKind::CannotStat { path: path.into(), source: e },
                    arise.location.clone(),
                )
            })?;
            Ok((mtime, false))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok((SystemTime::UNIX_EPOCH, true)),
        Err(e) => Err(BuildError::at(
            BuildErrorKind::CannotStat { path: path.into(), source: e },
            arise.location.clone(),
        )),
    }
}

fn fold_group(children: &[Rc<Artifact>], arise: &Arise, earliest: bool) -> Result<(SystemTime, bool)> {
    let mut missing = children.is_empty();
    let mut best: Option<SystemTime> = None;
    for child in children {
        let (t, child_missing) = if earliest {
            child.earliest_mod_time(arise)?
        } else {
            child.latest_mod_time(arise)?
        };
        missing = missing || child_missing;
        best = Some(match best {
            None => t,
            Some(cur) => {
                if earliest {
                    cur.min(t)
                } else {
                    cur.max(t)
                }
            }
        });
    }
    Ok((best.unwrap_or(SystemTime::UNIX_EPOCH), missing))
}

impl TreeArtifact {
    fn fill_cache(&self) -> Result<()> {
        if self.mode.get() == TreeCacheMode::CacheFilled {
            return Ok(());
        }
        let mut cache = TreeCache::default();
        let root = Path::new(&self.root);
        for entry in walkdir::WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                BuildError::at(
                    BuildErrorKind::FSWalk { root: root.to_path_buf(), reason: e.to_string() },
                    self.common.arise.location.clone(),
                )
            })?;
            let metadata = entry.metadata().map_err(|e| {
                BuildError::at(
                    BuildErrorKind::FSWalk { root: root.to_path_buf(), reason: e.to_string() },
                    self.common.arise.location.clone(),
                )
            })?;
            if !crate::filter::all_accept(entry.path(), root, metadata.is_dir(), &self.filters) {
                continue;
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            cache.earliest = Some(match cache.earliest {
                None => modified,
                Some(cur) => cur.min(modified),
            });
            cache.latest = Some(match cache.latest {
                None => modified,
                Some(cur) => cur.max(modified),
            });
            cache.paths.push(entry.path().to_string_lossy().into_owned());
        }
        *self.cache.borrow_mut() = cache;
        if self.mode.get() == TreeCacheMode::CachePending {
            self.mode.set(TreeCacheMode::CacheFilled);
        }
        Ok(())
    }
}

/// Require that `artifact` is up to date by the end of `plan`, idempotent
/// per plan (Invariant 6). See spec §4.2 for the full algorithm.
pub fn require(artifact: &Rc<Artifact>, plan: &mut Plan, arise: &Arise) -> Result<()> {
    if plan.already_up_to_date(artifact.id()) {
        return Ok(());
    }
    match artifact.as_ref() {
        Artifact::File(p) | Artifact::Directory(p) => {
            let transform = p.generating_transform.borrow().clone();
            match transform {
                Some(t) => t.plan(plan, arise).map_err(|e| {
                    e.with_frame(Frame::Requiring { artifact: artifact.key().unified() })
                })?,
                None => {
                    let (_, missing) = artifact.earliest_mod_time(arise)?;
                    if missing {
                        return Err(BuildError::at(
                            BuildErrorKind::NoGenerator(artifact.key().unified()),
                            arise.location.clone(),
                        ));
                    }
                }
            }
        }
        Artifact::Group(g) => {
            let children = g.children.borrow().clone();
            for child in &children {
                require(child, plan, arise).map_err(|e| {
                    e.with_frame(Frame::Requiring { artifact: child.key().unified() })
                })?;
            }
        }
        Artifact::Tree(_) => {}
        Artifact::Split(s) => {
            if s.flipped.get() {
                require(&s.end, plan, arise)?;
            } else {
                require(&s.start, plan, arise)?;
                s.flipped.set(true);
            }
        }
    }
    plan.mark_up_to_date(artifact.id());
    Ok(())
}
