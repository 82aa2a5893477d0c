//! Transform model (C3). A [`Transform`] turns a set of source artifacts
//! into a destination artifact; `plan()` requires the sources, decides
//! whether a rebuild is needed, and — if so — enqueues the matching
//! [`Step`] via the shared planner helpers from C6.

use std::rc::Rc;

use crate::artifact::Artifact;
use crate::command_word::CommandWord;
use crate::error::{Arise, Frame, Result};
use crate::filter::FileFilter;
use crate::planner::{plan_single, Plan};
use crate::step::{Step, UnzipValveInput, ZipPieceInput};

#[derive(Debug)]
pub struct ZipPiece {
    pub sources: Vec<Rc<Artifact>>,
    pub rebase_from: String,
    pub rebase_to: String,
    pub rename: Option<(regex::Regex, String)>,
}

#[derive(Debug)]
pub struct UnzipValve {
    pub rebase_from: String,
    pub rebase_to: String,
    pub rename: Option<(regex::Regex, String)>,
    pub filters: Vec<FileFilter>,
}

#[derive(Debug)]
pub enum Transform {
    /// Produces a single destination from a fixed argv built out of
    /// command words, one invocation total.
    SingleCommand { sources: Vec<Rc<Artifact>>, destination: Rc<Artifact>, words: Vec<CommandWord>, arise: Arise },
    /// N sources, one destination: one invocation per Cartesian
    /// combination of its command words (e.g. a `Source` word without
    /// `merge` whose bound artifact resolves to several paths).
    MultiCommand { sources: Vec<Rc<Artifact>>, destination: Rc<Artifact>, words: Vec<CommandWord>, arise: Arise },
    Copy {
        sources: Vec<Rc<Artifact>>,
        destination: Rc<Artifact>,
        destination_is_dir: bool,
        rebase_from: String,
        arise: Arise,
    },
    Zip { sources: Vec<Rc<Artifact>>, destination: Rc<Artifact>, pieces: Vec<ZipPiece>, arise: Arise },
    Unzip {
        source: Rc<Artifact>,
        destination: Rc<Artifact>,
        valves: Vec<UnzipValve>,
        arise: Arise,
    },
    Mkdir { destination: Rc<Artifact>, arise: Arise },
}

impl Transform {
    pub fn arise(&self) -> &Arise {
        match self {
            Transform::SingleCommand { arise, .. }
            | Transform::MultiCommand { arise, .. }
            | Transform::Copy { arise, .. }
            | Transform::Zip { arise, .. }
            | Transform::Unzip { arise, .. }
            | Transform::Mkdir { arise, .. } => arise,
        }
    }

    pub fn plan(&self, plan: &mut Plan, outer_arise: &Arise) -> Result<()> {
        let arise = self.arise();
        self.plan_inner(plan, arise).map_err(|e| {
            e.with_frame(Frame::ApplyingTransform { description: self.describe(), arise: outer_arise.clone() })
        })
    }

    fn describe(&self) -> String {
        match self {
            Transform::SingleCommand { .. } => "single-command transform".to_string(),
            Transform::MultiCommand { .. } => "multi-command transform".to_string(),
            Transform::Copy { .. } => "copy transform".to_string(),
            Transform::Zip { .. } => "zip transform".to_string(),
            Transform::Unzip { .. } => "unzip transform".to_string(),
            Transform::Mkdir { .. } => "mkdir transform".to_string(),
        }
    }

    fn plan_inner(&self, plan: &mut Plan, arise: &Arise) -> Result<()> {
        match self {
            Transform::SingleCommand { sources, destination, words, .. } => {
                crate::command_word::require_aux(words, plan, arise)?;
                let argvs = crate::command_word::assemble(words)?;
                for argv in argvs {
                    plan_single(
                        sources,
                        destination,
                        Step::RunCommand { argv, arise: arise.clone() },
                        plan,
                        arise,
                    )?;
                }
                Ok(())
            }
            Transform::MultiCommand { sources, destination, words, .. } => {
                crate::command_word::require_aux(words, plan, arise)?;
                let argvs = crate::command_word::assemble(words)?;
                for argv in argvs {
                    plan_single(
                        sources,
                        destination,
                        Step::RunCommand { argv, arise: arise.clone() },
                        plan,
                        arise,
                    )?;
                }
                Ok(())
            }
            Transform::Copy { sources, destination, destination_is_dir, rebase_from, .. } => {
                if crate::planner::needs_rebuild(sources, destination, plan, arise)? {
                    let destination_dir = destination.path_list()?.into_iter().next().map(std::path::PathBuf::from).ok_or_else(|| {
                        crate::error::BuildError::at(
                            crate::error::BuildErrorKind::UnresolvedArtifactPath(destination.key().unified()),
                            arise.location.clone(),
                        )
                    })?;
                    let mut any = false;
                    for source in sources {
                        for source_path in source.path_list()? {
                            let source_path = std::path::PathBuf::from(source_path);
                            let destination_path = if *destination_is_dir {
                                destination_dir.join(crate::copy::rebase_tail(&source_path, rebase_from))
                            } else {
                                destination_dir.clone()
                            };
                            plan.add_step(Step::CopyFile {
                                source: source_path,
                                destination: destination_path,
                                destination_is_dir: false,
                                arise: arise.clone(),
                            });
                            any = true;
                        }
                    }
                    if !any {
                        return Err(crate::error::BuildError::at(
                            crate::error::BuildErrorKind::ConflictingDestinations {
                                operation: "copy".to_string(),
                                path_count: 0,
                                kind: "sources",
                            },
                            arise.location.clone(),
                        ));
                    }
                }
                Ok(())
            }
            Transform::Zip { sources, destination, pieces, .. } => {
                let mut piece_inputs = Vec::with_capacity(pieces.len());
                for piece in pieces {
                    let mut source_paths = Vec::new();
                    for s in &piece.sources {
                        source_paths.extend(s.path_list()?.into_iter().map(std::path::PathBuf::from));
                    }
                    piece_inputs.push(ZipPieceInput {
                        source_paths,
                        rebase_from: piece.rebase_from.clone(),
                        rebase_to: piece.rebase_to.clone(),
                        rename: piece.rename.clone(),
                    });
                }
                let archive_path = destination
                    .path_list()?
                    .into_iter()
                    .next()
                    .map(std::path::PathBuf::from)
                    .ok_or_else(|| {
                        crate::error::BuildError::at(
                            crate::error::BuildErrorKind::UnresolvedArtifactPath(destination.key().unified()),
                            arise.location.clone(),
                        )
                    })?;
                plan_single(
                    sources,
                    destination,
                    Step::ZipArchive { archive: archive_path, pieces: piece_inputs, arise: arise.clone() },
                    plan,
                    arise,
                )
            }
            Transform::Unzip { source, destination, valves, .. } => {
                let archive_path = source
                    .path_list()?
                    .into_iter()
                    .next()
                    .map(std::path::PathBuf::from)
                    .ok_or_else(|| {
                        crate::error::BuildError::at(
                            crate::error::BuildErrorKind::UnresolvedArtifactPath(source.key().unified()),
                            arise.location.clone(),
                        )
                    })?;
                let destination_dir = destination
                    .path_list()?
                    .into_iter()
                    .next()
                    .map(std::path::PathBuf::from)
                    .ok_or_else(|| {
                        crate::error::BuildError::at(
                            crate::error::BuildErrorKind::UnresolvedArtifactPath(destination.key().unified()),
                            arise.location.clone(),
                        )
                    })?;
                let valve_inputs = valves
                    .iter()
                    .map(|v| UnzipValveInput {
                        rebase_from: v.rebase_from.clone(),
                        rebase_to: v.rebase_to.clone(),
                        rename: v.rename.clone(),
                        filters: v.filters.clone(),
                    })
                    .collect();
                let sources = std::slice::from_ref(source);
                plan_single(
                    sources,
                    destination,
                    Step::UnzipArchive { archive: archive_path, destination_dir, valves: valve_inputs, arise: arise.clone() },
                    plan,
                    arise,
                )
            }
            Transform::Mkdir { destination, .. } => {
                let path = destination
                    .path_list()?
                    .into_iter()
                    .next()
                    .map(std::path::PathBuf::from)
                    .ok_or_else(|| {
                        crate::error::BuildError::at(
                            crate::error::BuildErrorKind::UnresolvedArtifactPath(destination.key().unified()),
                            arise.location.clone(),
                        )
                    })?;
                // Directory existence decides rebuild, not mtime: an
                // already-present directory is up to date regardless of age.
                if !path.exists() {
                    plan.add_step(Step::Mkdir { path, arise: arise.clone() });
                }
                Ok(())
            }
        }
    }
}

