//! Step model (C4). Steps carry pre-resolved plain data (paths, argv,
//! piece lists) rather than late-bound closures over artifacts: every
//! File/Directory/Group/Split path is fixed once an artifact is
//! constructed (only its mtime changes), and Tree — the one
//! dynamic-membership artifact — is a source-only leaf with no
//! generating transform (see DESIGN.md). Resolving at plan-construction
//! time is therefore behaviorally identical to the original's
//! perform-time resolution and avoids threading `Rc<dyn Fn>` closures
//! through every step.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Arise, BuildError, BuildErrorKind, Frame, Result};

#[derive(Debug, Clone)]
pub struct ZipPieceInput {
    pub source_paths: Vec<PathBuf>,
    pub rebase_from: String,
    pub rebase_to: String,
    pub rename: Option<(regex::Regex, String)>,
}

#[derive(Debug, Clone)]
pub struct UnzipValveInput {
    pub rebase_from: String,
    pub rebase_to: String,
    pub rename: Option<(regex::Regex, String)>,
    pub filters: Vec<crate::filter::FileFilter>,
}

#[derive(Debug, Clone)]
pub enum Step {
    RunCommand { argv: Vec<String>, arise: Arise },
    CopyFile { source: PathBuf, destination: PathBuf, destination_is_dir: bool, arise: Arise },
    DeletePath { path: PathBuf, arise: Arise },
    ZipArchive { archive: PathBuf, pieces: Vec<ZipPieceInput>, arise: Arise },
    UnzipArchive { archive: PathBuf, destination_dir: PathBuf, valves: Vec<UnzipValveInput>, arise: Arise },
    Mkdir { path: PathBuf, arise: Arise },
}

impl Step {
    pub fn simple_descr(&self) -> String {
        match self {
            Step::RunCommand { argv, .. } => argv.join(" "),
            Step::CopyFile { source, destination, .. } => {
                format!("copy {} -> {}", source.display(), destination.display())
            }
            Step::DeletePath { path, .. } => format!("delete {}", path.display()),
            Step::ZipArchive { archive, .. } => format!("zip {}", archive.display()),
            Step::UnzipArchive { archive, .. } => format!("unzip {}", archive.display()),
            Step::Mkdir { path, .. } => format!("mkdir {}", path.display()),
        }
    }

    pub fn arise(&self) -> &Arise {
        match self {
            Step::RunCommand { arise, .. }
            | Step::CopyFile { arise, .. }
            | Step::DeletePath { arise, .. }
            | Step::ZipArchive { arise, .. }
            | Step::UnzipArchive { arise, .. }
            | Step::Mkdir { arise, .. } => arise,
        }
    }

    pub fn perform(&self) -> Result<()> {
        let result = match self {
            Step::RunCommand { argv, .. } => perform_run_command(argv),
            Step::CopyFile { source, destination, destination_is_dir, .. } => {
                crate::copy::copy_file(source, destination, *destination_is_dir)
            }
            Step::DeletePath { path, .. } => perform_delete(path),
            Step::ZipArchive { archive, pieces, .. } => crate::archive::create_zip(archive, pieces),
            Step::UnzipArchive { archive, destination_dir, valves, .. } => {
                crate::archive::extract_zip(archive, destination_dir, valves)
            }
            Step::Mkdir { path, .. } => perform_mkdir(path),
        };
        result.map_err(|e| {
            e.with_frame(Frame::PerformingAction {
                description: self.simple_descr(),
                arise: self.arise().clone(),
            })
        })
    }
}

fn perform_mkdir(path: &Path) -> Result<()> {
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) => Err(BuildError::new(BuildErrorKind::CannotCreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })),
    }
}

fn perform_delete(path: &Path) -> Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(BuildError::new(BuildErrorKind::CannotDeleteFile { path: path.to_path_buf(), source: e }))
        }
    };
    let result = if metadata.is_dir() { fs::remove_dir_all(path) } else { fs::remove_file(path) };
    result.map_err(|e| BuildError::new(BuildErrorKind::CannotDeleteFile { path: path.to_path_buf(), source: e }))
}

fn perform_run_command(argv: &[String]) -> Result<()> {
    let (argv0, args) = argv.split_first().ok_or_else(|| {
        BuildError::new(BuildErrorKind::AssembleCommand("empty command line".to_string()))
    })?;

    tracing::debug!(command = %argv.join(" "), "running command");

    let output = Command::new(argv0).args(args).output().map_err(|e| {
        BuildError::new(BuildErrorKind::CommandFailed {
            argv0: argv0.clone(),
            exit_code: -1,
            output: e.to_string(),
        })
    })?;

    if !output.status.success() {
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        return Err(BuildError::new(BuildErrorKind::CommandFailed {
            argv0: argv0.clone(),
            exit_code: output.status.code().unwrap_or(-1),
            output: combined,
        }));
    }
    Ok(())
}
