//! Build error model (C1).
//!
//! Every failure that can occur while compiling or executing a hikefile is
//! a [`BuildError`]: a kind-specific payload plus an ordered list of
//! [`Frame`]s describing the spec-level call stack that led to it. Callers
//! push a frame onto an error as it propagates upward; the printer renders
//! the primary message first, then each frame indented underneath.

use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;

use thiserror::Error;

use crate::location::Location;

/// A `(text, source location)` pair attached to a definition in a hikefile,
/// used solely to produce readable error messages ("arising from ... at ...").
#[derive(Debug, Clone)]
pub struct Arise {
    pub text: String,
    pub location: Location,
}

impl Arise {
    pub fn new(text: impl Into<String>, location: Location) -> Self {
        Self { text: text.into(), location }
    }
}

/// One step of the spec-level call stack, pushed onto a [`BuildError`] by
/// whichever layer caught and is re-propagating it.
#[derive(Debug, Clone)]
pub enum Frame {
    Requiring { artifact: String },
    Flattening { artifact: String },
    ApplyingTransform { description: String, arise: Arise },
    Attaining { goal: String, arise: Arise },
    PerformingAction { description: String, arise: Arise },
    ParsingArtifact { location: Location },
}

impl Frame {
    fn print(&self, printer: &mut ErrorPrinter<'_>) {
        match self {
            Frame::Requiring { artifact } => {
                printer.print("requiring artifact ");
                printer.print(artifact);
            }
            Frame::Flattening { artifact } => {
                printer.print("flattening artifact ");
                printer.print(artifact);
            }
            Frame::ApplyingTransform { description, arise } => {
                printer.print("applying transform ");
                printer.print(description);
                printer.print_arise(arise);
            }
            Frame::Attaining { goal, arise } => {
                printer.print("attaining goal ");
                printer.print(goal);
                printer.print_arise(arise);
            }
            Frame::PerformingAction { description, arise } => {
                printer.print("performing action ");
                printer.print(description);
                printer.print_arise(arise);
            }
            Frame::ParsingArtifact { location } => {
                printer.print("parsing file-artifact starting at ");
                printer.print(&location.to_string());
            }
        }
    }
}

/// The kind-specific payload of a [`BuildError`]. Every variant carries
/// enough information to render a human-readable primary message; the
/// source location (when known) is attached separately via
/// [`BuildError::location`] so tooling can render gutter annotations.
#[derive(Error, Debug)]
pub enum BuildErrorKind {
    #[error("no generator for artifact {0}")]
    NoGenerator(String),

    #[error("cannot stat {path}: {source}")]
    CannotStat { path: PathBuf, #[source] source: io::Error },

    #[error("cannot delete file {path}: {source}")]
    CannotDeleteFile { path: PathBuf, #[source] source: io::Error },

    #[error("cannot create directory {path}: {source}")]
    CannotCreateDirectory { path: PathBuf, #[source] source: io::Error },

    #[error("cannot canonicalize path {path}: {source}")]
    CannotCanonicalizePath { path: PathBuf, #[source] source: io::Error },

    #[error("duplicate goal '{name}' (first defined at {first_location})")]
    DuplicateGoal { name: String, first_location: Location },

    #[error("duplicate artifact '{key}' (first defined at {first_location})")]
    DuplicateArtifact { key: String, first_location: Location },

    #[error("no such goal '{0}'")]
    NoSuchGoal(String),

    #[error("no such artifact '{0}'")]
    NoSuchArtifact(String),

    #[error("conflicting destinations: {operation} ({path_count} {kind})")]
    ConflictingDestinations { operation: String, path_count: usize, kind: &'static str },

    #[error("unresolved artifact path for {0}")]
    UnresolvedArtifactPath(String),

    #[error("failed to assemble command: {0}")]
    AssembleCommand(String),

    #[error("command failed with exit code {exit_code}: {argv0}\n{output}")]
    CommandFailed { argv0: String, exit_code: i32, output: String },

    #[error("failed to create zip archive {path}: {reason}")]
    CreateZip { path: PathBuf, reason: String },

    #[error("failed to extract zip archive {archive}: {reason}")]
    ExtractZip { archive: PathBuf, reason: String },

    #[error("failed to copy file {source} to {destination}: {reason}")]
    FileCopyIO { source: PathBuf, destination: PathBuf, reason: String },

    #[error("failed to walk directory {root}: {reason}")]
    FSWalk { root: PathBuf, reason: String },

    #[error("illegal regular expression '{pattern}': {reason}")]
    IllegalRegex { pattern: String, reason: String },

    #[error("illegal integer literal '{0}'")]
    IllegalIntegerLiteral(String),

    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("lexical error: {0}")]
    Lexical(String),
}

/// A build failure with its propagation backtrace.
#[derive(Debug)]
pub struct BuildError {
    pub kind: BuildErrorKind,
    pub location: Option<Location>,
    frames: Vec<Frame>,
}

impl BuildError {
    pub fn new(kind: BuildErrorKind) -> Self {
        Self { kind, location: None, frames: Vec::new() }
    }

    pub fn at(kind: BuildErrorKind, location: Location) -> Self {
        Self { kind, location: Some(location), frames: Vec::new() }
    }

    /// Push a frame describing one more level of propagation, returning
    /// `self` so call sites can chain it onto a `?`-propagated error.
    pub fn with_frame(mut self, frame: Frame) -> Self {
        self.frames.push(frame);
        self
    }

    pub fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// Render the primary message followed by the indented frame
    /// backtrace. Uses an absorbing printer so an I/O failure partway
    /// through writing cannot corrupt the output or panic.
    pub fn print_to(&self, out: &mut dyn Write) -> io::Result<()> {
        let mut printer = ErrorPrinter::new(out);
        printer.println(&self.kind.to_string());
        for frame in &self.frames {
            printer.println("");
            printer.indent(0);
            frame.print(&mut printer);
        }
        printer.done()
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = Vec::new();
        if self.print_to(&mut buf).is_ok() {
            f.write_str(&String::from_utf8_lossy(&buf))
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;

/// A small buffer that absorbs the first I/O error encountered while
/// printing and suppresses all subsequent writes, so that pretty-printing
/// a build error cannot itself fail silently midway through.
pub struct ErrorPrinter<'a> {
    out: &'a mut dyn Write,
    first_error: Option<io::Error>,
    level: u32,
}

impl<'a> ErrorPrinter<'a> {
    pub fn new(out: &'a mut dyn Write) -> Self {
        Self { out, first_error: None, level: 0 }
    }

    pub fn print(&mut self, s: &str) {
        if self.first_error.is_none() {
            if let Err(e) = write!(self.out, "{}", s) {
                self.first_error = Some(e);
            }
        }
    }

    pub fn println(&mut self, s: &str) {
        if self.first_error.is_none() {
            if let Err(e) = writeln!(self.out, "{}", s) {
                self.first_error = Some(e);
            }
        }
    }

    pub fn level(&mut self, level: u32) {
        self.level = level;
    }

    /// Indent by `self.level + extra` four-space steps.
    pub fn indent(&mut self, extra: u32) {
        if self.first_error.is_none() {
            for _ in 0..(self.level + extra) {
                if let Err(e) = write!(self.out, "    ") {
                    self.first_error = Some(e);
                    break;
                }
            }
        }
    }

    fn print_arise(&mut self, arise: &Arise) {
        self.println("");
        self.indent(1);
        self.print("arising from ");
        self.print(&arise.text);
        self.print(" at ");
        let location = arise.location.to_string();
        self.print(&location);
    }

    pub fn done(self) -> io::Result<()> {
        match self.first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
