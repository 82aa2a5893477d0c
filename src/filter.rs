//! File filters (C10), grounded on the original `hilvlimpl/ffilter.go`:
//! `FileTypeFilter` (directory-vs-file predicate) and `WildcardFileFilter`
//! (basename glob), combined with an AND-semantics `all_accept` the way
//! the original's `AllFileFilters` walks a slice of filters short-circuiting
//! on the first rejection.

use std::path::Path;

use regex::Regex;

use crate::error::{BuildError, BuildErrorKind, Result};
use crate::location::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileTypeWanted {
    Directories,
    Files,
}

#[derive(Debug, Clone)]
pub enum FileFilter {
    FileType(FileTypeWanted),
    Wildcard(String),
    Not(Box<FileFilter>),
    Any(Vec<FileFilter>),
    All(Vec<FileFilter>),
}

impl FileFilter {
    /// `path` is the full walked (or in-archive) path, `root` the tree's
    /// root / archive top used only to derive the basename for wildcard
    /// matching; `is_dir` is the caller's already-known file-type flag
    /// (a real `stat` for filesystem trees, the zip entry's directory
    /// flag for archive members).
    pub fn accepts(&self, path: &Path, root: &Path, is_dir: bool) -> bool {
        match self {
            FileFilter::FileType(FileTypeWanted::Directories) => is_dir,
            FileFilter::FileType(FileTypeWanted::Files) => !is_dir,
            FileFilter::Wildcard(pattern) => {
                let basename = path
                    .strip_prefix(root)
                    .unwrap_or(path)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                glob_match(pattern, &basename)
            }
            FileFilter::Not(inner) => !inner.accepts(path, root, is_dir),
            FileFilter::Any(filters) => filters.iter().any(|f| f.accepts(path, root, is_dir)),
            FileFilter::All(filters) => filters.iter().all(|f| f.accepts(path, root, is_dir)),
        }
    }
}

/// AND-combine every filter in `filters`; an empty slice accepts everything,
/// matching the original's `AllFileFilters` over a nil/empty slice.
pub fn all_accept(path: &Path, root: &Path, is_dir: bool, filters: &[FileFilter]) -> bool {
    filters.iter().all(|f| f.accepts(path, root, is_dir))
}

/// Shell-style glob match (`?`, `*`, `[...]`) against a single basename,
/// mirroring Go's `path/filepath.Match` semantics used by the original
/// `WildcardFileFilter`.
fn glob_match(pattern: &str, name: &str) -> bool {
    match translate_glob(pattern) {
        Ok(re) => re.is_match(name),
        Err(_) => pattern == name,
    }
}

fn translate_glob(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => {
                out.push('[');
                if let Some(&next) = chars.peek() {
                    if next == '!' {
                        out.push('^');
                        chars.next();
                    }
                }
                while let Some(&next) = chars.peek() {
                    chars.next();
                    if next == ']' {
                        break;
                    }
                    out.push(next);
                }
                out.push(']');
            }
            c if "\\.+()|{}^$".contains(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('$');
    Regex::new(&out)
}

/// Compile a user-supplied wildcard or regex source into a `BuildError` on
/// failure, anchored at `location`. Used by code outside this module that
/// needs to validate a pattern eagerly (basename rewrite in Unzip/Zip).
pub fn compile_regex(pattern: &str, location: &Location) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| {
        BuildError::at(
            BuildErrorKind::IllegalRegex { pattern: pattern.to_string(), reason: e.to_string() },
            location.clone(),
        )
    })
}
