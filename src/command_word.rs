//! Command-word expansion algebra (C7), grounded on the original
//! `generic/cmdword.go`: a command line is a sequence of [`CommandWord`]
//! slots. Each slot expands to one or more strings (an artifact word with
//! `merge: false` contributes one string per resolved path; `merge: true`
//! joins them into a single OS-path-list-separated string). The full set
//! of command invocations is the Cartesian product across slots — one
//! invocation per combination, each a full argv with exactly one word
//! chosen per slot in order.

use std::rc::Rc;

use crate::artifact::Artifact;
use crate::error::{Arise, BuildError, BuildErrorKind, Frame, Result};
use crate::planner::Plan;

#[derive(Debug, Clone)]
pub enum CommandWord {
    /// A literal word, contributing exactly one string to every combination.
    Static(String),
    /// Expands to the source artifact's resolved paths.
    Source { artifact: Rc<Artifact>, merge: bool },
    /// Expands to the destination artifact's resolved paths.
    Destination { artifact: Rc<Artifact>, merge: bool },
    /// Expands to the paths of a named auxiliary artifact — neither the
    /// transform's declared source nor its destination, introduced by the
    /// `aux` keyword. Kept distinct from `Source`/`Destination` so a
    /// `--dump` rendering or transform introspection never mislabels it.
    Artifact { artifact: Rc<Artifact>, merge: bool },
    /// A nested sequence of words concatenated string-wise (its own
    /// internal Cartesian product) to produce this slot's expansions.
    Brace(Vec<CommandWord>),
}

/// Require every artifact referenced by `words` — sources, destinations,
/// and `aux` references alike — so their paths are resolvable before
/// expansion. Kept as a callable distinct from [`assemble`] because the
/// planner needs to *require* these artifacts before it knows whether to
/// *call* the command at all.
pub fn require_aux(words: &[CommandWord], plan: &mut Plan, arise: &Arise) -> Result<()> {
    for word in words {
        match word {
            CommandWord::Static(_) => {}
            CommandWord::Source { artifact, .. }
            | CommandWord::Destination { artifact, .. }
            | CommandWord::Artifact { artifact, .. } => {
                crate::artifact::require(artifact, plan, arise).map_err(|e| {
                    e.with_frame(Frame::Requiring { artifact: artifact.key().unified() })
                })?;
            }
            CommandWord::Brace(inner) => require_aux(inner, plan, arise)?,
        }
    }
    Ok(())
}

/// Expand a single slot into its constituent strings, honoring `merge`
/// for Source/Destination and concatenating Brace's inner Cartesian
/// product into one string per combination.
fn expand_word(word: &CommandWord) -> Result<Vec<String>> {
    match word {
        CommandWord::Static(s) => Ok(vec![s.clone()]),
        CommandWord::Source { artifact, merge }
        | CommandWord::Destination { artifact, merge }
        | CommandWord::Artifact { artifact, merge } => {
            let paths = artifact.path_list()?;
            if *merge {
                Ok(vec![join_path_list(&paths)])
            } else {
                Ok(paths)
            }
        }
        CommandWord::Brace(inner) => {
            let mut combos = vec![String::new()];
            for sub in inner {
                let expansions = expand_word(sub)?;
                let mut next = Vec::with_capacity(combos.len() * expansions.len().max(1));
                for prefix in &combos {
                    for piece in &expansions {
                        next.push(format!("{prefix}{piece}"));
                    }
                }
                combos = next;
            }
            Ok(combos)
        }
    }
}

#[cfg(unix)]
fn join_path_list(paths: &[String]) -> String {
    paths.join(":")
}

#[cfg(not(unix))]
fn join_path_list(paths: &[String]) -> String {
    paths.join(";")
}

/// Assemble every command invocation implied by `words`: the Cartesian
/// product across slots, one full argv per combination, matching the
/// original's `expandCommandLine` + `AssembleCommand`.
pub fn assemble(words: &[CommandWord]) -> Result<Vec<Vec<String>>> {
    let mut lines: Vec<Vec<String>> = vec![Vec::new()];
    for word in words {
        let expansions = expand_word(word)?;
        if expansions.is_empty() {
            return Err(BuildError::new(BuildErrorKind::AssembleCommand(
                "command word expanded to zero arguments".to_string(),
            )));
        }
        let mut next = Vec::with_capacity(lines.len() * expansions.len());
        for prefix in &lines {
            for piece in &expansions {
                let mut line = prefix.clone();
                line.push(piece.clone());
                next.push(line);
            }
        }
        lines = next;
    }
    Ok(lines)
}
