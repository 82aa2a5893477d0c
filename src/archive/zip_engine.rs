use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::ZipArchive;

use crate::error::{BuildError, BuildErrorKind, Result};
use crate::filter::all_accept;
use crate::step::{UnzipValveInput, ZipPieceInput};

/// Rename a rebased tail's basename via the piece/valve's optional regex,
/// leaving the enclosing directory portion untouched.
fn apply_rename(tail: &Path, rename: &Option<(regex::Regex, String)>) -> PathBuf {
    let Some((re, replacement)) = rename else {
        return tail.to_path_buf();
    };
    let parent = tail.parent().map(Path::to_path_buf).unwrap_or_default();
    let basename = tail.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let renamed = re.replace(&basename, replacement.as_str()).into_owned();
    parent.join(renamed)
}

fn in_archive_name(path: &Path, rebase_from: &str, rebase_to: &str, rename: &Option<(regex::Regex, String)>) -> String {
    let tail = crate::copy::rebase_tail(path, rebase_from);
    let renamed = apply_rename(&tail, rename);
    let combined = Path::new(rebase_to).join(renamed);
    combined.to_string_lossy().replace('\\', "/")
}

/// Create a zip archive from a set of pieces, each grouping source paths
/// under a shared rebase/rename rule. Directory entries are created
/// lazily, the first time a path underneath them is written, matching the
/// original extraction side's lazy-directory-creation idiom applied here
/// to the creation direction. Any failure removes the partially-written
/// archive file.
pub fn create_zip(archive_path: &Path, pieces: &[ZipPieceInput]) -> Result<()> {
    let result = create_zip_inner(archive_path, pieces);
    if result.is_err() {
        let _ = fs::remove_file(archive_path);
    }
    result
}

fn create_zip_inner(archive_path: &Path, pieces: &[ZipPieceInput]) -> Result<()> {
    if let Some(parent) = archive_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            BuildError::new(BuildErrorKind::CannotCreateDirectory { path: parent.to_path_buf(), source: e })
        })?;
    }
    let file = File::create(archive_path).map_err(|e| {
        BuildError::new(BuildErrorKind::CreateZip { path: archive_path.to_path_buf(), reason: e.to_string() })
    })?;
    let mut writer = zip::ZipWriter::new(file);
    let mut written_dirs: HashSet<String> = HashSet::new();
    let file_options = SimpleFileOptions::default().unix_permissions(0o644);
    let dir_options = SimpleFileOptions::default().unix_permissions(0o755);

    for piece in pieces {
        for source in &piece.source_paths {
            let metadata = fs::metadata(source).map_err(|e| {
                BuildError::new(BuildErrorKind::CreateZip {
                    path: archive_path.to_path_buf(),
                    reason: format!("cannot stat {}: {e}", source.display()),
                })
            })?;
            let name = in_archive_name(source, &piece.rebase_from, &piece.rebase_to, &piece.rename);

            ensure_parent_dirs(&mut writer, archive_path, &name, &mut written_dirs, &dir_options)?;

            if metadata.is_dir() {
                let dir_name = format!("{}/", name.trim_end_matches('/'));
                if written_dirs.insert(dir_name.clone()) {
                    writer.add_directory(&dir_name, dir_options).map_err(|e| zip_err(archive_path, e))?;
                }
            } else {
                writer.start_file(&name, file_options).map_err(|e| zip_err(archive_path, e))?;
                let mut contents = Vec::new();
                File::open(source)
                    .and_then(|mut f| f.read_to_end(&mut contents))
                    .map_err(|e| {
                        BuildError::new(BuildErrorKind::CreateZip {
                            path: archive_path.to_path_buf(),
                            reason: format!("cannot read {}: {e}", source.display()),
                        })
                    })?;
                writer.write_all(&contents).map_err(|e| {
                    BuildError::new(BuildErrorKind::CreateZip {
                        path: archive_path.to_path_buf(),
                        reason: e.to_string(),
                    })
                })?;
            }
        }
    }

    writer.finish().map_err(|e| zip_err(archive_path, e))?;
    Ok(())
}

fn ensure_parent_dirs(
    writer: &mut zip::ZipWriter<File>,
    archive_path: &Path,
    name: &str,
    written_dirs: &mut HashSet<String>,
    dir_options: &SimpleFileOptions,
) -> Result<()> {
    let parent = match Path::new(name).parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => return Ok(()),
    };
    let mut acc = PathBuf::new();
    for component in parent.components() {
        acc.push(component);
        let dir_name = format!("{}/", acc.to_string_lossy().replace('\\', "/"));
        if written_dirs.insert(dir_name.clone()) {
            writer
                .add_directory(&dir_name, *dir_options)
                .map_err(|e| zip_err(archive_path, e))?;
        }
    }
    Ok(())
}

fn zip_err(path: &Path, e: zip::result::ZipError) -> BuildError {
    BuildError::new(BuildErrorKind::CreateZip { path: path.to_path_buf(), reason: e.to_string() })
}

/// Extract `archive` into `destination_dir`, routing each entry through
/// the first valve whose rebase-from prefix and filters match, per
/// `UnzipValve.Matches` in the original. Entries matching no valve are
/// skipped. Directories get mode 0755, files 0644.
pub fn extract_zip(archive_path: &Path, destination_dir: &Path, valves: &[UnzipValveInput]) -> Result<()> {
    let file = File::open(archive_path).map_err(|e| {
        BuildError::new(BuildErrorKind::ExtractZip { archive: archive_path.to_path_buf(), reason: e.to_string() })
    })?;
    let mut zip = ZipArchive::new(file).map_err(|e| {
        BuildError::new(BuildErrorKind::ExtractZip { archive: archive_path.to_path_buf(), reason: e.to_string() })
    })?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| {
            BuildError::new(BuildErrorKind::ExtractZip { archive: archive_path.to_path_buf(), reason: e.to_string() })
        })?;
        let raw_name = entry.name().to_string();
        let is_dir = raw_name.ends_with('/');
        let cleaned = raw_name.trim_end_matches('/');
        let entry_path = Path::new(cleaned);

        let Some(valve) = find_matching_valve(entry_path, is_dir, valves) else {
            continue;
        };

        let out_name = in_archive_name(entry_path, &valve.rebase_from, &valve.rebase_to, &valve.rename);
        let out_path = destination_dir.join(&out_name);

        if is_dir {
            fs::create_dir_all(&out_path).map_err(|e| {
                BuildError::new(BuildErrorKind::CannotCreateDirectory { path: out_path.clone(), source: e })
            })?;
            set_unix_mode(&out_path, 0o755);
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                BuildError::new(BuildErrorKind::CannotCreateDirectory { path: parent.to_path_buf(), source: e })
            })?;
        }
        let mut out_file = File::create(&out_path).map_err(|e| {
            BuildError::new(BuildErrorKind::ExtractZip {
                archive: archive_path.to_path_buf(),
                reason: format!("cannot create {}: {e}", out_path.display()),
            })
        })?;
        io::copy(&mut entry, &mut out_file).map_err(|e| {
            BuildError::new(BuildErrorKind::ExtractZip {
                archive: archive_path.to_path_buf(),
                reason: format!("cannot write {}: {e}", out_path.display()),
            })
        })?;
        set_unix_mode(&out_path, 0o644);
    }
    Ok(())
}

fn find_matching_valve<'a>(entry_path: &Path, is_dir: bool, valves: &'a [UnzipValveInput]) -> Option<&'a UnzipValveInput> {
    let root = Path::new("");
    valves.iter().find(|valve| {
        let prefix_matches = entry_path.starts_with(&valve.rebase_from) || valve.rebase_from.is_empty();
        if !prefix_matches {
            return false;
        }
        if valve.filters.is_empty() {
            return true;
        }
        all_accept(entry_path, root, is_dir, &valve.filters)
    })
}

#[cfg(unix)]
fn set_unix_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    let _ = fs::set_permissions(path, fs::Permissions::from_mode(mode));
}

#[cfg(not(unix))]
fn set_unix_mode(_path: &Path, _mode: u32) {}
