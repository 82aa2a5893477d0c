use std::fs;

use hike::archive::{create_zip, extract_zip};
use hike::filter::{FileFilter, FileTypeWanted};
use hike::step::{UnzipValveInput, ZipPieceInput};

#[test]
fn round_trips_a_single_file_with_no_rebase() {
    let dir = tempfile::tempdir().unwrap();
    let source_path = dir.path().join("hello.txt");
    fs::write(&source_path, b"hello world").unwrap();

    let archive_path = dir.path().join("out.zip");
    let pieces = vec![ZipPieceInput {
        source_paths: vec![source_path.clone()],
        rebase_from: String::new(),
        rebase_to: String::new(),
        rename: None,
    }];
    create_zip(&archive_path, &pieces).unwrap();
    assert!(archive_path.is_file());

    let destination_dir = dir.path().join("extracted");
    fs::create_dir_all(&destination_dir).unwrap();
    let valves = vec![UnzipValveInput {
        rebase_from: String::new(),
        rebase_to: String::new(),
        rename: None,
        filters: vec![],
    }];
    extract_zip(&archive_path, &destination_dir, &valves).unwrap();

    let extracted = destination_dir.join("hello.txt");
    assert_eq!(fs::read_to_string(&extracted).unwrap(), "hello world");
}

#[test]
fn rebase_from_strips_a_leading_directory_and_rebase_to_prefixes_the_archive_path() {
    let dir = tempfile::tempdir().unwrap();
    let src_dir = dir.path().join("build/out");
    fs::create_dir_all(&src_dir).unwrap();
    let source_path = src_dir.join("lib.so");
    fs::write(&source_path, b"binary").unwrap();

    let archive_path = dir.path().join("out.zip");
    let pieces = vec![ZipPieceInput {
        source_paths: vec![source_path.clone()],
        rebase_from: dir.path().join("build/out").to_string_lossy().into_owned(),
        rebase_to: "lib".to_string(),
        rename: None,
    }];
    create_zip(&archive_path, &pieces).unwrap();

    let destination_dir = dir.path().join("extracted");
    fs::create_dir_all(&destination_dir).unwrap();
    let valves = vec![UnzipValveInput {
        rebase_from: "lib".to_string(),
        rebase_to: String::new(),
        rename: None,
        filters: vec![],
    }];
    extract_zip(&archive_path, &destination_dir, &valves).unwrap();

    assert_eq!(fs::read(destination_dir.join("lib.so")).unwrap(), b"binary");
}

#[test]
fn rename_rewrites_the_basename_during_archive_creation() {
    let dir = tempfile::tempdir().unwrap();
    let source_path = dir.path().join("module.c");
    fs::write(&source_path, b"source").unwrap();

    let archive_path = dir.path().join("out.zip");
    let rename = Some((regex::Regex::new(r"\.c$").unwrap(), ".c.bak".to_string()));
    let pieces = vec![ZipPieceInput {
        source_paths: vec![source_path.clone()],
        rebase_from: String::new(),
        rebase_to: String::new(),
        rename,
    }];
    create_zip(&archive_path, &pieces).unwrap();

    let destination_dir = dir.path().join("extracted");
    fs::create_dir_all(&destination_dir).unwrap();
    let valves = vec![UnzipValveInput {
        rebase_from: String::new(),
        rebase_to: String::new(),
        rename: None,
        filters: vec![],
    }];
    extract_zip(&archive_path, &destination_dir, &valves).unwrap();

    assert!(destination_dir.join("module.c.bak").is_file());
    assert!(!destination_dir.join("module.c").exists());
}

#[test]
fn unzip_valve_filters_restrict_which_entries_are_extracted() {
    let dir = tempfile::tempdir().unwrap();
    let a_path = dir.path().join("a.txt");
    let b_path = dir.path().join("b.log");
    fs::write(&a_path, b"a").unwrap();
    fs::write(&b_path, b"b").unwrap();

    let archive_path = dir.path().join("out.zip");
    let pieces = vec![ZipPieceInput {
        source_paths: vec![a_path.clone(), b_path.clone()],
        rebase_from: String::new(),
        rebase_to: String::new(),
        rename: None,
    }];
    create_zip(&archive_path, &pieces).unwrap();

    let destination_dir = dir.path().join("extracted");
    fs::create_dir_all(&destination_dir).unwrap();
    let valves = vec![UnzipValveInput {
        rebase_from: String::new(),
        rebase_to: String::new(),
        rename: None,
        filters: vec![FileFilter::Wildcard("*.txt".to_string())],
    }];
    extract_zip(&archive_path, &destination_dir, &valves).unwrap();

    assert!(destination_dir.join("a.txt").is_file());
    assert!(!destination_dir.join("b.log").exists());
}

#[test]
fn directory_entries_are_preserved_with_directory_mode() {
    let dir = tempfile::tempdir().unwrap();
    let sub_dir = dir.path().join("assets");
    fs::create_dir_all(&sub_dir).unwrap();
    let nested_file = sub_dir.join("icon.png");
    fs::write(&nested_file, b"png").unwrap();

    let archive_path = dir.path().join("out.zip");
    let pieces = vec![ZipPieceInput {
        source_paths: vec![sub_dir.clone(), nested_file.clone()],
        rebase_from: dir.path().to_string_lossy().into_owned(),
        rebase_to: String::new(),
        rename: None,
    }];
    create_zip(&archive_path, &pieces).unwrap();

    let destination_dir = dir.path().join("extracted");
    fs::create_dir_all(&destination_dir).unwrap();
    let valves = vec![UnzipValveInput {
        rebase_from: String::new(),
        rebase_to: String::new(),
        rename: None,
        filters: vec![],
    }];
    extract_zip(&archive_path, &destination_dir, &valves).unwrap();

    assert!(destination_dir.join("assets").is_dir());
    assert_eq!(fs::read(destination_dir.join("assets/icon.png")).unwrap(), b"png");
}

#[test]
fn file_type_filter_matches_only_directories() {
    let filter = FileFilter::FileType(FileTypeWanted::Directories);
    assert!(filter.accepts(std::path::Path::new("a/b"), std::path::Path::new("a"), true));
    assert!(!filter.accepts(std::path::Path::new("a/b"), std::path::Path::new("a"), false));
}
