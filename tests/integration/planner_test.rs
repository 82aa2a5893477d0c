use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use filetime::{set_file_mtime, FileTime};

use hike::artifact::{Artifact, ArtifactKey};
use hike::error::Arise;
use hike::location::Location;
use hike::planner::Plan;
use hike::transform::Transform;

fn location() -> Location {
    Location::new(Rc::new(PathBuf::from("test.hike")), 1, 1)
}

fn arise(text: &str) -> Arise {
    Arise::new(text.to_string(), location())
}

fn file_artifact(id: u64, path: &str) -> Rc<Artifact> {
    Rc::new(Artifact::new_file(
        ArtifactKey::new("test", path),
        id,
        None,
        arise(path),
        path.to_string(),
    ))
}

fn set_mtime(path: &str, offset_secs: i64) {
    let base = FileTime::from_unix_time(1_700_000_000, 0);
    let adjusted = FileTime::from_unix_time(base.unix_seconds() + offset_secs, 0);
    set_file_mtime(path, adjusted).unwrap();
}

#[test]
fn missing_destination_always_rebuilds() {
    let dir = tempfile::tempdir().unwrap();
    let source_path = dir.path().join("source.txt");
    fs::write(&source_path, b"hello").unwrap();

    let destination_path = dir.path().join("destination.txt");

    let source = file_artifact(0, source_path.to_str().unwrap());
    let destination = file_artifact(1, destination_path.to_str().unwrap());
    let transform = Transform::Copy {
        sources: vec![source],
        destination: destination.clone(),
        destination_is_dir: false,
        rebase_from: String::new(),
        arise: arise("copy"),
    };
    destination.set_generating_transform(Rc::new(transform));

    let mut plan = Plan::new();
    hike::artifact::require(&destination, &mut plan, &arise("goal")).unwrap();
    assert_eq!(plan.step_count(), 1, "a missing destination must always trigger a rebuild");
}

#[test]
fn equal_mtime_does_not_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let source_path = dir.path().join("source.txt");
    let destination_path = dir.path().join("destination.txt");
    fs::write(&source_path, b"hello").unwrap();
    fs::write(&destination_path, b"hello").unwrap();

    set_mtime(source_path.to_str().unwrap(), 0);
    set_mtime(destination_path.to_str().unwrap(), 0);

    let source = file_artifact(0, source_path.to_str().unwrap());
    let destination = file_artifact(1, destination_path.to_str().unwrap());
    let transform = Transform::Copy {
        sources: vec![source],
        destination: destination.clone(),
        destination_is_dir: false,
        rebase_from: String::new(),
        arise: arise("copy"),
    };
    destination.set_generating_transform(Rc::new(transform));

    let mut plan = Plan::new();
    hike::artifact::require(&destination, &mut plan, &arise("goal")).unwrap();
    assert_eq!(plan.step_count(), 0, "equal mtimes must not trigger a rebuild (strict '>' comparison)");
}

#[test]
fn strictly_newer_source_triggers_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let source_path = dir.path().join("source.txt");
    let destination_path = dir.path().join("destination.txt");
    fs::write(&source_path, b"hello").unwrap();
    fs::write(&destination_path, b"hello").unwrap();

    set_mtime(destination_path.to_str().unwrap(), 0);
    set_mtime(source_path.to_str().unwrap(), 10);

    let source = file_artifact(0, source_path.to_str().unwrap());
    let destination = file_artifact(1, destination_path.to_str().unwrap());
    let transform = Transform::Copy {
        sources: vec![source],
        destination: destination.clone(),
        destination_is_dir: false,
        rebase_from: String::new(),
        arise: arise("copy"),
    };
    destination.set_generating_transform(Rc::new(transform));

    let mut plan = Plan::new();
    hike::artifact::require(&destination, &mut plan, &arise("goal")).unwrap();
    assert_eq!(plan.step_count(), 1);
}

#[test]
fn requiring_an_artifact_twice_in_one_plan_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let source_path = dir.path().join("source.txt");
    let destination_path = dir.path().join("destination.txt");
    fs::write(&source_path, b"hello").unwrap();

    let source = file_artifact(0, source_path.to_str().unwrap());
    let destination = file_artifact(1, destination_path.to_str().unwrap());
    let transform = Transform::Copy {
        sources: vec![source],
        destination: destination.clone(),
        destination_is_dir: false,
        rebase_from: String::new(),
        arise: arise("copy"),
    };
    destination.set_generating_transform(Rc::new(transform));

    let mut plan = Plan::new();
    let a = arise("goal");
    hike::artifact::require(&destination, &mut plan, &a).unwrap();
    hike::artifact::require(&destination, &mut plan, &a).unwrap();
    assert_eq!(plan.step_count(), 1, "requiring the same artifact twice must not duplicate its step");
}

#[test]
fn group_requires_every_child() {
    let dir = tempfile::tempdir().unwrap();
    let a_path = dir.path().join("a.txt");
    let b_path = dir.path().join("b.txt");

    let a_dest = file_artifact(0, a_path.to_str().unwrap());
    let b_dest = file_artifact(1, b_path.to_str().unwrap());
    for dest in [&a_dest, &b_dest] {
        let transform = Transform::Mkdir { destination: dest.clone(), arise: arise("mkdir") };
        dest.set_generating_transform(Rc::new(transform));
    }

    let group = Rc::new(Artifact::new_group(
        ArtifactKey::new("test", "group"),
        2,
        None,
        arise("group"),
        vec![a_dest, b_dest],
    ));

    let mut plan = Plan::new();
    hike::artifact::require(&group, &mut plan, &arise("goal")).unwrap();
    // Mkdir only enqueues a step when the destination path is absent;
    // both a.txt and b.txt are missing, so both steps fire.
    assert_eq!(plan.step_count(), 2);
}
