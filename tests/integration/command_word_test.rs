use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use hike::artifact::{Artifact, ArtifactKey};
use hike::command_word::{assemble, CommandWord};
use hike::error::Arise;
use hike::location::Location;

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

#[test]
fn static_words_produce_a_single_argv() {
    let words = vec![
        CommandWord::Static("cc".to_string()),
        CommandWord::Static("-c".to_string()),
        CommandWord::Static("main.c".to_string()),
    ];
    let argvs = assemble(&words).unwrap();
    assert_eq!(argvs, vec![vec!["cc".to_string(), "-c".to_string(), "main.c".to_string()]]);
}

#[test]
fn a_single_path_source_word_contributes_one_word_not_a_cartesian_fan_out() {
    let dir = tempfile::tempdir().unwrap();
    let source_path = dir.path().join("a.c");
    fs::write(&source_path, b"").unwrap();

    let source = file_artifact(0, source_path.to_str().unwrap());
    let words = vec![
        CommandWord::Static("cc".to_string()),
        CommandWord::Source { artifact: source, merge: false },
    ];
    let argvs = assemble(&words).unwrap();
    assert_eq!(argvs.len(), 1);
    assert_eq!(argvs[0][0], "cc");
    assert_eq!(argvs[0][1], source_path.to_str().unwrap());
}

#[test]
fn a_group_destination_fans_out_into_one_argv_per_child_path() {
    let dir = tempfile::tempdir().unwrap();
    let a_path = dir.path().join("a.o");
    let b_path = dir.path().join("b.o");

    let a = file_artifact(0, a_path.to_str().unwrap());
    let b = file_artifact(1, b_path.to_str().unwrap());
    let group = Rc::new(Artifact::new_group(
        ArtifactKey::new("test", "objects"),
        2,
        None,
        arise("objects"),
        vec![a, b],
    ));

    let words = vec![
        CommandWord::Static("strip".to_string()),
        CommandWord::Destination { artifact: group, merge: false },
    ];
    let argvs = assemble(&words).unwrap();

    // Every combination is a full two-word argv, one per group member path.
    assert_eq!(argvs.len(), 2);
    for argv in &argvs {
        assert_eq!(argv[0], "strip");
    }
    let second_words: Vec<&str> = argvs.iter().map(|a| a[1].as_str()).collect();
    assert!(second_words.contains(&a_path.to_str().unwrap()));
    assert!(second_words.contains(&b_path.to_str().unwrap()));
}

#[test]
fn merge_joins_multiple_paths_into_a_single_os_path_list_word() {
    let dir = tempfile::tempdir().unwrap();
    let a_path = dir.path().join("a.o");
    let b_path = dir.path().join("b.o");

    let a = file_artifact(0, a_path.to_str().unwrap());
    let b = file_artifact(1, b_path.to_str().unwrap());
    let group = Rc::new(Artifact::new_group(
        ArtifactKey::new("test", "objects"),
        2,
        None,
        arise("objects"),
        vec![a, b],
    ));

    let words = vec![
        CommandWord::Static("echo".to_string()),
        CommandWord::Source { artifact: group, merge: true },
    ];
    let argvs = assemble(&words).unwrap();

    assert_eq!(argvs.len(), 1, "merge=true must collapse the group into one word, not fan out");
    #[cfg(unix)]
    let expected = format!("{}:{}", a_path.display(), b_path.display());
    #[cfg(not(unix))]
    let expected = format!("{};{}", a_path.display(), b_path.display());
    assert_eq!(argvs[0][1], expected);
}

#[test]
fn two_fanning_slots_produce_the_full_cartesian_product() {
    let dir = tempfile::tempdir().unwrap();
    let a_path = dir.path().join("a.txt");
    let b_path = dir.path().join("b.txt");
    let c_path = dir.path().join("c.txt");
    let d_path = dir.path().join("d.txt");

    let sources = Rc::new(Artifact::new_group(
        ArtifactKey::new("test", "sources"),
        0,
        None,
        arise("sources"),
        vec![file_artifact(1, a_path.to_str().unwrap()), file_artifact(2, b_path.to_str().unwrap())],
    ));
    let destinations = Rc::new(Artifact::new_group(
        ArtifactKey::new("test", "destinations"),
        3,
        None,
        arise("destinations"),
        vec![file_artifact(4, c_path.to_str().unwrap()), file_artifact(5, d_path.to_str().unwrap())],
    ));

    let words = vec![
        CommandWord::Source { artifact: sources, merge: false },
        CommandWord::Destination { artifact: destinations, merge: false },
    ];
    let argvs = assemble(&words).unwrap();
    assert_eq!(argvs.len(), 4, "two slots each expanding to 2 values must yield 2*2=4 invocations");
}

#[test]
fn brace_words_concatenate_their_inner_expansions_into_one_string_per_slot_combination() {
    let words = vec![CommandWord::Brace(vec![
        CommandWord::Static("-I".to_string()),
        CommandWord::Static("/usr/include".to_string()),
    ])];
    let argvs = assemble(&words).unwrap();
    assert_eq!(argvs, vec![vec!["-I/usr/include".to_string()]]);
}

#[test]
fn an_artifact_with_no_resolved_paths_fails_assembly() {
    let empty_group = Rc::new(Artifact::new_group(
        ArtifactKey::new("test", "empty"),
        0,
        None,
        arise("empty"),
        vec![],
    ));
    let words = vec![CommandWord::Source { artifact: empty_group, merge: false }];
    assert!(assemble(&words).is_err());
}
