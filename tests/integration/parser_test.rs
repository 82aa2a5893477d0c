use std::fs;

fn write_hikefile(dir: &std::path::Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn loads_a_minimal_spec_with_one_file_artifact_and_a_goal() {
    let dir = tempfile::tempdir().unwrap();
    let hikefile = write_hikefile(
        dir.path(),
        "hikefile",
        r#"
            artifact file readme {
                path "README.md"
            }
            goal build {
                readme
            }
        "#,
    );

    let state = hike::load_spec(&hikefile, "root").unwrap();
    assert_eq!(state.artifact_names(), &["readme".to_string()]);
    assert_eq!(state.goal_names(), &["build".to_string()]);
}

#[test]
fn a_group_can_forward_reference_members_declared_later_in_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let hikefile = write_hikefile(
        dir.path(),
        "hikefile",
        r#"
            artifact group objects {
                members { a b }
            }
            artifact file a {
                path "a.o"
            }
            artifact file b {
                path "b.o"
            }
        "#,
    );

    let state = hike::load_spec(&hikefile, "root").unwrap();
    let group = state.lookup_artifact("objects").unwrap();
    assert_eq!(group.path_list().unwrap(), vec!["a.o".to_string(), "b.o".to_string()]);
}

#[test]
fn a_goal_can_forward_reference_an_artifact_declared_later_in_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let hikefile = write_hikefile(
        dir.path(),
        "hikefile",
        r#"
            goal build {
                output
            }
            artifact file output {
                path "out.bin"
            }
        "#,
    );

    let state = hike::load_spec(&hikefile, "root").unwrap();
    let goal = state.lookup_goal("build").unwrap();
    assert_eq!(goal.len(), 1);
    assert_eq!(goal[0].path_list().unwrap(), vec!["out.bin".to_string()]);
}

#[test]
fn a_copy_transform_can_forward_reference_its_source_declared_later_in_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let hikefile = write_hikefile(
        dir.path(),
        "hikefile",
        r#"
            artifact file y {
                path "y.txt"
                generatedBy {
                    copy {
                        source x
                        destination y
                    }
                }
            }
            artifact file x {
                path "x.txt"
            }
        "#,
    );

    let state = hike::load_spec(&hikefile, "root").unwrap();
    let y = state.lookup_artifact("y").unwrap();
    let transform = y.generating_transform().expect("y should have a generating transform");
    match &*transform {
        hike::transform::Transform::Copy { sources, .. } => {
            assert_eq!(sources.len(), 1);
            assert_eq!(sources[0].path_list().unwrap(), vec!["x.txt".to_string()]);
        }
        other => panic!("expected a Copy transform, got {other:?}"),
    }
}

#[test]
fn a_copy_transform_referencing_a_never_defined_source_fails_compilation() {
    let dir = tempfile::tempdir().unwrap();
    let hikefile = write_hikefile(
        dir.path(),
        "hikefile",
        r#"
            artifact file y {
                path "y.txt"
                generatedBy {
                    copy {
                        source x
                        destination y
                    }
                }
            }
        "#,
    );

    assert!(hike::load_spec(&hikefile, "root").is_err());
}

#[test]
fn include_if_exists_silently_skips_a_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let hikefile = write_hikefile(
        dir.path(),
        "hikefile",
        r#"
            include ifExists "does-not-exist.hike"
            artifact file readme {
                path "README.md"
            }
        "#,
    );

    let state = hike::load_spec(&hikefile, "root").unwrap();
    assert_eq!(state.artifact_names(), &["readme".to_string()]);
}

#[test]
fn include_without_if_exists_fails_when_the_file_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    let hikefile = write_hikefile(dir.path(), "hikefile", r#"include "does-not-exist.hike""#);
    assert!(hike::load_spec(&hikefile, "root").is_err());
}

#[test]
fn include_pulls_in_artifacts_from_another_hikefile() {
    let dir = tempfile::tempdir().unwrap();
    write_hikefile(
        dir.path(),
        "shared.hike",
        r#"
            artifact file shared_header {
                path "shared.h"
            }
        "#,
    );
    let hikefile = write_hikefile(dir.path(), "hikefile", r#"include "shared.hike""#);

    let state = hike::load_spec(&hikefile, "root").unwrap();
    assert_eq!(state.artifact_names(), &["shared_header".to_string()]);
}

#[test]
fn set_and_setdef_values_are_interpolated_into_string_fields() {
    let dir = tempfile::tempdir().unwrap();
    let hikefile = write_hikefile(
        dir.path(),
        "hikefile",
        r#"
            set outDir "build"
            setdef outDir "ignored-because-already-set"
            artifact file output {
                path "${outDir}/out.bin"
            }
        "#,
    );

    let state = hike::load_spec(&hikefile, "root").unwrap();
    let artifact = state.lookup_artifact("output").unwrap();
    assert_eq!(artifact.path_list().unwrap(), vec!["build/out.bin".to_string()]);
}

#[test]
fn setdef_does_not_override_an_already_set_variable() {
    let dir = tempfile::tempdir().unwrap();
    let hikefile = write_hikefile(
        dir.path(),
        "hikefile",
        r#"
            setdef mode "release"
            set mode "debug"
            artifact file output {
                path "${mode}/out.bin"
            }
        "#,
    );

    let state = hike::load_spec(&hikefile, "root").unwrap();
    let artifact = state.lookup_artifact("output").unwrap();
    assert_eq!(artifact.path_list().unwrap(), vec!["debug/out.bin".to_string()]);
}

#[test]
fn duplicate_artifact_names_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let hikefile = write_hikefile(
        dir.path(),
        "hikefile",
        r#"
            artifact file a { path "a.txt" }
            artifact file a { path "b.txt" }
        "#,
    );
    assert!(hike::load_spec(&hikefile, "root").is_err());
}

#[test]
fn referencing_an_undefined_artifact_in_a_goal_fails_compilation() {
    let dir = tempfile::tempdir().unwrap();
    let hikefile = write_hikefile(dir.path(), "hikefile", r#"goal build { missing }"#);
    assert!(hike::load_spec(&hikefile, "root").is_err());
}

#[test]
fn a_tree_artifact_with_a_wildcard_filter_parses() {
    let dir = tempfile::tempdir().unwrap();
    let hikefile = write_hikefile(
        dir.path(),
        "hikefile",
        r#"
            artifact tree sources {
                root "src"
                filter { wildcard "*.rs" }
            }
        "#,
    );
    let state = hike::load_spec(&hikefile, "root").unwrap();
    assert!(state.lookup_artifact("sources").is_some());
}

#[test]
fn a_mkdir_transform_attaches_to_a_directory_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("out").to_string_lossy().into_owned();
    let hikefile = write_hikefile(
        dir.path(),
        "hikefile",
        &format!(
            r#"
            set outDir "{out_dir}"
            artifact directory out {{
                path "${{outDir}}"
                generatedBy {{
                    mkdir {{
                        destination out
                    }}
                }}
            }}
            goal build {{ out }}
        "#
        ),
    );
    let state = hike::load_spec(&hikefile, "root").unwrap();
    let plan = hike::plan_goal(&state, "build").unwrap();
    assert_eq!(plan.step_count(), 1, "the directory does not exist yet, so mkdir must be planned");
}
