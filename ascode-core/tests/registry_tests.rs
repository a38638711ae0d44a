//! Registry error-message and atomic-write-safety integration tests.
//! Layout: <root>/projects/<key>/{project.yaml, workflows/<name>.yaml}

use ascode_core::{
    registry,
    types::{Permission, ProjectGroup, ProjectKey},
    Node, RegistryError, Workflow,
};
use assert_fs::prelude::*;
use predicates::prelude::predicate;
use std::fs;

fn key() -> ProjectKey {
    ProjectKey::from("ACME")
}

// ---------------------------------------------------------------------------
// 1. Load error messages
// ---------------------------------------------------------------------------

#[test]
fn load_missing_project_names_the_path() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let err = registry::load_project_at(root.path(), &key()).unwrap_err();
    assert!(matches!(err, RegistryError::ProjectNotFound { .. }), "got: {err}");
    assert!(err.to_string().contains("project not found"));
    assert!(err.to_string().contains("project.yaml"));
}

#[test]
fn load_corrupt_workflow_returns_parse_error_with_path() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let dir = root.path().join("projects").join("ACME").join("workflows");
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(dir.join("release.yaml"), b": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = registry::load_workflow_at(root.path(), &key(), "release").unwrap_err();
    assert!(matches!(err, RegistryError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("release.yaml"));
}

// ---------------------------------------------------------------------------
// 2. Atomic write safety
// ---------------------------------------------------------------------------

#[test]
fn save_project_writes_yaml_and_cleans_up_tmp() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let project = registry::init_project_at(
        root.path(),
        key(),
        vec![ProjectGroup {
            group: "devs".to_string(),
            permission: Permission::READ_WRITE_EXECUTE,
        }],
    )
    .expect("init");
    assert_eq!(project.groups.len(), 1);

    root.child("projects/ACME/project.yaml")
        .assert(predicate::path::exists())
        .assert(predicate::str::contains("devs"));
    root.child("projects/ACME/project.yaml.tmp")
        .assert(predicate::path::missing());
}

#[test]
fn list_workflows_sorted_by_name() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    for name in ["zeta", "alpha"] {
        let w = Workflow {
            name: name.to_string(),
            project_key: key(),
            root: Node::new("build", "build"),
            ..Default::default()
        };
        registry::save_workflow_at(root.path(), &w).expect("save");
    }
    let names: Vec<String> = registry::list_workflows_at(root.path(), &key())
        .expect("list")
        .into_iter()
        .map(|w| w.name)
        .collect();
    assert_eq!(names, vec!["alpha", "zeta"]);
}

#[test]
fn list_projects_empty_when_root_missing() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    assert!(registry::list_projects_at(&root.path().join("nowhere"))
        .expect("list")
        .is_empty());
}
