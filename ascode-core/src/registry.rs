//! On-disk YAML registry of projects and their persisted workflows.
//!
//! # Storage layout
//!
//! ```text
//! <root>/                         (default: ~/.ascode)
//!   projects/
//!     <project_key>/
//!       project.yaml              (project, groups, known entities, mode 0600)
//!       workflows/
//!         <workflow_name>.yaml    (one file per workflow, mode 0600)
//! ```
//!
//! Every function takes the registry root explicitly; [`default_root`]
//! resolves `~/.ascode` for callers that do not override it. Tests always
//! pass a `TempDir`.

use std::path::{Path, PathBuf};

use crate::error::RegistryError;
use crate::types::{Project, ProjectGroup, ProjectKey};
use crate::workflow::Workflow;

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `~/.ascode`
pub fn default_root() -> Result<PathBuf, RegistryError> {
    dirs::home_dir()
        .map(|h| h.join(".ascode"))
        .ok_or(RegistryError::HomeNotFound)
}

/// `<root>/projects/<key>/`
///
/// Creates the directory (mode `0700`) if it does not yet exist.
pub fn project_dir_at(root: &Path, key: &ProjectKey) -> Result<PathBuf, RegistryError> {
    let dir = root.join("projects").join(&key.0);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;
    }
    Ok(dir)
}

/// `<root>/projects/<key>/project.yaml`; pure, no I/O.
pub fn project_path_at(root: &Path, key: &ProjectKey) -> PathBuf {
    root.join("projects").join(&key.0).join("project.yaml")
}

/// `<root>/projects/<key>/workflows/<name>.yaml`; pure, no I/O.
pub fn workflow_path_at(root: &Path, key: &ProjectKey, name: &str) -> PathBuf {
    root.join("projects")
        .join(&key.0)
        .join("workflows")
        .join(format!("{name}.yaml"))
}

// ---------------------------------------------------------------------------
// 2. Projects
// ---------------------------------------------------------------------------

/// Load `<root>/projects/<key>/project.yaml`.
///
/// Returns `RegistryError::ProjectNotFound` if absent,
/// `RegistryError::Parse` (with path + line context) if malformed YAML.
pub fn load_project_at(root: &Path, key: &ProjectKey) -> Result<Project, RegistryError> {
    let path = project_path_at(root, key);
    if !path.exists() {
        return Err(RegistryError::ProjectNotFound { path });
    }
    let contents = std::fs::read_to_string(&path)?;
    serde_yaml::from_str(&contents).map_err(|e| RegistryError::Parse { path, source: e })
}

/// Atomically save a project index.
pub fn save_project_at(root: &Path, project: &Project) -> Result<(), RegistryError> {
    project_dir_at(root, &project.key)?;
    let path = project_path_at(root, &project.key);
    write_atomic(&path, &serde_yaml::to_string(project)?)
}

/// Create a project if it does not exist yet.
///
/// Idempotent: an existing project is returned unchanged.
pub fn init_project_at(
    root: &Path,
    key: ProjectKey,
    groups: Vec<ProjectGroup>,
) -> Result<Project, RegistryError> {
    if project_path_at(root, &key).exists() {
        return load_project_at(root, &key);
    }
    let id = list_projects_at(root)?
        .iter()
        .map(|p| p.id)
        .max()
        .unwrap_or(0)
        + 1;
    let project = Project {
        id,
        name: key.0.clone(),
        key,
        groups,
        ..Default::default()
    };
    save_project_at(root, &project)?;
    Ok(project)
}

/// Every project under `<root>/projects/`, sorted by key.
pub fn list_projects_at(root: &Path) -> Result<Vec<Project>, RegistryError> {
    let dir = root.join("projects");
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut entries: Vec<_> = std::fs::read_dir(&dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .collect();
    entries.sort_by_key(|e| e.file_name());

    let mut projects = Vec::new();
    for entry in entries {
        let key = ProjectKey::from(entry.file_name().to_string_lossy().into_owned());
        if project_path_at(root, &key).exists() {
            projects.push(load_project_at(root, &key)?);
        }
    }
    Ok(projects)
}

// ---------------------------------------------------------------------------
// 3. Workflows
// ---------------------------------------------------------------------------

/// Load a persisted workflow; `Ok(None)` when it has never been saved.
pub fn load_workflow_at(
    root: &Path,
    key: &ProjectKey,
    name: &str,
) -> Result<Option<Workflow>, RegistryError> {
    let path = workflow_path_at(root, key, name);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)?;
    serde_yaml::from_str(&contents)
        .map(Some)
        .map_err(|e| RegistryError::Parse { path, source: e })
}

/// Atomically save a workflow under its project.
pub fn save_workflow_at(root: &Path, workflow: &Workflow) -> Result<(), RegistryError> {
    let dir = project_dir_at(root, &workflow.project_key)?.join("workflows");
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;
    }
    let path = workflow_path_at(root, &workflow.project_key, &workflow.name);
    write_atomic(&path, &serde_yaml::to_string(workflow)?)
}

/// Remove a persisted workflow. Missing files are not an error.
pub fn delete_workflow_at(root: &Path, key: &ProjectKey, name: &str) -> Result<(), RegistryError> {
    match std::fs::remove_file(workflow_path_at(root, key, name)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Every workflow of a project, sorted by name.
pub fn list_workflows_at(root: &Path, key: &ProjectKey) -> Result<Vec<Workflow>, RegistryError> {
    let dir = root.join("projects").join(&key.0).join("workflows");
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut entries: Vec<_> = std::fs::read_dir(&dir)?
        .filter_map(|e| e.ok())
        .collect();
    entries.sort_by_key(|e| e.file_name());

    let mut workflows = Vec::new();
    for entry in entries {
        let fname = entry.file_name();
        let name = fname.to_string_lossy();
        if !name.ends_with(".yaml") {
            continue;
        }
        let contents = std::fs::read_to_string(entry.path())?;
        let workflow: Workflow = serde_yaml::from_str(&contents)
            .map_err(|e| RegistryError::Parse { path: entry.path(), source: e })?;
        workflows.push(workflow);
    }
    Ok(workflows)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Write flow: `.tmp` sibling → `chmod 0600` → `rename`.
/// `.tmp` is always in the same directory as the target (same filesystem).
fn write_atomic(path: &Path, contents: &str) -> Result<(), RegistryError> {
    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, contents)?;
    set_file_permissions(&tmp)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), RegistryError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), RegistryError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), RegistryError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), RegistryError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
