//! Packs retrieved repository files into a tar archive and extracts the
//! exported entities back out of it.
//!
//! Extraction is split in two phases. [`ExtractionPhase`] reads every entry,
//! collecting per-file failures so they can all be reported at once; it can
//! only be left through [`ExtractionPhase::finish`], which yields
//! [`ExportedEntities`] when nothing failed. Persisting those entities is
//! fail-fast and lives with the callers.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::Path;

use tracing::{debug, error};

use ascode_core::export::{ApplicationExport, EnvironmentExport, PipelineExport, WorkflowExport};
use ascode_core::MultiError;

use crate::error::SyncError;

/// An in-memory tar archive of `.cds` files.
pub type CdsArchive = tar::Archive<Cursor<Vec<u8>>>;

const MAX_PREALLOCATED_ENTRY: u64 = 1 << 20;

/// Pack `files` (path → content) into a tar archive keyed by base name.
///
/// Entries are regular files with mode `0600`. Fails on the first file the
/// archive writer rejects, or that it accepted without consuming any byte.
pub fn read_cds_files(files: &BTreeMap<String, Vec<u8>>) -> Result<CdsArchive, SyncError> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, content) in files {
        let name = base_name(path);
        debug!(file = %path, entry = %name, size = content.len(), "packing file");

        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_mode(0o600);
        header.set_size(content.len() as u64);

        let mut reader = CountingReader::new(content.as_slice());
        builder
            .append_data(&mut header, &name, &mut reader)
            .map_err(|source| SyncError::Packing {
                file: path.clone(),
                source,
            })?;
        if reader.count == 0 && !content.is_empty() {
            return Err(SyncError::NothingWritten { file: path.clone() });
        }
    }
    let bytes = builder.into_inner().map_err(|source| SyncError::Packing {
        file: "<archive>".to_string(),
        source,
    })?;
    Ok(tar::Archive::new(Cursor::new(bytes)))
}

fn base_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

struct CountingReader<R> {
    inner: R,
    count: u64,
}

impl<R> CountingReader<R> {
    fn new(inner: R) -> Self {
        Self { inner, count: 0 }
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// What an archive entry holds, decided by its file name alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Application,
    Pipeline,
    Environment,
    Workflow,
}

impl EntryKind {
    pub fn classify(name: &str) -> Self {
        if name.contains(".app.") {
            EntryKind::Application
        } else if name.contains(".pip.") {
            EntryKind::Pipeline
        } else if name.contains(".env.") {
            EntryKind::Environment
        } else {
            EntryKind::Workflow
        }
    }
}

/// Everything a repository exports: one workflow and the entities it uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportedEntities {
    pub workflow: WorkflowExport,
    /// Archive entry the workflow was read from.
    pub workflow_file: String,
    pub applications: BTreeMap<String, ApplicationExport>,
    pub pipelines: BTreeMap<String, PipelineExport>,
    pub environments: BTreeMap<String, EnvironmentExport>,
}

/// Accumulates entries and per-file failures until [`finish`](Self::finish).
#[derive(Debug, Default)]
pub struct ExtractionPhase {
    applications: BTreeMap<String, ApplicationExport>,
    pipelines: BTreeMap<String, PipelineExport>,
    environments: BTreeMap<String, EnvironmentExport>,
    workflow_file: Option<String>,
    workflow: Option<WorkflowExport>,
    errors: MultiError,
}

impl ExtractionPhase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify and parse one entry. Failures are recorded, never returned.
    pub fn accept(&mut self, name: &str, content: &[u8]) {
        match EntryKind::classify(name) {
            EntryKind::Application => match serde_yaml::from_slice::<ApplicationExport>(content) {
                Ok(app) => {
                    self.applications.insert(name.to_string(), app);
                }
                Err(e) => self.reject(format!("unable to unmarshal application {name}: {e}")),
            },
            EntryKind::Pipeline => match serde_yaml::from_slice::<PipelineExport>(content) {
                Ok(pip) => {
                    self.pipelines.insert(name.to_string(), pip);
                }
                Err(e) => self.reject(format!("unable to unmarshal pipeline {name}: {e}")),
            },
            EntryKind::Environment => match serde_yaml::from_slice::<EnvironmentExport>(content) {
                Ok(env) => {
                    self.environments.insert(name.to_string(), env);
                }
                Err(e) => self.reject(format!("unable to unmarshal environment {name}: {e}")),
            },
            EntryKind::Workflow => {
                // The slot is claimed before parsing: a broken first file
                // still makes a second one a duplicate.
                if let Some(first) = &self.workflow_file {
                    let reason = format!("two workflows files found: {first} and {name}");
                    self.reject(reason);
                    return;
                }
                self.workflow_file = Some(name.to_string());
                match serde_yaml::from_slice::<WorkflowExport>(content) {
                    Ok(w) => self.workflow = Some(w),
                    Err(e) => self.reject(format!("unable to unmarshal workflow {name}: {e}")),
                }
            }
        }
    }

    fn reject(&mut self, reason: String) {
        error!(%reason, "rejected .cds entry");
        self.errors.append(reason);
    }

    /// Leave the extraction phase.
    pub fn finish(mut self) -> Result<ExportedEntities, SyncError> {
        if self.workflow_file.is_none() {
            self.errors.append("no workflow file found");
        }
        if !self.errors.is_empty() {
            return Err(SyncError::WorkflowInvalid(self.errors));
        }
        match (self.workflow, self.workflow_file) {
            (Some(workflow), Some(workflow_file)) => Ok(ExportedEntities {
                workflow,
                workflow_file,
                applications: self.applications,
                pipelines: self.pipelines,
                environments: self.environments,
            }),
            _ => {
                let mut errors = MultiError::new();
                errors.append("no workflow file found");
                Err(SyncError::WorkflowInvalid(errors))
            }
        }
    }
}

/// Read every entry of `archive` and extract the exported entities.
///
/// A tar read failure aborts immediately; per-file decode failures are
/// gathered into a single [`SyncError::WorkflowInvalid`].
pub fn extract_from_cds_files<R: Read>(
    archive: &mut tar::Archive<R>,
) -> Result<ExportedEntities, SyncError> {
    let mut phase = ExtractionPhase::new();
    for entry in archive.entries().map_err(SyncError::Archive)? {
        let mut entry = entry.map_err(SyncError::Archive)?;
        let name = entry
            .path()
            .map_err(SyncError::Archive)?
            .to_string_lossy()
            .into_owned();
        // The header size is untrusted; let the buffer grow with the data.
        let capacity = entry.size().min(MAX_PREALLOCATED_ENTRY) as usize;
        let mut content = Vec::with_capacity(capacity);
        entry
            .read_to_end(&mut content)
            .map_err(SyncError::Archive)?;
        debug!(file = %name, size = content.len(), "extracting entry");
        phase.accept(&name, &content);
    }
    phase.finish()
}
