//! Reconciles a freshly parsed workflow with the version it replaces.
//!
//! A repository-backed workflow keeps the identity of its repository webhook
//! across imports: the UUID and configuration of the previous version's hook
//! are carried onto the new one, so the external VCS registration keeps
//! pointing at the right workflow.

use std::collections::BTreeMap;

use tracing::debug;

use ascode_core::hook::{repository_webhook_model, HOOK_CONFIG_WORKFLOW};
use ascode_core::{HookConfigValue, NodeHook, Workflow};

use crate::error::SyncError;
use crate::import::ImportOptions;

pub const GIT_BRANCH: &str = "git.branch";
pub const GIT_TAG: &str = "git.tag";
pub const GIT_HASH: &str = "git.hash";
pub const GIT_REPOSITORY: &str = "git.repository";

/// Branch used for the default payload when the repository reports none.
pub const FALLBACK_BRANCH: &str = "master";

/// Align `workflow` with `previous` and the repository context in `opts`.
///
/// Hooks are only ever attached to the root node.
pub fn reconcile(
    workflow: &mut Workflow,
    previous: Option<&Workflow>,
    opts: &ImportOptions,
) -> Result<(), SyncError> {
    workflow.from_repository = opts.from_repository.clone().filter(|r| !r.is_empty());
    if !opts.is_default_branch {
        if let Some(branch) = opts.from_branch.as_ref().filter(|b| !b.is_empty()) {
            workflow.derivation_branch = Some(branch.clone());
        }
    }

    override_application_vcs(workflow, opts)?;

    if workflow.is_from_repository() {
        match previous.and_then(Workflow::repository_webhook) {
            Some(legacy) => carry_repository_webhook(workflow, legacy),
            None => {
                ensure_repository_webhook(workflow);
                workflow.root.context.default_payload =
                    default_payload(workflow, opts.default_branch.as_deref());
            }
        }
    }

    if let Some(expected) = opts.workflow_name.as_ref().filter(|n| !n.is_empty()) {
        if *expected != workflow.name {
            return Err(SyncError::NameMismatch {
                project: workflow.project_key.clone(),
                expected: expected.clone(),
                found: workflow.name.clone(),
            });
        }
    }
    Ok(())
}

/// Point the root application at the repository the workflow came from.
fn override_application_vcs(workflow: &mut Workflow, opts: &ImportOptions) -> Result<(), SyncError> {
    let Some(vcs_server) = opts.vcs_server.as_ref().filter(|v| !v.is_empty()) else {
        return Ok(());
    };
    let app_id = workflow.root.context.application_id;
    if app_id == 0 {
        return Ok(());
    }
    let name = workflow.name.clone();
    let app = workflow
        .applications
        .get_mut(&app_id)
        .ok_or(SyncError::MissingApplicationContext {
            workflow: name,
            application_id: app_id,
        })?;
    app.vcs_server = vcs_server.clone();
    app.repository_fullname = opts.repository_name.clone();
    app.repository_strategy = opts.repository_strategy.without_secrets();
    app.repository_strategy.default_branch = opts.default_branch.clone().unwrap_or_default();
    Ok(())
}

/// Keep the previous repository webhook's identity on the new workflow.
fn carry_repository_webhook(workflow: &mut Workflow, legacy: &NodeHook) {
    let name = workflow.name.clone();
    let mut config = legacy.config.clone();
    config.insert(HOOK_CONFIG_WORKFLOW, HookConfigValue::fixed(name));

    match workflow
        .root
        .hooks
        .iter_mut()
        .find(|h| h.hook_model_name == legacy.hook_model_name)
    {
        Some(hook) => {
            debug!(uuid = ?legacy.uuid, "reusing repository webhook");
            hook.uuid = legacy.uuid;
            hook.config = config;
        }
        None => {
            debug!(uuid = ?legacy.uuid, "restoring repository webhook");
            workflow.root.hooks.push(NodeHook {
                uuid: legacy.uuid,
                hook_model_name: legacy.hook_model_name.clone(),
                hook_model_id: legacy.hook_model_id,
                config,
            });
        }
    }
}

/// Attach the canonical repository webhook unless the root already has one.
///
/// Any repository webhook counts, not only one with the canonical reference,
/// so a customised hook declared in the files is never doubled.
fn ensure_repository_webhook(workflow: &mut Workflow) {
    let hook = NodeHook::from_model(&repository_webhook_model());
    let reference = hook.reference();
    let present = workflow
        .root
        .hooks
        .iter()
        .any(|h| h.is_repository_webhook() || h.reference() == reference);
    if !present {
        debug!(workflow = %workflow.name, "adding default repository webhook");
        workflow.root.hooks.push(hook);
    }
}

/// Default run payload of the root node.
///
/// When the root application is linked to a repository and the payload does
/// not name a branch yet, fills in the branch and the repository.
pub fn default_payload(workflow: &Workflow, default_branch: Option<&str>) -> BTreeMap<String, String> {
    let mut payload = workflow.root.context.default_payload.clone();
    let Some(app) = workflow
        .root_application()
        .filter(|a| !a.repository_fullname.is_empty())
    else {
        return payload;
    };
    if payload.get(GIT_BRANCH).is_some_and(|b| !b.is_empty()) {
        return payload;
    }
    let branch = default_branch
        .filter(|b| !b.is_empty())
        .unwrap_or(FALLBACK_BRANCH);
    payload.insert(GIT_BRANCH.to_string(), branch.to_string());
    payload.insert(GIT_REPOSITORY.to_string(), app.repository_fullname.clone());
    payload
}
