//! Dry-run unified diff between a stored workflow and its next version.

use similar::TextDiff;

use ascode_core::Workflow;

use crate::error::SyncError;

/// A workflow whose stored YAML would change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowDiff {
    pub workflow: String,
    pub unified_diff: String,
}

/// Compare the YAML of `previous` (empty when absent) with `next`.
///
/// Returns `None` when nothing would change.
pub fn workflow_diff(
    previous: Option<&Workflow>,
    next: &Workflow,
) -> Result<Option<WorkflowDiff>, SyncError> {
    let old = match previous {
        Some(w) => serde_yaml::to_string(w)?,
        None => String::new(),
    };
    let new = serde_yaml::to_string(next)?;
    if old == new {
        return Ok(None);
    }

    let old_name = previous.map(|w| w.name.as_str()).unwrap_or(next.name.as_str());
    let old_header = format!("a/{old_name}.yaml");
    let new_header = format!("b/{}.yaml", next.name);
    let unified = TextDiff::from_lines(&old, &new)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string();

    Ok(Some(WorkflowDiff {
        workflow: next.name.clone(),
        unified_diff: unified,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ascode_core::Node;

    fn workflow(description: &str) -> Workflow {
        Workflow {
            name: "release".to_string(),
            description: description.to_string(),
            root: Node::new("build", "build"),
            ..Default::default()
        }
    }

    #[test]
    fn identical_workflows_have_no_diff() {
        let w = workflow("same");
        assert!(workflow_diff(Some(&w), &w).expect("diff").is_none());
    }

    #[test]
    fn changed_field_shows_in_unified_diff() {
        let diff = workflow_diff(Some(&workflow("old")), &workflow("new"))
            .expect("diff")
            .expect("some diff");
        assert!(diff.unified_diff.contains("--- a/release.yaml"));
        assert!(diff.unified_diff.contains("+++ b/release.yaml"));
        assert!(diff.unified_diff.contains("-description: old"));
        assert!(diff.unified_diff.contains("+description: new"));
    }

    #[test]
    fn new_workflow_is_all_additions() {
        let diff = workflow_diff(None, &workflow("fresh"))
            .expect("diff")
            .expect("some diff");
        assert!(diff.unified_diff.contains("+name: release"));
        assert!(!diff.unified_diff.lines().any(|l| l.starts_with("-name")));
    }
}
