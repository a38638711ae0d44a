//! Workflow validation against the owning project.

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use ascode_core::{
    Application, Environment, HookModel, Message, MessageId, Pipeline, Project, Workflow,
};

/// How much of the referenced entities validation loads into the workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Load pipeline stages and jobs, not only names and ids.
    pub deep_pipeline: bool,
}

#[derive(Debug, Error)]
#[error("{reason}")]
pub struct ValidationError {
    pub reason: String,
    pub message: Option<Message>,
}

impl ValidationError {
    pub fn new(workflow: &str, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            message: Some(Message::with_args(
                MessageId::WorkflowInvalid,
                [workflow.to_string(), reason.clone()],
            )),
            reason,
        }
    }
}

/// Checks a parsed workflow and resolves its references in place.
#[async_trait]
pub trait WorkflowValidator: Send + Sync {
    async fn validate(
        &self,
        workflow: &mut Workflow,
        project: &Project,
        opts: LoadOptions,
    ) -> Result<(), ValidationError>;
}

/// Resolves application, pipeline and environment names against the
/// project's own entities.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectValidator;

#[async_trait]
impl WorkflowValidator for ProjectValidator {
    async fn validate(
        &self,
        workflow: &mut Workflow,
        project: &Project,
        opts: LoadOptions,
    ) -> Result<(), ValidationError> {
        resolve(workflow, project, opts)
    }
}

fn resolve(workflow: &mut Workflow, project: &Project, opts: LoadOptions) -> Result<(), ValidationError> {
    let name = workflow.name.clone();

    if let Some(hook) = workflow
        .root
        .hooks
        .iter()
        .find(|h| HookModel::builtin(&h.hook_model_name).is_none())
    {
        return Err(ValidationError::new(
            &name,
            format!("unknown hook model {}", hook.hook_model_name),
        ));
    }

    let mut applications: BTreeMap<i64, Application> = BTreeMap::new();
    let mut pipelines: BTreeMap<i64, Pipeline> = BTreeMap::new();
    let mut environments: BTreeMap<i64, Environment> = BTreeMap::new();
    let mut failure: Option<String> = None;

    workflow.root.visit_mut(&mut |node| {
        if failure.is_some() {
            return;
        }
        let Some(pipeline) = project.pipeline(&node.pipeline_name) else {
            failure = Some(format!(
                "pipeline {} not found in project {}",
                node.pipeline_name, project.key
            ));
            return;
        };
        node.pipeline_id = pipeline.id;
        pipelines.entry(pipeline.id).or_insert_with(|| {
            if opts.deep_pipeline {
                pipeline.clone()
            } else {
                Pipeline {
                    id: pipeline.id,
                    name: pipeline.name.clone(),
                    stages: vec![],
                }
            }
        });

        let ctx = &mut node.context;
        if !ctx.application_name.is_empty() {
            let Some(app) = project.application(&ctx.application_name) else {
                failure = Some(format!(
                    "application {} not found in project {}",
                    ctx.application_name, project.key
                ));
                return;
            };
            ctx.application_id = app.id;
            applications.entry(app.id).or_insert_with(|| Application {
                repository_strategy: app.repository_strategy.without_secrets(),
                ..app.clone()
            });
        }
        if !ctx.environment_name.is_empty() {
            let Some(env) = project.environment(&ctx.environment_name) else {
                failure = Some(format!(
                    "environment {} not found in project {}",
                    ctx.environment_name, project.key
                ));
                return;
            };
            ctx.environment_id = env.id;
            environments.entry(env.id).or_insert_with(|| env.clone());
        }
    });

    if let Some(reason) = failure {
        return Err(ValidationError::new(&name, reason));
    }
    workflow.applications = applications;
    workflow.pipelines = pipelines;
    workflow.environments = environments;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ascode_core::types::{Job, Stage};
    use ascode_core::{Node, NodeHook, ProjectKey, Secret};

    fn project() -> Project {
        let mut api = Application {
            id: 10,
            name: "api".to_string(),
            ..Default::default()
        };
        api.repository_strategy.password = Secret::new("hunter2");
        Project {
            id: 1,
            key: ProjectKey::from("ACME"),
            applications: vec![api],
            pipelines: vec![Pipeline {
                id: 20,
                name: "build".to_string(),
                stages: vec![Stage {
                    name: "compile".to_string(),
                    jobs: vec![Job {
                        name: "make".to_string(),
                        steps: vec!["make".to_string()],
                    }],
                }],
            }],
            environments: vec![Environment {
                id: 30,
                name: "prod".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn workflow() -> Workflow {
        let mut root = Node::new("build", "build");
        root.context.application_name = "api".to_string();
        root.context.environment_name = "prod".to_string();
        Workflow {
            name: "release".to_string(),
            root,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn resolves_references() {
        let mut w = workflow();
        ProjectValidator
            .validate(&mut w, &project(), LoadOptions::default())
            .await
            .expect("valid");
        assert_eq!(w.root.pipeline_id, 20);
        assert_eq!(w.root.context.application_id, 10);
        assert_eq!(w.root.context.environment_id, 30);
        assert!(w.pipelines[&20].stages.is_empty());
        assert!(w.applications[&10].repository_strategy.password.is_empty());
    }

    #[tokio::test]
    async fn deep_load_keeps_stages() {
        let mut w = workflow();
        ProjectValidator
            .validate(&mut w, &project(), LoadOptions { deep_pipeline: true })
            .await
            .expect("valid");
        assert_eq!(w.pipelines[&20].stages.len(), 1);
    }

    #[tokio::test]
    async fn unknown_pipeline_carries_message() {
        let mut w = workflow();
        w.root.pipeline_name = "deploy".to_string();
        let err = ProjectValidator
            .validate(&mut w, &project(), LoadOptions::default())
            .await
            .unwrap_err();
        assert!(err.reason.contains("pipeline deploy not found"));
        assert_eq!(err.message.map(|m| m.id), Some(MessageId::WorkflowInvalid));
    }

    #[tokio::test]
    async fn unknown_hook_model_is_rejected() {
        let mut w = workflow();
        w.root.hooks.push(NodeHook {
            uuid: None,
            hook_model_name: "Kafka".to_string(),
            hook_model_id: 0,
            config: Default::default(),
        });
        let err = ProjectValidator
            .validate(&mut w, &project(), LoadOptions::default())
            .await
            .unwrap_err();
        assert!(err.reason.contains("Kafka"));
    }
}
