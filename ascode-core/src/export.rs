//! Exported entities: the YAML files a repository carries under `.cds/`.
//!
//! ```yaml
//! version: v1.0
//! name: api-release
//! workflow:
//!   build:
//!     pipeline: build
//!     application: api
//!   deploy:
//!     pipeline: deploy
//!     application: api
//!     environment: production
//!     depends_on: [build]
//! hooks:
//!   build:
//!   - type: RepositoryWebHook
//! permissions:
//!   devs: 7
//! ```
//!
//! A single-pipeline workflow can use the short form instead of the
//! `workflow` block: `pipeline`, `application` and `environment` at the top
//! level.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::ExportError;
use crate::hook::{HookConfig, HookConfigValue, HookModel, NodeHook};
use crate::types::{
    Application, Environment, Job, Permission, Pipeline, RepositoryStrategy, Stage,
};
use crate::workflow::{Node, NodeContext, Workflow};

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeExport {
    pub pipeline: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookExport {
    #[serde(rename = "type")]
    pub model: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowExport {
    #[serde(default)]
    pub version: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub workflow: BTreeMap<String, NodeExport>,
    /// Node name → hooks. Only the root node may carry hooks.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hooks: BTreeMap<String, Vec<HookExport>>,
    /// Group name → permission.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub permissions: BTreeMap<String, Permission>,
    /// Default run payload of the root node.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub payload: BTreeMap<String, String>,
}

impl WorkflowExport {
    /// Build the workflow graph. Application, pipeline and environment
    /// references are kept by name; resolving them to ids is the validator's job.
    pub fn to_workflow(&self) -> Result<Workflow, ExportError> {
        let nodes = self.normalized_nodes()?;
        let root_name = self.root_name(&nodes)?;

        let mut children: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (name, node) in &nodes {
            match node.depends_on.as_slice() {
                [] => {}
                [parent] => {
                    if !nodes.contains_key(parent) {
                        return Err(ExportError::UnknownParent {
                            workflow: self.name.clone(),
                            node: name.clone(),
                            parent: parent.clone(),
                        });
                    }
                    children.entry(parent.as_str()).or_default().push(name.as_str());
                }
                _ => {
                    return Err(ExportError::Join {
                        workflow: self.name.clone(),
                        node: name.clone(),
                    })
                }
            }
        }

        let mut visited = BTreeSet::new();
        let mut root = build_node(&root_name, &nodes, &children, &mut visited);

        let unreachable: Vec<String> = nodes
            .keys()
            .filter(|n| !visited.contains(n.as_str()))
            .cloned()
            .collect();
        if !unreachable.is_empty() {
            return Err(ExportError::Unreachable {
                workflow: self.name.clone(),
                nodes: unreachable,
            });
        }

        for (node, hooks) in &self.hooks {
            if !nodes.contains_key(node) {
                return Err(ExportError::UnknownHookNode {
                    workflow: self.name.clone(),
                    node: node.clone(),
                });
            }
            if *node != root_name {
                return Err(ExportError::HookOnChild {
                    workflow: self.name.clone(),
                    node: node.clone(),
                });
            }
            root.hooks.extend(hooks.iter().map(HookExport::to_hook));
        }
        root.context.default_payload = self.payload.clone();

        Ok(Workflow {
            name: self.name.clone(),
            description: self.description.clone(),
            root,
            groups: self.permissions.clone(),
            ..Default::default()
        })
    }

    fn normalized_nodes(&self) -> Result<BTreeMap<String, NodeExport>, ExportError> {
        let short_form = self.pipeline.is_some()
            || self.application.is_some()
            || self.environment.is_some();

        if short_form && !self.workflow.is_empty() {
            return Err(ExportError::MixedForms {
                workflow: self.name.clone(),
            });
        }

        if short_form {
            let pipeline = self
                .pipeline
                .clone()
                .filter(|p| !p.is_empty())
                .ok_or_else(|| ExportError::Empty {
                    workflow: self.name.clone(),
                })?;
            let node = NodeExport {
                pipeline: pipeline.clone(),
                application: self.application.clone(),
                environment: self.environment.clone(),
                depends_on: vec![],
            };
            return Ok(BTreeMap::from([(pipeline, node)]));
        }

        if self.workflow.is_empty() {
            return Err(ExportError::Empty {
                workflow: self.name.clone(),
            });
        }
        if let Some((name, _)) = self.workflow.iter().find(|(_, n)| n.pipeline.is_empty()) {
            return Err(ExportError::MissingPipeline {
                workflow: self.name.clone(),
                node: name.clone(),
            });
        }
        Ok(self.workflow.clone())
    }

    fn root_name(&self, nodes: &BTreeMap<String, NodeExport>) -> Result<String, ExportError> {
        let roots: Vec<String> = nodes
            .iter()
            .filter(|(_, n)| n.depends_on.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        match roots.len() {
            0 => Err(ExportError::NoRoot {
                workflow: self.name.clone(),
            }),
            1 => Ok(roots.into_iter().next().unwrap_or_default()),
            _ => Err(ExportError::MultipleRoots {
                workflow: self.name.clone(),
                nodes: roots,
            }),
        }
    }
}

fn build_node<'a>(
    name: &'a str,
    nodes: &'a BTreeMap<String, NodeExport>,
    children: &BTreeMap<&'a str, Vec<&'a str>>,
    visited: &mut BTreeSet<&'a str>,
) -> Node {
    visited.insert(name);
    let export = &nodes[name];
    let mut node = Node {
        name: name.to_string(),
        pipeline_name: export.pipeline.clone(),
        context: NodeContext {
            application_name: export.application.clone().unwrap_or_default(),
            environment_name: export.environment.clone().unwrap_or_default(),
            ..Default::default()
        },
        ..Default::default()
    };
    for child in children.get(name).into_iter().flatten() {
        if visited.contains(child) {
            continue;
        }
        node.triggers
            .push(build_node(child, nodes, children, visited));
    }
    node
}

impl HookExport {
    /// Built-in models get their id and any default configuration the file left out.
    pub fn to_hook(&self) -> NodeHook {
        let model = HookModel::builtin(&self.model);
        let defaults = model
            .as_ref()
            .map(|m| m.default_config.clone())
            .unwrap_or_default();

        let mut config: HookConfig = self
            .config
            .iter()
            .map(|(k, v)| {
                let configurable = defaults.get(k).map(|d| d.configurable).unwrap_or(true);
                (
                    k.clone(),
                    HookConfigValue {
                        value: v.clone(),
                        configurable,
                    },
                )
            })
            .collect();
        config.fill_missing(&defaults);

        NodeHook {
            uuid: None,
            hook_model_name: self.model.clone(),
            hook_model_id: model.map(|m| m.id).unwrap_or_default(),
            config,
        }
    }
}

// ---------------------------------------------------------------------------
// Application / pipeline / environment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationExport {
    #[serde(default)]
    pub version: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vcs_server: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repo: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub connection_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ssh_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,
}

impl ApplicationExport {
    pub fn to_application(&self) -> Application {
        Application {
            id: 0,
            name: self.name.clone(),
            vcs_server: self.vcs_server.clone(),
            repository_fullname: self.repo.clone(),
            repository_strategy: RepositoryStrategy {
                connection_type: self.connection_type.clone(),
                ssh_key: self.ssh_key.clone(),
                user: self.user.clone(),
                ..Default::default()
            },
            variables: self.variables.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobExport {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageExport {
    pub name: String,
    #[serde(default)]
    pub jobs: Vec<JobExport>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineExport {
    #[serde(default)]
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub stages: Vec<StageExport>,
}

impl PipelineExport {
    pub fn to_pipeline(&self) -> Pipeline {
        Pipeline {
            id: 0,
            name: self.name.clone(),
            stages: self
                .stages
                .iter()
                .map(|s| Stage {
                    name: s.name.clone(),
                    jobs: s
                        .jobs
                        .iter()
                        .map(|j| Job {
                            name: j.name.clone(),
                            steps: j.steps.clone(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentExport {
    #[serde(default)]
    pub version: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,
}

impl EnvironmentExport {
    pub fn to_environment(&self) -> Environment {
        Environment {
            id: 0,
            name: self.name.clone(),
            variables: self.variables.clone(),
        }
    }
}
