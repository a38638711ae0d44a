//! The workflow graph: a tree of pipeline nodes rooted at a single node that
//! carries the workflow's hooks and run context.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::hook::NodeHook;
use crate::types::{Application, Environment, Permission, Pipeline, ProjectKey};

/// Run context of a node: which application / environment it runs against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeContext {
    #[serde(default)]
    pub application_id: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub application_name: String,
    #[serde(default)]
    pub environment_id: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub environment_name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub default_payload: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub name: String,
    pub pipeline_name: String,
    #[serde(default)]
    pub pipeline_id: i64,
    #[serde(default)]
    pub context: NodeContext,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hooks: Vec<NodeHook>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<Node>,
}

impl Node {
    pub fn new(name: impl Into<String>, pipeline_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pipeline_name: pipeline_name.into(),
            ..Default::default()
        }
    }

    /// Depth-first, parent-before-children.
    pub fn nodes(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a Node>) {
        out.push(self);
        for child in &self.triggers {
            child.collect(out);
        }
    }

    /// Visit every node mutably in the same order as [`Node::nodes`].
    pub fn visit_mut(&mut self, f: &mut impl FnMut(&mut Node)) {
        f(self);
        for child in &mut self.triggers {
            child.visit_mut(f);
        }
    }
}

/// The versioned pipeline graph owned by a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub project_id: i64,
    #[serde(default)]
    pub project_key: ProjectKey,
    pub root: Node,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub applications: BTreeMap<i64, Application>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pipelines: BTreeMap<i64, Pipeline>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environments: BTreeMap<i64, Environment>,
    /// Group name → permission.
    #[serde(default)]
    pub groups: BTreeMap<String, Permission>,
    /// Fetch URL of the repository this workflow was imported from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_repository: Option<String>,
    /// Set when imported from a branch other than the repository default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derivation_branch: Option<String>,
}

impl Workflow {
    pub fn application(&self, id: i64) -> Option<&Application> {
        self.applications.get(&id)
    }

    /// Root application, when the root node has an application context.
    pub fn root_application(&self) -> Option<&Application> {
        match self.root.context.application_id {
            0 => None,
            id => self.applications.get(&id),
        }
    }

    pub fn is_from_repository(&self) -> bool {
        self.from_repository.as_deref().is_some_and(|s| !s.is_empty())
    }

    /// The first repository webhook of the root node.
    pub fn repository_webhook(&self) -> Option<&crate::hook::NodeHook> {
        self.root.hooks.iter().find(|h| h.is_repository_webhook())
    }
}
