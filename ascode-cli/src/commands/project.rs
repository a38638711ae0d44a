//! `ascode project add <key>` and `ascode project list`

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use ascode_core::{registry, Permission, ProjectGroup, ProjectKey};

/// Manage projects within the registry.
#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// List all registered projects.
    List,

    /// Register a new project.
    Add(AddArgs),
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Project key (e.g. "ACME").
    pub key: String,

    /// Group permission, as `name=perm` (4 read, 5 read-execute, 7 read-write-execute).
    /// Workflows imported without groups inherit these.
    #[arg(long = "group", short = 'g', value_name = "NAME=PERM", value_parser = parse_group)]
    pub groups: Vec<ProjectGroup>,
}

fn parse_group(raw: &str) -> Result<ProjectGroup> {
    let (group, perm) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected NAME=PERM, got '{raw}'"))?;
    if group.is_empty() {
        return Err(anyhow!("group name must not be empty"));
    }
    let level: u8 = perm
        .parse()
        .with_context(|| format!("invalid permission '{perm}'"))?;
    Ok(ProjectGroup {
        group: group.to_string(),
        permission: Permission(level),
    })
}

pub fn run(cmd: ProjectCommand, root: &Path) -> Result<()> {
    match cmd {
        ProjectCommand::List => list(root),
        ProjectCommand::Add(args) => add(args, root),
    }
}

#[derive(Tabled)]
struct ProjectRow {
    #[tabled(rename = "key")]
    key: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "applications")]
    applications: usize,
    #[tabled(rename = "pipelines")]
    pipelines: usize,
    #[tabled(rename = "environments")]
    environments: usize,
    #[tabled(rename = "workflows")]
    workflows: usize,
}

fn list(root: &Path) -> Result<()> {
    let projects = registry::list_projects_at(root).context("failed to load registry")?;

    if projects.is_empty() {
        println!("No projects registered.");
        println!("Run: ascode project add <key>");
        return Ok(());
    }

    let mut rows = Vec::with_capacity(projects.len());
    for project in &projects {
        let workflows = registry::list_workflows_at(root, &project.key)
            .with_context(|| format!("failed to list workflows of {}", project.key))?;
        rows.push(ProjectRow {
            key: project.key.to_string(),
            name: project.name.clone(),
            applications: project.applications.len(),
            pipelines: project.pipelines.len(),
            environments: project.environments.len(),
            workflows: workflows.len(),
        });
    }

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

fn add(args: AddArgs, root: &Path) -> Result<()> {
    let key = ProjectKey::from(args.key);
    let project = registry::init_project_at(root, key.clone(), args.groups)
        .with_context(|| format!("failed to add project '{key}'"))?;

    println!("{} Added project '{}' (id {})", "✓".green(), project.key, project.id);
    Ok(())
}
