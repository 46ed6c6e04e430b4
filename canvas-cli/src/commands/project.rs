//! `canvas project ...`: every subcommand acts on behalf of `--as <user>`.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use canvas_core::{NodeId, Project, ProjectCreate, ProjectId, ProjectUpdate, UserId};
use canvas_store::Store;

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Create a project with its root node and storage folder.
    Create(CreateArgs),

    /// List projects owned by a user.
    List(ListArgs),

    /// Show a single project.
    Show(ShowArgs),

    /// Change a project's name, description or metadata.
    Update(UpdateArgs),

    /// Delete a project, its root node and its storage folder.
    Delete(DeleteArgs),

    /// Find the project anchored on a root node.
    ByNode(ByNodeArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    pub name: String,

    /// Acting user; becomes the owner.
    #[arg(long = "as", value_name = "USER")]
    pub initiator: String,

    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// Metadata entry, repeatable.
    #[arg(long = "meta", value_name = "KEY=VALUE", value_parser = parse_meta)]
    pub metadata: Vec<(String, String)>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(long = "as", value_name = "USER")]
    pub initiator: String,

    /// Owner whose projects to list. Defaults to the acting user.
    #[arg(long)]
    pub owner: Option<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub id: String,

    #[arg(long = "as", value_name = "USER")]
    pub initiator: String,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    pub id: String,

    #[arg(long = "as", value_name = "USER")]
    pub initiator: String,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// Replaces the whole metadata map when given at least once.
    #[arg(long = "meta", value_name = "KEY=VALUE", value_parser = parse_meta)]
    pub metadata: Vec<(String, String)>,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    pub id: String,

    #[arg(long = "as", value_name = "USER")]
    pub initiator: String,
}

#[derive(Args, Debug)]
pub struct ByNodeArgs {
    pub node: String,

    /// Acting user. Without it the lookup skips the ownership check.
    #[arg(long = "as", value_name = "USER")]
    pub initiator: Option<String>,

    #[arg(long)]
    pub json: bool,
}

pub async fn run(store: &Store, cmd: ProjectCommand) -> Result<()> {
    match cmd {
        ProjectCommand::Create(args) => create(store, args).await,
        ProjectCommand::List(args) => list(store, args).await,
        ProjectCommand::Show(args) => show(store, args).await,
        ProjectCommand::Update(args) => update(store, args).await,
        ProjectCommand::Delete(args) => delete(store, args).await,
        ProjectCommand::ByNode(args) => by_node(store, args).await,
    }
}

async fn create(store: &Store, args: CreateArgs) -> Result<()> {
    let initiator = UserId::from(args.initiator);
    let fields = ProjectCreate {
        name: args.name,
        description: args.description,
        metadata: args.metadata.into_iter().collect(),
    };
    let project = store
        .project_service()
        .create(&initiator, fields)
        .await
        .with_context(|| format!("failed to create project as '{initiator}'"))?;

    println!("✓ Created project '{}' ({})", project.name, project.id);
    println!("  Root node: {}", project.core_node_id);
    println!(
        "  Folder:    {}",
        canvas_store::paths::files_root(store.root())
            .join(project.owner_id.as_str())
            .join(project.id.as_str())
            .display()
    );
    Ok(())
}

async fn list(store: &Store, args: ListArgs) -> Result<()> {
    let initiator = UserId::from(args.initiator);
    let owner = args.owner.map(UserId::from).unwrap_or_else(|| initiator.clone());
    let mut projects = store
        .project_service()
        .list_by_owner(&initiator, &owner)
        .await
        .with_context(|| format!("failed to list projects of '{owner}'"))?;
    projects.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&projects)?);
        return Ok(());
    }
    if projects.is_empty() {
        println!("No projects owned by '{owner}'.");
        return Ok(());
    }

    println!("{}", owner.as_str().to_uppercase().bold());
    let rows: Vec<ProjectRow> = projects.iter().map(ProjectRow::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

async fn show(store: &Store, args: ShowArgs) -> Result<()> {
    let initiator = UserId::from(args.initiator);
    let id = ProjectId::from(args.id);
    let project = store
        .project_service()
        .get_for_owner(&initiator, &id)
        .await
        .with_context(|| format!("failed to load project '{id}'"))?;
    print_project(&project, args.json)
}

async fn update(store: &Store, args: UpdateArgs) -> Result<()> {
    let initiator = UserId::from(args.initiator);
    let id = ProjectId::from(args.id);
    let changes = ProjectUpdate {
        name: args.name,
        description: args.description,
        metadata: (!args.metadata.is_empty())
            .then(|| args.metadata.into_iter().collect::<BTreeMap<_, _>>()),
    };
    if changes.is_empty() {
        anyhow::bail!("nothing to update; pass --name, --description or --meta");
    }

    store
        .project_service()
        .update(&initiator, &id, changes)
        .await
        .with_context(|| format!("failed to update project '{id}'"))?;
    println!("✓ Updated project '{id}'");
    Ok(())
}

async fn delete(store: &Store, args: DeleteArgs) -> Result<()> {
    let initiator = UserId::from(args.initiator);
    let id = ProjectId::from(args.id);
    store
        .project_service()
        .delete(&initiator, &id)
        .await
        .with_context(|| format!("failed to delete project '{id}'"))?;
    println!("✓ Deleted project '{id}'");
    Ok(())
}

async fn by_node(store: &Store, args: ByNodeArgs) -> Result<()> {
    let node = NodeId::from(args.node);
    let service = store.project_service();
    let project = match args.initiator.map(UserId::from) {
        Some(initiator) => service.get_for_owner_by_root_node(&initiator, &node).await,
        None => service.get_by_root_node(&node).await,
    }
    .with_context(|| format!("failed to find project for node '{node}'"))?;
    print_project(&project, args.json)
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Tabled)]
struct ProjectRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "root node")]
    node: String,
    #[tabled(rename = "created")]
    created: String,
}

impl From<&Project> for ProjectRow {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id.to_string(),
            name: project.name.clone(),
            node: project.core_node_id.to_string(),
            created: project.created_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

fn print_project(project: &Project, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(project)?);
        return Ok(());
    }
    println!("{} {}", project.name.bold(), format!("({})", project.id).dimmed());
    println!("  owner:     {}", project.owner_id);
    println!("  root node: {}", project.core_node_id);
    if let Some(description) = &project.description {
        println!("  about:     {description}");
    }
    for (key, value) in &project.metadata {
        println!("  {key}: {value}");
    }
    Ok(())
}

fn parse_meta(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_owned(), value.to_owned()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}
