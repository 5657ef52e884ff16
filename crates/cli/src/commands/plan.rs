//! Plan Commands

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use conveyor_common::deps::{dependency_rows, filter_plan_deps, DependencyRow};
use conveyor_common::plan_ref::parse_resource_ids;
use conveyor_common::{
    allowed_actions, available_zone_names, normalize_update_value, ConveyorApi, D3Graph,
    DependencyMap, NormalizedResource, PanelConfig, Plan, PlanType, RowAction, SearchOpts,
    SortDir,
};
use serde::Serialize;
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::output::{
    format_timestamp, print_item, print_list, print_message, print_warning, render_structured,
    OutputFormat, TableDisplay,
};

fn parse_plan_type(s: &str) -> std::result::Result<PlanType, String> {
    s.parse::<PlanType>().map_err(|e| e.to_string())
}

fn parse_sort_dir(s: &str) -> std::result::Result<SortDir, String> {
    match s {
        "asc" => Ok(SortDir::Asc),
        "desc" => Ok(SortDir::Desc),
        other => Err(format!("unknown sort direction '{}'", other)),
    }
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// List plans, one page at a time
    List(ListArgs),

    /// Show plan details
    Show {
        /// Plan ID
        plan_id: String,
    },

    /// Create a plan from resource ids
    Create {
        /// Plan type (clone, migrate)
        #[arg(short = 't', long = "type", value_parser = parse_plan_type)]
        plan_type: PlanType,

        /// Resources as `TYPE*id1,id2**TYPE*id3`
        #[arg(long)]
        ids: String,

        /// Plan level; defaults to the configured one
        #[arg(long)]
        level: Option<String>,
    },

    /// Delete a plan
    Delete {
        /// Plan ID
        plan_id: String,
    },

    /// Show a plan's resource dependencies
    Deps(GraphArgs),

    /// Print the topology graph of a plan
    Topology(GraphArgs),

    /// Clone a plan to an availability zone
    Clone {
        /// Plan ID
        plan_id: String,

        /// Target availability zone
        #[arg(long)]
        az: String,

        /// Clone system volumes
        #[arg(long)]
        sys_clone: bool,

        /// Resource edits to apply first (JSON, `-` for stdin)
        #[arg(long)]
        resources: Option<PathBuf>,
    },

    /// Migrate a plan to an availability zone
    Migrate {
        /// Plan ID
        plan_id: String,

        /// Target availability zone
        #[arg(long)]
        az: String,
    },

    /// Apply resource edits to a plan
    Update {
        /// Plan ID
        plan_id: String,

        /// Resource edits (JSON, `-` for stdin)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Download a plan's template as YAML
    Export {
        /// Plan ID
        plan_id: String,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Create a plan from a template file (YAML or JSON)
    Import {
        /// Template file, `-` for stdin
        file: PathBuf,
    },

    /// Create an incremental plan from a finished one
    Increment {
        /// Source plan ID
        plan_id: String,

        /// Plan type of the new plan; defaults to the source's
        #[arg(short = 't', long = "type", value_parser = parse_plan_type)]
        plan_type: Option<PlanType>,
    },

    /// Generate the template of an initiating plan
    GenerateTemplate {
        /// Plan ID
        plan_id: String,
    },

    /// List availability zones
    Zones {
        /// Also show the zones a plan's resources live in
        #[arg(long)]
        plan: Option<String>,
    },
}

#[derive(Args)]
pub struct ListArgs {
    /// Continue after this plan id
    #[arg(long)]
    pub marker: Option<String>,

    /// Sort direction (asc, desc)
    #[arg(long, default_value = "desc", value_parser = parse_sort_dir)]
    pub sort_dir: SortDir,

    /// Only plans whose name contains this text
    #[arg(long)]
    pub filter: Option<String>,
}

#[derive(Args)]
pub struct GraphArgs {
    /// Plan ID
    pub plan_id: String,

    /// Plan type; looked up when omitted
    #[arg(short = 't', long = "type", value_parser = parse_plan_type)]
    pub plan_type: Option<PlanType>,

    /// Restrict to this resource and what it depends on
    #[arg(long)]
    pub focal: Option<String>,
}

/// Plan display wrapper for serialization
#[derive(Debug, Serialize)]
pub struct PlanDisplay {
    pub plan_id: String,
    pub name: String,
    pub plan_type: String,
    pub status: String,
    pub task_status: String,
    pub created_at: Option<String>,
    pub actions: Vec<RowAction>,
}

impl From<Plan> for PlanDisplay {
    fn from(plan: Plan) -> Self {
        Self {
            actions: allowed_actions(&plan),
            name: plan.display_name().to_string(),
            task_status: plan.task_display().to_string(),
            status: plan.plan_status.display().to_string(),
            plan_type: plan.plan_type.to_string(),
            created_at: plan.created_at,
            plan_id: plan.plan_id,
        }
    }
}

impl TableDisplay for PlanDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Name", "Type", "Status", "Task", "Created", "Actions"]
    }

    fn row(&self) -> Vec<String> {
        let actions: Vec<&str> = self.actions.iter().map(|a| a.verbose_name()).collect();
        vec![
            self.plan_id.clone(),
            self.name.clone(),
            self.plan_type.clone(),
            self.status.clone(),
            self.task_status.clone(),
            format_timestamp(self.created_at.as_deref()),
            actions.join(", "),
        ]
    }
}

impl TableDisplay for DependencyRow {
    fn headers() -> Vec<&'static str> {
        vec!["Resource", "Type", "Name", "Depends On", "Action"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.res_id.clone(),
            self.res_type.short_name().to_string(),
            self.name.clone(),
            self.dependencies.join(", "),
            self.action.map(|a| a.to_string()).unwrap_or_default(),
        ]
    }
}

#[derive(Debug, Serialize)]
pub struct ZoneDisplay {
    pub zone: String,
    pub available: bool,
    pub source: bool,
}

impl TableDisplay for ZoneDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Zone", "Available", "Plan Source"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.zone.clone(),
            self.available.to_string(),
            if self.source { "yes".to_string() } else { String::new() },
        ]
    }
}

/// Reads a file, or stdin for `-`.
fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn read_resources(path: &Path) -> Result<Vec<NormalizedResource>> {
    let text = read_input(path)?;
    let resources = normalize_update_value("resources", Some(Value::String(text)))?;
    debug!(count = resources.len(), "normalized resource edits");
    Ok(resources)
}

/// Parses a template document; YAML covers JSON too.
pub fn parse_template(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        bail!("plan template is empty");
    }
    let template: Value = serde_yaml::from_str(text).context("parsing plan template")?;
    if !template.is_object() {
        bail!("plan template must be a mapping");
    }
    Ok(template)
}

async fn plan_type_of(api: &dyn ConveyorApi, plan_id: &str, given: Option<PlanType>) -> Result<PlanType> {
    match given {
        Some(plan_type) => Ok(plan_type),
        None => Ok(api.plan_get_brief(plan_id).await?.plan_type),
    }
}

/// Loads a plan's dependency map, sliced to `focal` when given.
pub async fn load_deps(api: &dyn ConveyorApi, args: &GraphArgs) -> Result<DependencyMap> {
    let plan_type = plan_type_of(api, &args.plan_id, args.plan_type).await?;
    let deps = filter_plan_deps(
        api,
        &args.plan_id,
        plan_type,
        DependencyMap::new(),
        args.focal.as_deref(),
    )
    .await?;
    Ok(deps)
}

/// Lists one page of plans, applying the name filter locally.
pub async fn list_plans(api: &dyn ConveyorApi, args: &ListArgs) -> Result<(Vec<PlanDisplay>, bool, bool)> {
    let opts = SearchOpts {
        marker: args.marker.clone(),
        sort_dir: args.sort_dir,
        ..Default::default()
    };
    let page = api.plan_list(&opts).await?;
    let plans = match args.filter.as_deref() {
        Some(filter) => conveyor_common::actions::filter_plans_by_name(page.plans, filter),
        None => page.plans,
    };
    Ok((
        plans.into_iter().map(PlanDisplay::from).collect(),
        page.has_more,
        page.has_prev,
    ))
}

/// Zones usable as destinations, flagging those the plan's resources live in.
pub async fn list_zones(api: &dyn ConveyorApi, plan_id: Option<&str>) -> Result<Vec<ZoneDisplay>> {
    let zones = api.availability_zone_list().await?;
    let source = match plan_id {
        Some(id) => api.list_plan_resource_availability_zones(id).await?,
        None => Vec::new(),
    };
    let available = available_zone_names(&zones);

    let mut out: Vec<ZoneDisplay> = Vec::new();
    for zone in &zones {
        if out.iter().any(|z| z.zone == zone.zone_name) {
            continue;
        }
        out.push(ZoneDisplay {
            zone: zone.zone_name.clone(),
            available: available.contains(&zone.zone_name),
            source: source.contains(&zone.zone_name),
        });
    }
    Ok(out)
}

/// Generates the template of an initiating plan; returns the plan type used.
pub async fn generate_template(api: &dyn ConveyorApi, plan_id: &str) -> Result<PlanType> {
    let plan = api.plan_get_brief(plan_id).await?;
    if !RowAction::GenerateTemplate.allowed(&plan) {
        bail!(
            "plan {} is {}, templates are generated while initiating",
            plan_id,
            plan.plan_status
        );
    }
    match plan.plan_type {
        PlanType::Clone => api.export_clone_template(plan_id, plan.sys_clone).await?,
        PlanType::Migrate => api.export_migrate_template(plan_id).await?,
    }
    Ok(plan.plan_type)
}

pub async fn execute(
    cmd: PlanCommands,
    api: &dyn ConveyorApi,
    config: &PanelConfig,
    format: OutputFormat,
) -> Result<()> {
    match cmd {
        PlanCommands::List(args) => {
            let (plans, has_more, has_prev) = list_plans(api, &args).await?;
            let next = if has_more { plans.last().map(|p| p.plan_id.clone()) } else { None };
            print_list(&plans, format)?;
            if format == OutputFormat::Table {
                if let Some(marker) = next {
                    println!("More plans: --marker {}", marker);
                }
                if has_prev {
                    if let Some(first) = plans.first() {
                        println!("Previous plans: --marker {} --sort-dir asc", first.plan_id);
                    }
                }
            }
        }

        PlanCommands::Show { plan_id } => {
            let plan = api.plan_get(&plan_id).await?;
            print_item(&PlanDisplay::from(plan), format)?;
        }

        PlanCommands::Create {
            plan_type,
            ids,
            level,
        } => {
            let resources = parse_resource_ids(&ids)?;
            let level = level.unwrap_or_else(|| config.web.default_plan_level.clone());
            info!(%plan_type, count = resources.len(), "creating plan");
            let plan = api.plan_create(plan_type, &resources, &level).await?;
            print_message(&format!("Created plan {}", plan.plan_id), format);
            print_item(&PlanDisplay::from(plan), format)?;
        }

        PlanCommands::Delete { plan_id } => {
            api.plan_delete(&plan_id).await?;
            print_message(&format!("Deleted plan {}.", plan_id), format);
        }

        PlanCommands::Deps(args) => {
            let deps = load_deps(api, &args).await?;
            print_list(&dependency_rows(&deps), format)?;
        }

        PlanCommands::Topology(args) => {
            let deps = load_deps(api, &args).await?;
            let graph = D3Graph::from_deps(&deps, args.focal.as_deref());
            // The graph is only meaningful as a document.
            let format = match format {
                OutputFormat::Yaml => OutputFormat::Yaml,
                _ => OutputFormat::Json,
            };
            if let Some(text) = render_structured(&graph, format)? {
                println!("{}", text);
            }
        }

        PlanCommands::Clone {
            plan_id,
            az,
            sys_clone,
            resources,
        } => {
            let resources = match resources {
                Some(path) => read_resources(&path)?,
                None => Vec::new(),
            };
            info!(%plan_id, %az, sys_clone, "cloning plan");
            api.export_template_and_clone(&plan_id, &az, &resources, sys_clone)
                .await
                .with_context(|| format!("Clone plan {} failed.", plan_id))?;
            print_message(&format!("Clone plan {} successfully.", plan_id), format);
        }

        PlanCommands::Migrate { plan_id, az } => {
            info!(%plan_id, %az, "migrating plan");
            api.migrate(&plan_id, &az)
                .await
                .with_context(|| format!("Migrate plan {} failed.", plan_id))?;
            print_message(&format!("Migrate plan {} successfully.", plan_id), format);
        }

        PlanCommands::Update { plan_id, file } => {
            let resources = read_resources(&file)?;
            if resources.is_empty() {
                print_warning("no resource edits to apply");
                return Ok(());
            }
            api.update_plan_resource(&plan_id, &resources)
                .await
                .with_context(|| format!("Update plan {} failed.", plan_id))?;
            print_message(&format!("Update plan {} successfully.", plan_id), format);
        }

        PlanCommands::Export { plan_id, output } => {
            let template = api.download_template(&plan_id).await?;
            let yaml = serde_yaml::to_string(&template)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, yaml)
                        .with_context(|| format!("writing {}", path.display()))?;
                    print_message(
                        &format!("Exported plan {} to {}", plan_id, path.display()),
                        format,
                    );
                }
                None => print!("{}", yaml),
            }
        }

        PlanCommands::Import { file } => {
            let template = parse_template(&read_input(&file)?)?;
            let plan = api.create_plan_by_template(template).await?;
            print_message(&format!("Successfully imported plan: {}", plan.plan_id), format);
        }

        PlanCommands::Increment { plan_id, plan_type } => {
            let source = api.plan_get_brief(&plan_id).await?;
            let plan_type = plan_type.unwrap_or(source.plan_type);
            let name = format!("increment-of-{}", plan_id);
            let plan = api.create_increment_plan(&plan_id, plan_type, &name).await?;
            print_message(
                &format!("Created increment plan {} from {}", plan.plan_id, plan_id),
                format,
            );
        }

        PlanCommands::GenerateTemplate { plan_id } => {
            generate_template(api, &plan_id).await?;
            print_message(
                &format!("Generate template for plan {} successfully.", plan_id),
                format,
            );
        }

        PlanCommands::Zones { plan } => {
            let zones = list_zones(api, plan.as_deref()).await?;
            print_list(&zones, format)?;
        }
    }

    Ok(())
}
