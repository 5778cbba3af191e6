mod browse;
mod render;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    breakdown_source, load_settings,
    navigation::{self, View},
    requirement_source, test_case_source, ApiClient, BroadcastNotifier, ClientSettings,
    FilterValue, Notification, NotificationLevel, PageSource, PagedTable, PagedTableOptions,
    QueryParams,
};
use render::{render_menu, render_page, render_rows, TableRow};
use serde::Serialize;
use shared::{
    domain::{BreakdownId, CaseId, CaseStatus, ExportFormat, ReviewStatus},
    protocol::{BreakdownUpdate, StatusReply},
};
use tokio::{io::BufReader, sync::broadcast};
use tracing::info;
use tracing_subscriber::EnvFilter;

const NOTIFICATION_CAPACITY: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "casedesk", about = "Requirement and test case admin console")]
struct Args {
    /// Backend base url; overrides client.toml and the environment.
    #[arg(long, global = true)]
    base_url: Option<String>,
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
    #[arg(long, global = true)]
    page_size: Option<u32>,
    /// Print list rows as JSON instead of a table.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List requirements.
    Requirements {
        #[arg(long)]
        feature: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// List test cases.
    Cases {
        #[arg(long)]
        req_id: Option<i64>,
        #[arg(long)]
        status: Option<CaseStatus>,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// List requirement breakdown items.
    Breakdown {
        #[arg(long)]
        project_id: Option<i64>,
        #[arg(long)]
        feature: Option<String>,
        #[arg(long)]
        status: Option<ReviewStatus>,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    Projects,
    /// Counts across the main lists.
    Summary,
    /// Set the status of one or more test cases.
    CaseStatus {
        #[arg(long)]
        status: CaseStatus,
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Set the review status of one or more breakdown items.
    Review {
        #[arg(long)]
        status: ReviewStatus,
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Overwrite the editable fields of a breakdown item.
    EditBreakdown {
        id: i64,
        #[arg(long)]
        module: String,
        #[arg(long)]
        feature: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        acceptance_criteria: String,
        #[arg(long, default_value = "P1")]
        priority: String,
        #[arg(long, default_value = "")]
        source_content: String,
    },
    /// Download test cases as a spreadsheet or mind map.
    Export {
        #[arg(long)]
        req_id: Option<i64>,
        #[arg(long)]
        status: Option<CaseStatus>,
        #[arg(long, default_value_t = ExportFormat::default())]
        format: ExportFormat,
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Page through a view interactively.
    Browse {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Show the navigation menu.
    Menu,
}

#[derive(Serialize)]
struct Summary {
    requirements: u64,
    test_cases: u64,
    projects: u64,
}

fn settings_from(args: &Args) -> Result<ClientSettings> {
    let mut settings = load_settings().context("loading client settings")?;
    if let Some(base_url) = &args.base_url {
        settings.base_url = base_url.clone();
    }
    if let Some(timeout_ms) = args.timeout_ms {
        settings.timeout = Duration::from_millis(timeout_ms);
    }
    if let Some(page_size) = args.page_size {
        settings.page_size = page_size;
    }
    Ok(settings.validated()?)
}

fn options_for(settings: &ClientSettings, page: u32) -> PagedTableOptions {
    PagedTableOptions {
        auto_load: page <= 1,
        page_size: settings.page_size,
        ..PagedTableOptions::default()
    }
}

fn drain_errors(rx: &mut broadcast::Receiver<Notification>) -> Vec<String> {
    let mut errors = Vec::new();
    while let Ok(notification) = rx.try_recv() {
        if notification.level == NotificationLevel::Error {
            errors.push(notification.message);
        }
    }
    errors
}

/// Loads a single page through a [`PagedTable`] and prints it.
async fn show_page<T>(
    source: impl PageSource<T> + 'static,
    filters: Vec<(&'static str, FilterValue)>,
    settings: &ClientSettings,
    page: u32,
    json: bool,
) -> Result<()>
where
    T: TableRow + Serialize + Clone + Send + Sync + 'static,
{
    let notifier = Arc::new(BroadcastNotifier::new(NOTIFICATION_CAPACITY));
    let mut notifications = notifier.subscribe();
    let table = PagedTable::new_with_notifier(
        source,
        filters,
        options_for(settings, page),
        notifier,
    );

    table.initialize().await;
    if page > 1 {
        table.handle_current_change(page).await;
    }

    let errors = drain_errors(&mut notifications);
    if !errors.is_empty() {
        bail!(errors.join("; "));
    }

    let state = table.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&state.rows)?);
    } else {
        print!("{}", render_page(&state));
    }
    Ok(())
}

fn print_reply(reply: &StatusReply) {
    match &reply.message {
        Some(message) => println!("{}: {message}", reply.status),
        None => println!("{}", reply.status),
    }
}

async fn summary(client: &ApiClient) -> Result<Summary> {
    let first_row = QueryParams::new().with("page", 1u32).with("size", 1u32);
    let (requirements, cases, projects) = futures::try_join!(
        client.get_requirements(&first_row),
        client.get_all_test_cases(&first_row),
        client.get_projects(),
    )?;
    Ok(Summary {
        requirements: requirements.into_parts().1,
        test_cases: cases.into_parts().1,
        projects: projects.into_parts().1,
    })
}

async fn browse_view(path: &str, client: ApiClient, settings: &ClientSettings) -> Result<()> {
    let resolved =
        navigation::resolve(path).ok_or_else(|| anyhow!("no view is mounted at '{path}'"))?;
    info!(path = %resolved.path, "browsing");

    let notifier = Arc::new(BroadcastNotifier::new(NOTIFICATION_CAPACITY));
    let notifications = notifier.subscribe();
    let options = options_for(settings, 1);
    let stdin = BufReader::new(tokio::io::stdin());

    match resolved.route.view {
        Some(View::RequirementList) => {
            let table = PagedTable::new_with_notifier(
                requirement_source(client),
                [("feature", FilterValue::text(""))],
                options,
                notifier,
            );
            browse::run(table, notifications, stdin).await
        }
        Some(View::TestCaseList) => {
            let table = PagedTable::new_with_notifier(
                test_case_source(client),
                [("req_id", FilterValue::Unset), ("status", FilterValue::text(""))],
                options,
                notifier,
            );
            browse::run(table, notifications, stdin).await
        }
        Some(View::Detail) => {
            let id: i64 = resolved
                .params
                .get("id")
                .and_then(|id| id.parse().ok())
                .ok_or_else(|| anyhow!("detail view needs a numeric requirement id"))?;
            let table = PagedTable::new_with_notifier(
                test_case_source(client),
                [("req_id", FilterValue::Integer(id)), ("status", FilterValue::text(""))],
                options,
                notifier,
            );
            browse::run(table, notifications, stdin).await
        }
        Some(View::Login) => bail!("login is not available from the console"),
        Some(View::Layout) | None => bail!("'{path}' has no list view"),
    }
}

async fn run(args: Args) -> Result<()> {
    let settings = settings_from(&args)?;
    let client = ApiClient::new(&settings)?;
    info!(base_url = client.base_url(), "using backend");

    match args.command {
        Command::Requirements { feature, page } => {
            show_page(
                requirement_source(client),
                vec![("feature", feature.into())],
                &settings,
                page,
                args.json,
            )
            .await
        }
        Command::Cases {
            req_id,
            status,
            page,
        } => {
            show_page(
                test_case_source(client),
                vec![
                    ("req_id", req_id.into()),
                    ("status", status.map(|s| s.to_string()).into()),
                ],
                &settings,
                page,
                args.json,
            )
            .await
        }
        Command::Breakdown {
            project_id,
            feature,
            status,
            page,
        } => {
            show_page(
                breakdown_source(client),
                vec![
                    ("project_id", project_id.into()),
                    ("feature", feature.into()),
                    ("status", status.map(|s| s.to_string()).into()),
                ],
                &settings,
                page,
                args.json,
            )
            .await
        }
        Command::Projects => {
            let (projects, _) = client.get_projects().await?.into_parts();
            if args.json {
                println!("{}", serde_json::to_string_pretty(&projects)?);
            } else {
                print!("{}", render_rows(&projects));
            }
            Ok(())
        }
        Command::Summary => {
            let summary = summary(&client).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "requirements: {}\ntest cases:   {}\nprojects:     {}",
                    summary.requirements, summary.test_cases, summary.projects
                );
            }
            Ok(())
        }
        Command::CaseStatus { status, ids } => {
            let ids: Vec<CaseId> = ids.into_iter().map(CaseId).collect();
            let reply = client.batch_update_case_status(&ids, status).await?;
            print_reply(&reply);
            Ok(())
        }
        Command::Review { status, ids } => {
            let reply = match ids.as_slice() {
                [id] => client.update_breakdown_status(BreakdownId(*id), status).await?,
                _ => {
                    let ids: Vec<BreakdownId> = ids.into_iter().map(BreakdownId).collect();
                    client.batch_update_breakdown_status(&ids, status).await?
                }
            };
            print_reply(&reply);
            Ok(())
        }
        Command::EditBreakdown {
            id,
            module,
            feature,
            description,
            acceptance_criteria,
            priority,
            source_content,
        } => {
            let update = BreakdownUpdate {
                module_name: module,
                feature_name: feature,
                description,
                acceptance_criteria,
                priority,
                source_content,
            };
            let reply = client.update_breakdown_item(BreakdownId(id), &update).await?;
            print_reply(&reply);
            Ok(())
        }
        Command::Export {
            req_id,
            status,
            format,
            output,
        } => {
            let params = QueryParams::new()
                .with("req_id", req_id)
                .with("status", status.map(|s| s.to_string()))
                .with("format", format.as_str())
                .strip_empty();
            let bytes = client.export_test_cases(&params).await?;
            tokio::fs::write(&output, &bytes)
                .await
                .with_context(|| format!("writing {}", output.display()))?;
            println!("wrote {} bytes to {}", bytes.len(), output.display());
            Ok(())
        }
        Command::Browse { path } => browse_view(&path, client, &settings).await,
        Command::Menu => {
            print!("{}", render_menu(&navigation::menu()));
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    run(Args::parse()).await
}
