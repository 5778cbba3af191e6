//! Interactive paging over one list view, driven by line commands on stdin.

use std::{ops::ControlFlow, sync::Arc};

use client_core::{FilterValue, Notification, PagedTable, TableState};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt},
    sync::broadcast,
    task::JoinHandle,
};

use crate::render::{render_page, TableRow};

pub const HELP: &str = "\
commands:
  n | next            next page
  p | prev            previous page
  g <page>            go to page
  size <n>            rows per page (returns to page 1)
  set <key> [value]   set a filter; no value clears it
  s | search          search with current filters
  r | reset           restore initial filters and search
  reload              reload the current page
  q | quit            leave";

#[derive(Debug, Clone, PartialEq)]
pub enum BrowseCommand {
    Next,
    Prev,
    Goto(u32),
    Size(u32),
    Set { key: String, value: FilterValue },
    Search,
    Reset,
    Reload,
    Help,
    Quit,
}

impl BrowseCommand {
    /// Whether the command ends with the table reloading.
    pub fn reloads(&self) -> bool {
        !matches!(self, Self::Set { .. } | Self::Help | Self::Quit)
    }
}

/// Reads a typed filter value: integers, booleans and `null` keep their type.
pub fn parse_filter_value(raw: &str) -> FilterValue {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("null") {
        return FilterValue::Null;
    }
    if let Ok(value) = raw.parse::<i64>() {
        return FilterValue::Integer(value);
    }
    match raw {
        "true" => FilterValue::Bool(true),
        "false" => FilterValue::Bool(false),
        _ => FilterValue::text(raw),
    }
}

fn parse_number(arg: Option<&str>, what: &str) -> Result<u32, String> {
    let arg = arg.ok_or_else(|| format!("missing {what}"))?;
    arg.parse::<u32>()
        .map_err(|_| format!("invalid {what} '{arg}'"))
}

pub fn parse_command(line: &str) -> Result<BrowseCommand, String> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Ok(BrowseCommand::Reload);
    };

    match verb {
        "n" | "next" => Ok(BrowseCommand::Next),
        "p" | "prev" => Ok(BrowseCommand::Prev),
        "g" | "goto" => parse_number(parts.next(), "page").map(BrowseCommand::Goto),
        "size" => parse_number(parts.next(), "page size").map(BrowseCommand::Size),
        "set" => {
            let key = parts
                .next()
                .ok_or_else(|| "missing filter name".to_string())?
                .to_string();
            let rest: Vec<&str> = parts.collect();
            let value = if rest.is_empty() {
                FilterValue::text("")
            } else {
                parse_filter_value(&rest.join(" "))
            };
            Ok(BrowseCommand::Set { key, value })
        }
        "s" | "search" => Ok(BrowseCommand::Search),
        "r" | "reset" => Ok(BrowseCommand::Reset),
        "reload" => Ok(BrowseCommand::Reload),
        "h" | "help" | "?" => Ok(BrowseCommand::Help),
        "q" | "quit" | "exit" => Ok(BrowseCommand::Quit),
        other => Err(format!("unknown command '{other}' (try 'help')")),
    }
}

/// The page after the current one, if the reported total has one.
fn next_page<T>(state: &TableState<T>) -> Option<u32> {
    let last = state.total_pages().max(1);
    if u64::from(state.page) < last {
        state.page.checked_add(1)
    } else {
        None
    }
}

pub async fn apply<T>(table: &PagedTable<T>, command: BrowseCommand) -> ControlFlow<()>
where
    T: Clone + Send + Sync + 'static,
{
    match command {
        BrowseCommand::Next => {
            match next_page(&table.snapshot()) {
                Some(page) => table.handle_current_change(page).await,
                None => println!("already on the last page"),
            }
        }
        BrowseCommand::Prev => {
            let page = table.page();
            if page > 1 {
                table.handle_current_change(page - 1).await;
            } else {
                println!("already on the first page");
            }
        }
        BrowseCommand::Goto(page) => table.handle_current_change(page).await,
        BrowseCommand::Size(size) => table.handle_size_change(size).await,
        BrowseCommand::Set { key, value } => {
            tracing::debug!(key = %key, value = %value, "filter updated");
            table.set_filter(key, value);
        }
        BrowseCommand::Search => table.handle_search().await,
        BrowseCommand::Reset => table.handle_reset().await,
        BrowseCommand::Reload => table.load().await,
        BrowseCommand::Help => println!("{HELP}"),
        BrowseCommand::Quit => return ControlFlow::Break(()),
    }
    ControlFlow::Continue(())
}

/// Shows a progress line while a load is outstanding.
fn spawn_loading_indicator<T>(table: &Arc<PagedTable<T>>) -> JoinHandle<()>
where
    T: Clone + Send + Sync + 'static,
{
    let mut updates = table.subscribe();
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            if updates.borrow_and_update().loading {
                eprintln!("loading...");
            }
        }
    })
}

fn spawn_notification_printer(mut rx: broadcast::Receiver<Notification>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(notification) => eprintln!("{:?}: {}", notification.level, notification.message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "notifications dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

pub async fn run<T, R>(
    table: Arc<PagedTable<T>>,
    notifications: broadcast::Receiver<Notification>,
    input: R,
) -> anyhow::Result<()>
where
    T: TableRow + Clone + Send + Sync + 'static,
    R: AsyncBufRead + Unpin,
{
    let indicator = spawn_loading_indicator(&table);
    let printer = spawn_notification_printer(notifications);

    table.initialize().await;
    print!("{}", render_page(&table.snapshot()));
    println!("type 'help' for commands");

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(message) => {
                eprintln!("{message}");
                continue;
            }
        };
        let reloads = command.reloads();
        if apply(&table, command).await.is_break() {
            break;
        }
        if reloads {
            print!("{}", render_page(&table.snapshot()));
        }
    }

    indicator.abort();
    printer.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_navigation_commands() {
        assert_eq!(parse_command("n"), Ok(BrowseCommand::Next));
        assert_eq!(parse_command("g 4"), Ok(BrowseCommand::Goto(4)));
        assert_eq!(parse_command("size 25"), Ok(BrowseCommand::Size(25)));
        assert_eq!(parse_command("   "), Ok(BrowseCommand::Reload));
        assert!(parse_command("g four").is_err());
        assert!(parse_command("size").is_err());
        assert!(parse_command("jump").is_err());
    }

    fn state_at(page: u32, size: u32, total: u64) -> TableState<String> {
        TableState {
            rows: Vec::new(),
            total,
            loading: false,
            page,
            size,
            filters: Default::default(),
        }
    }

    #[test]
    fn next_page_stops_at_the_last_page() {
        assert_eq!(next_page(&state_at(1, 10, 25)), Some(2));
        assert_eq!(next_page(&state_at(3, 10, 25)), None);
        assert_eq!(next_page(&state_at(1, 10, 0)), None);
    }

    #[test]
    fn next_page_does_not_overflow_on_huge_totals() {
        assert_eq!(next_page(&state_at(u32::MAX, 1, u64::MAX)), None);
        assert_eq!(
            next_page(&state_at(u32::MAX - 1, 1, u64::MAX)),
            Some(u32::MAX)
        );
    }

    #[test]
    fn only_table_commands_reload() {
        assert!(BrowseCommand::Reset.reloads());
        assert!(BrowseCommand::Goto(2).reloads());
        assert!(!BrowseCommand::Help.reloads());
        assert!(!BrowseCommand::Set {
            key: "feature".into(),
            value: FilterValue::Unset,
        }
        .reloads());
    }

    #[test]
    fn set_parses_typed_values_and_clears_without_value() {
        assert_eq!(
            parse_command("set feature password reset"),
            Ok(BrowseCommand::Set {
                key: "feature".into(),
                value: FilterValue::text("password reset"),
            })
        );
        assert_eq!(
            parse_command("set req_id 0"),
            Ok(BrowseCommand::Set {
                key: "req_id".into(),
                value: FilterValue::Integer(0),
            })
        );
        assert_eq!(
            parse_command("set status"),
            Ok(BrowseCommand::Set {
                key: "status".into(),
                value: FilterValue::text(""),
            })
        );
        assert_eq!(parse_filter_value("NULL"), FilterValue::Null);
        assert_eq!(parse_filter_value("false"), FilterValue::Bool(false));
    }
}
