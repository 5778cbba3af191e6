use super::*;

use std::{collections::VecDeque, sync::Mutex};

use anyhow::anyhow;
use shared::protocol::PageEnvelope;
use tokio::sync::oneshot;

use crate::notify::{BroadcastNotifier, NotificationLevel};

type Reply = std::result::Result<ListPayload<String>, String>;

#[derive(Clone, Default)]
struct RecordingSource {
    calls: Arc<Mutex<Vec<QueryParams>>>,
    replies: Arc<Mutex<VecDeque<Reply>>>,
}

impl RecordingSource {
    fn replying(replies: impl IntoIterator<Item = Reply>) -> Self {
        let source = Self::default();
        source.replies.lock().expect("replies").extend(replies);
        source
    }

    fn calls(&self) -> Vec<QueryParams> {
        self.calls.lock().expect("calls").clone()
    }

    fn last_call(&self) -> QueryParams {
        self.calls().last().cloned().expect("at least one request")
    }
}

#[async_trait]
impl PageSource<String> for RecordingSource {
    async fn fetch(&self, params: QueryParams) -> Result<ListPayload<String>> {
        self.calls.lock().expect("calls").push(params);
        let reply = self.replies.lock().expect("replies").pop_front();
        match reply {
            Some(Ok(payload)) => Ok(payload),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(ListPayload::Items(Vec::new())),
        }
    }
}

/// Each fetch waits on the next gate, so tests decide completion order.
#[derive(Clone, Default)]
struct GatedSource {
    gates: Arc<Mutex<VecDeque<oneshot::Receiver<Reply>>>>,
}

impl GatedSource {
    fn gate(&self) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().expect("gates").push_back(rx);
        tx
    }
}

#[async_trait]
impl PageSource<String> for GatedSource {
    async fn fetch(&self, _params: QueryParams) -> Result<ListPayload<String>> {
        let gate = self.gates.lock().expect("gates").pop_front().expect("gate");
        match gate.await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(message)) => Err(anyhow!(message)),
            Err(_) => Err(anyhow!("gate dropped")),
        }
    }
}

fn rows(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn no_filters() -> Vec<(String, FilterValue)> {
    Vec::new()
}

fn options(race_policy: RacePolicy) -> PagedTableOptions {
    PagedTableOptions {
        race_policy,
        ..PagedTableOptions::default()
    }
}

#[tokio::test]
async fn initialize_auto_loads_once_and_omits_empty_filters() {
    let source = RecordingSource::default();
    let table = PagedTable::new(
        source.clone(),
        [("status", "")],
        PagedTableOptions::default(),
    );

    assert!(source.calls().is_empty(), "construction must not load");

    table.initialize().await;
    table.initialize().await;

    let calls = source.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0],
        QueryParams::new().with("page", 1u32).with("size", 10u32)
    );
    assert!(!table.is_loading());
}

#[tokio::test]
async fn initialize_without_auto_load_stays_idle() {
    let source = RecordingSource::default();
    let table = PagedTable::new(
        source.clone(),
        no_filters(),
        PagedTableOptions {
            auto_load: false,
            ..PagedTableOptions::default()
        },
    );

    table.initialize().await;
    assert!(source.calls().is_empty());
}

#[tokio::test]
async fn size_change_returns_to_first_page() {
    let source = RecordingSource::default();
    let table = PagedTable::new(source.clone(), no_filters(), PagedTableOptions::default());

    table.handle_current_change(3).await;
    assert_eq!(source.last_call().page(), Some(3));

    table.handle_size_change(20).await;
    let params = source.last_call();
    assert_eq!(params.page(), Some(1));
    assert_eq!(params.size(), Some(20));
    assert_eq!((table.page(), table.size()), (1, 20));
}

#[tokio::test]
async fn page_change_keeps_size_and_filters() {
    let source = RecordingSource::default();
    let table = PagedTable::new(
        source.clone(),
        [("feature", "login")],
        PagedTableOptions::default(),
    );

    table.handle_size_change(50).await;
    table.handle_current_change(4).await;

    let params = source.last_call();
    assert_eq!(params.page(), Some(4));
    assert_eq!(params.size(), Some(50));
    assert_eq!(params.get("feature"), Some(&FilterValue::text("login")));
}

#[tokio::test]
async fn page_and_size_are_clamped_to_one() {
    let source = RecordingSource::default();
    let table = PagedTable::new(source.clone(), no_filters(), PagedTableOptions::default());

    table.handle_current_change(0).await;
    assert_eq!(source.last_call().page(), Some(1));

    table.handle_size_change(0).await;
    assert_eq!(source.last_call().size(), Some(1));
}

#[tokio::test]
async fn search_resets_page_and_sends_live_filters() {
    let source = RecordingSource::default();
    let table = PagedTable::new(
        source.clone(),
        [("feature", "")],
        PagedTableOptions::default(),
    );

    table.handle_current_change(4).await;
    table.set_filter("feature", "export");
    table.handle_search().await;

    let params = source.last_call();
    assert_eq!(params.page(), Some(1));
    assert_eq!(params.get("feature"), Some(&FilterValue::text("export")));
}

#[tokio::test]
async fn reset_restores_initial_values_and_blanks_late_keys() {
    let source = RecordingSource::default();
    let table = PagedTable::new(
        source.clone(),
        [("status", "Active"), ("feature", "")],
        PagedTableOptions::default(),
    );

    table.set_filter("status", "Draft");
    table.set_filter("feature", "login");
    table.set_filter("owner", "amy");
    table.handle_current_change(6).await;

    table.handle_reset().await;

    let filters = table.filters();
    assert_eq!(filters.get("status"), Some(&FilterValue::text("Active")));
    assert_eq!(filters.get("feature"), Some(&FilterValue::text("")));
    assert_eq!(
        filters.get("owner"),
        Some(&FilterValue::text("")),
        "keys added after construction stay but are blanked"
    );

    assert_eq!(
        source.last_call(),
        QueryParams::new()
            .with("page", 1u32)
            .with("size", 10u32)
            .with("status", "Active")
    );
}

#[tokio::test]
async fn reset_keeps_non_text_initial_values() {
    let source = RecordingSource::default();
    let table = PagedTable::new(
        source.clone(),
        [("req_id", FilterValue::Integer(0)), ("archived", FilterValue::Bool(false))],
        PagedTableOptions::default(),
    );

    table.set_filter("req_id", 42i64);
    table.set_filter("archived", true);
    table.handle_reset().await;

    assert_eq!(table.filters().get("req_id"), Some(&FilterValue::Integer(0)));
    assert_eq!(
        source.last_call(),
        QueryParams::new()
            .with("archived", false)
            .with("page", 1u32)
            .with("req_id", 0i64)
            .with("size", 10u32),
        "zero and false are restored and still sent"
    );
}

#[tokio::test]
async fn null_filters_are_stripped_but_unset_passes_through() {
    let source = RecordingSource::default();
    let table = PagedTable::new(
        source.clone(),
        [("project_id", FilterValue::Null), ("owner", FilterValue::Unset)],
        PagedTableOptions::default(),
    );

    table.load().await;

    let params = source.last_call();
    assert!(!params.contains_key("project_id"));
    assert_eq!(params.get("owner"), Some(&FilterValue::Unset));
}

#[tokio::test]
async fn bare_sequence_sets_total_to_its_length() {
    let source = RecordingSource::replying([Ok(ListPayload::Items(rows(&["a", "b", "c"])))]);
    let table = PagedTable::new(source, no_filters(), PagedTableOptions::default());

    table.load().await;

    let state = table.snapshot();
    assert_eq!(state.rows, rows(&["a", "b", "c"]));
    assert_eq!(state.total, 3);
}

#[tokio::test]
async fn envelope_sets_rows_and_total_with_defaults() {
    let source = RecordingSource::replying([
        Ok(ListPayload::page(rows(&["a", "b"]), 5)),
        Ok(ListPayload::Page(PageEnvelope {
            items: None,
            total: Some(8),
            page: None,
            size: None,
        })),
        Ok(ListPayload::Page(PageEnvelope {
            items: Some(rows(&["z"])),
            total: None,
            page: None,
            size: None,
        })),
    ]);
    let table = PagedTable::new(source, no_filters(), PagedTableOptions::default());

    table.load().await;
    assert_eq!((table.snapshot().rows, table.total()), (rows(&["a", "b"]), 5));

    table.load().await;
    assert_eq!((table.snapshot().rows, table.total()), (Vec::new(), 8));

    table.load().await;
    assert_eq!((table.snapshot().rows, table.total()), (rows(&["z"]), 0));
}

#[tokio::test]
async fn failed_load_keeps_previous_rows_and_notifies() {
    let source = RecordingSource::replying([
        Ok(ListPayload::page(rows(&["a", "b"]), 5)),
        Err("connection refused".to_string()),
    ]);
    let notifier = Arc::new(BroadcastNotifier::new(8));
    let mut notifications = notifier.subscribe();
    let table = PagedTable::new_with_notifier(
        source,
        no_filters(),
        PagedTableOptions::default(),
        notifier,
    );

    table.load().await;
    table.handle_current_change(2).await;

    let state = table.snapshot();
    assert_eq!(state.rows, rows(&["a", "b"]));
    assert_eq!(state.total, 5);
    assert!(!state.loading);
    assert_eq!(state.page, 2);

    let notification = notifications.try_recv().expect("notification");
    assert_eq!(notification.level, NotificationLevel::Error);
    assert_eq!(notification.message, LOAD_FAILED_MESSAGE);
}

#[tokio::test]
async fn subscribers_see_loading_flag_while_request_is_outstanding() {
    let source = GatedSource::default();
    let gate = source.gate();
    let table = PagedTable::new(source, no_filters(), PagedTableOptions::default());
    let mut updates = table.subscribe();

    let load = table.load();
    tokio::pin!(load);
    assert!(futures::poll!(load.as_mut()).is_pending());
    assert!(updates.borrow_and_update().loading);

    gate.send(Ok(ListPayload::Items(rows(&["x"])))).expect("send");
    load.await;

    updates.changed().await.expect("changed");
    let state = updates.borrow_and_update().clone();
    assert!(!state.loading);
    assert_eq!(state.rows, rows(&["x"]));
}

#[tokio::test]
async fn dropped_load_still_clears_loading() {
    let source = GatedSource::default();
    let _gate = source.gate();
    let table = PagedTable::new(source, no_filters(), PagedTableOptions::default());

    {
        let load = table.load();
        tokio::pin!(load);
        assert!(futures::poll!(load.as_mut()).is_pending());
        assert!(table.is_loading());
    }

    assert!(!table.is_loading());
}

#[tokio::test]
async fn latest_request_wins_discards_stale_response() {
    let source = GatedSource::default();
    let first_gate = source.gate();
    let second_gate = source.gate();
    let table = PagedTable::new(source, no_filters(), options(RacePolicy::LatestRequestWins));

    let first = table.handle_current_change(2);
    tokio::pin!(first);
    assert!(futures::poll!(first.as_mut()).is_pending());

    let second = table.handle_current_change(3);
    tokio::pin!(second);
    assert!(futures::poll!(second.as_mut()).is_pending());

    second_gate
        .send(Ok(ListPayload::page(rows(&["page-3"]), 30)))
        .expect("send");
    second.await;
    assert_eq!(table.snapshot().rows, rows(&["page-3"]));
    assert!(!table.is_loading());

    first_gate
        .send(Ok(ListPayload::page(rows(&["page-2"]), 30)))
        .expect("send");
    first.await;

    let state = table.snapshot();
    assert_eq!(state.rows, rows(&["page-3"]));
    assert_eq!(state.page, 3);
    assert!(!state.loading);
}

#[tokio::test]
async fn latest_request_keeps_loading_until_it_completes() {
    let source = GatedSource::default();
    let first_gate = source.gate();
    let second_gate = source.gate();
    let table = PagedTable::new(source, no_filters(), options(RacePolicy::LatestRequestWins));

    let first = table.load();
    tokio::pin!(first);
    assert!(futures::poll!(first.as_mut()).is_pending());
    let second = table.handle_search();
    tokio::pin!(second);
    assert!(futures::poll!(second.as_mut()).is_pending());

    first_gate.send(Err("timeout".to_string())).expect("send");
    first.await;
    assert!(table.is_loading(), "newer request is still outstanding");

    second_gate.send(Ok(ListPayload::Items(rows(&["ok"])))).expect("send");
    second.await;
    assert!(!table.is_loading());
    assert_eq!(table.snapshot().rows, rows(&["ok"]));
}

#[tokio::test]
async fn last_response_wins_applies_in_completion_order() {
    let source = GatedSource::default();
    let first_gate = source.gate();
    let second_gate = source.gate();
    let table = PagedTable::new(source, no_filters(), options(RacePolicy::LastResponseWins));

    let first = table.handle_current_change(2);
    tokio::pin!(first);
    assert!(futures::poll!(first.as_mut()).is_pending());

    let second = table.handle_current_change(3);
    tokio::pin!(second);
    assert!(futures::poll!(second.as_mut()).is_pending());

    second_gate
        .send(Ok(ListPayload::page(rows(&["page-3"]), 30)))
        .expect("send");
    second.await;
    assert!(
        !table.is_loading(),
        "completion order policy clears loading on any completion"
    );

    first_gate
        .send(Ok(ListPayload::page(rows(&["page-2"]), 30)))
        .expect("send");
    first.await;

    let state = table.snapshot();
    assert_eq!(state.rows, rows(&["page-2"]), "stale response overwrote newer one");
    assert_eq!(state.page, 3);
}

#[test]
fn total_pages_rounds_up() {
    let state = TableState::<String> {
        rows: Vec::new(),
        total: 21,
        loading: false,
        page: 1,
        size: 10,
        filters: Filters::new(),
    };
    assert_eq!(state.total_pages(), 3);
}
