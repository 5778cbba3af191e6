//! Client-side core for the case management console: HTTP API client, settings, request
//! parameters, the paged list controller and the navigation table.

pub mod api;
pub mod config;
pub mod error;
pub mod navigation;
pub mod notify;
pub mod paged_table;
pub mod params;

pub use api::{breakdown_source, requirement_source, test_case_source, ApiClient};
pub use config::{load_settings, ClientSettings};
pub use error::{ApiClientError, SettingsError};
pub use notify::{BroadcastNotifier, LogNotifier, Notification, NotificationLevel, Notifier};
pub use paged_table::{PageSource, PagedTable, PagedTableOptions, RacePolicy, TableState};
pub use params::{FilterValue, QueryParams};
