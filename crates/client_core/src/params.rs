//! Request parameter model shared by the list endpoints and the paged table.

use std::{collections::BTreeMap, fmt};

/// A single filter value as entered by the user.
///
/// `Unset` is a key that exists but carries nothing; it survives [`QueryParams::strip_empty`]
/// and is skipped when rendered into a query string.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FilterValue {
    #[default]
    Unset,
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FilterValue {
    pub fn text(value: impl Into<String>) -> Self {
        FilterValue::Text(value.into())
    }

    /// Empty text and null are dropped from outgoing requests. `0`, `false` and unset are not.
    pub fn is_empty(&self) -> bool {
        match self {
            FilterValue::Null => true,
            FilterValue::Text(text) => text.is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FilterValue::Text(text) => Some(text),
            _ => None,
        }
    }

    fn to_query_value(&self) -> Option<String> {
        match self {
            FilterValue::Unset | FilterValue::Null => None,
            FilterValue::Bool(value) => Some(value.to_string()),
            FilterValue::Integer(value) => Some(value.to_string()),
            FilterValue::Float(value) => Some(value.to_string()),
            FilterValue::Text(value) => Some(value.clone()),
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Unset => f.write_str("<unset>"),
            FilterValue::Null => f.write_str("null"),
            FilterValue::Bool(value) => write!(f, "{value}"),
            FilterValue::Integer(value) => write!(f, "{value}"),
            FilterValue::Float(value) => write!(f, "{value}"),
            FilterValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Integer(value)
    }
}

impl From<u32> for FilterValue {
    fn from(value: u32) -> Self {
        FilterValue::Integer(i64::from(value))
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Float(value)
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FilterValue::Null)
    }
}

/// Ordered key/value parameters for a list request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryParams(BTreeMap<String, FilterValue>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// `{page, size}` merged with `filters`; a filter named `page` or `size` wins.
    pub fn paged<'a>(
        page: u32,
        size: u32,
        filters: impl IntoIterator<Item = (&'a String, &'a FilterValue)>,
    ) -> Self {
        let mut params = Self::new();
        params.insert("page", page);
        params.insert("size", size);
        for (key, value) in filters {
            params.insert(key.clone(), value.clone());
        }
        params
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FilterValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FilterValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FilterValue)> {
        self.0.iter()
    }

    pub fn page(&self) -> Option<i64> {
        match self.get("page") {
            Some(FilterValue::Integer(page)) => Some(*page),
            _ => None,
        }
    }

    pub fn size(&self) -> Option<i64> {
        match self.get("size") {
            Some(FilterValue::Integer(size)) => Some(*size),
            _ => None,
        }
    }

    /// Removes every entry whose value is empty text or null.
    pub fn strip_empty(mut self) -> Self {
        self.0.retain(|_, value| !value.is_empty());
        self
    }

    /// Renders the parameters as query pairs. Unset and null values are skipped.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .filter_map(|(key, value)| value.to_query_value().map(|value| (key.clone(), value)))
            .collect()
    }
}

impl<K: Into<String>, V: Into<FilterValue>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}
