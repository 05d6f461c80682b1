//! Connection string parsing.
//!
//! Shape: `scheme://host[:port]/[path]?collection_name=...&queue_name=...&redeliver_timeout=...&auto_setup=...`
//!
//! Query parameters configure the queue; they are stripped from the URL used
//! to reach the backing store. Values found in the query win over explicit
//! options, which win over defaults. Any key outside the recognised option
//! set is rejected.

use std::collections::{BTreeSet, HashMap};

use url::Url;

use super::{parse_bool, QueueConfig};
use crate::constants::options;
use crate::messaging::errors::{MessagingError, MessagingResult};

/// Parsed connection string without its queue options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDsn {
    url: Url,
}

impl ConnectionDsn {
    /// Parse a DSN, returning it together with its query options
    pub fn parse(dsn: &str) -> MessagingResult<(Self, Vec<(String, String)>)> {
        let mut url = Url::parse(dsn)?;
        let query: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        url.set_query(None);

        Ok((Self { url }, query))
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// Host, if the DSN names a non-empty one
    pub fn host(&self) -> Option<&str> {
        self.url.host_str().filter(|host| !host.is_empty())
    }

    pub fn port(&self) -> Option<u16> {
        self.url.port()
    }

    /// Path without the leading slash, if any (a database name for SQL stores)
    pub fn path(&self) -> Option<&str> {
        let path = self.url.path().trim_start_matches('/');
        (!path.is_empty()).then_some(path)
    }

    /// URL used to connect to the backing store
    pub fn connection_url(&self) -> &str {
        self.url.as_str()
    }
}

fn unknown_keys<'a>(keys: impl Iterator<Item = &'a String>) -> Vec<&'a str> {
    keys.map(String::as_str)
        .filter(|key| !options::ALLOWED.contains(key))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Build a [`QueueConfig`] from a DSN and explicit options
///
/// # Example
///
/// ```rust
/// use std::collections::HashMap;
/// use messenger_queue::config::build_configuration;
///
/// let (dsn, config) = build_configuration(
///     "postgresql://localhost:5432/app?queue_name=emails",
///     &HashMap::new(),
/// ).unwrap();
///
/// assert_eq!(dsn.connection_url(), "postgresql://localhost:5432/app");
/// assert_eq!(config.queue_name, "emails");
/// assert_eq!(config.redeliver_timeout, 3600);
/// ```
pub fn build_configuration(
    dsn: &str,
    explicit_options: &HashMap<String, String>,
) -> MessagingResult<(ConnectionDsn, QueueConfig)> {
    let (connection, query) = ConnectionDsn::parse(dsn)?;

    let allowed = options::ALLOWED.join(", ");

    let extra = unknown_keys(explicit_options.keys());
    if !extra.is_empty() {
        return Err(MessagingError::configuration(
            "options",
            format!(
                "Unknown option found: [{}]. Allowed options are [{allowed}].",
                extra.join(", ")
            ),
        ));
    }

    let extra = unknown_keys(query.iter().map(|(key, _)| key));
    if !extra.is_empty() {
        return Err(MessagingError::configuration(
            "dsn",
            format!(
                "Unknown option found in DSN: [{}]. Allowed options are [{allowed}].",
                extra.join(", ")
            ),
        ));
    }

    // Later entries win: options first, then the DSN query
    let mut merged: HashMap<&str, &str> = HashMap::new();
    for (key, value) in explicit_options {
        merged.insert(key.as_str(), value.as_str());
    }
    for (key, value) in &query {
        merged.insert(key.as_str(), value.as_str());
    }

    let mut config = QueueConfig::default();
    if let Some(value) = merged.get(options::COLLECTION_NAME) {
        config.collection_name = (*value).to_string();
    }
    if let Some(value) = merged.get(options::QUEUE_NAME) {
        config.queue_name = (*value).to_string();
    }
    if let Some(value) = merged.get(options::REDELIVER_TIMEOUT) {
        config.redeliver_timeout = value.trim().parse().map_err(|_| {
            MessagingError::configuration(
                options::REDELIVER_TIMEOUT,
                format!("'{value}' is not a non-negative number of seconds"),
            )
        })?;
    }
    if let Some(value) = merged.get(options::AUTO_SETUP) {
        config.auto_setup = parse_bool(options::AUTO_SETUP, value)?;
    }

    config.validate()?;
    Ok((connection, config))
}
