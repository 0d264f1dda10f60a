#![forbid(unsafe_code)]

//! Transport collaborator: executes compiled text against a database.
//!
//! The crate never opens connections itself. A [`Transport`] receives the
//! compiled text with its bound parameters and opaque options, and returns
//! either a raw result or result rows. [`MemoryTransport`] records every call
//! and replays queued responses.

use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::trace;

use crate::error::{OrmError, Result};
use crate::query::Sql;
use crate::value::Value;

/// One result row.
pub type Row = JsonMap<String, JsonValue>;

/// Untyped result of a command.
pub type RawResult = JsonValue;

/// Parameters and pass-through options of one call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecOptions {
    /// Bound parameters by placeholder name.
    pub params: BTreeMap<String, Value>,
    /// Opaque options forwarded unchanged.
    pub extra: BTreeMap<String, JsonValue>,
}

impl ExecOptions {
    /// Options of a compiled statement, with `overrides` merged over its
    /// stored options.
    pub fn from_sql(sql: &Sql, overrides: &JsonMap<String, JsonValue>) -> Self {
        let mut extra = sql.options.extra.clone();
        extra.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self {
            params: sql.params.clone(),
            extra,
        }
    }

    /// Parameters as plain JSON.
    pub fn params_json(&self) -> JsonMap<String, JsonValue> {
        self.params
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect()
    }
}

/// Executes compiled statements.
pub trait Transport: Send + Sync {
    /// Runs a command and returns its raw result.
    fn execute(
        &self,
        text: &str,
        options: &ExecOptions,
    ) -> impl Future<Output = Result<RawResult>> + Send;

    /// Runs a query and returns its rows.
    fn query(
        &self,
        text: &str,
        options: &ExecOptions,
    ) -> impl Future<Output = Result<Vec<Row>>> + Send;
}

/// How a recorded call reached the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    /// [`Transport::execute`]
    Execute,
    /// [`Transport::query`]
    Query,
}

/// One call seen by a [`MemoryTransport`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedCall {
    /// Entry point used.
    pub kind: CallKind,
    /// Statement text.
    pub text: String,
    /// Parameters and options.
    pub options: ExecOptions,
}

#[derive(Debug, Default)]
struct MemoryState {
    calls: Vec<RecordedCall>,
    responses: VecDeque<Result<Vec<Row>>>,
}

/// In-memory transport recording calls and replaying queued responses.
///
/// Each call pops the next queued response; with an empty queue queries
/// return no rows and commands return `null`. Clones share state.
#[derive(Clone, Debug, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    /// Transport with no queued responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues rows for a later call.
    pub fn push_rows(&self, rows: Vec<Row>) {
        self.state.lock().responses.push_back(Ok(rows));
    }

    /// Queues one row built from a JSON object; other JSON values queue an
    /// empty result.
    pub fn push_json(&self, row: JsonValue) {
        let rows = match row {
            JsonValue::Object(map) => vec![map],
            JsonValue::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    JsonValue::Object(map) => Some(map),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        self.push_rows(rows);
    }

    /// Queues a failure for a later call.
    pub fn push_error(&self, err: OrmError) {
        self.state.lock().responses.push_back(Err(err));
    }

    /// Calls seen so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    /// Statement texts seen so far.
    pub fn texts(&self) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .map(|call| call.text.clone())
            .collect()
    }

    fn record(&self, kind: CallKind, text: &str, options: &ExecOptions) -> Result<Vec<Row>> {
        let mut state = self.state.lock();
        state.calls.push(RecordedCall {
            kind,
            text: text.to_string(),
            options: options.clone(),
        });
        trace!(?kind, text, calls = state.calls.len(), "transport.memory.call");
        state.responses.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

impl Transport for MemoryTransport {
    async fn execute(&self, text: &str, options: &ExecOptions) -> Result<RawResult> {
        let rows = self.record(CallKind::Execute, text, options)?;
        Ok(match rows.len() {
            0 => JsonValue::Null,
            _ => JsonValue::Array(rows.into_iter().map(JsonValue::Object).collect()),
        })
    }

    async fn query(&self, text: &str, options: &ExecOptions) -> Result<Vec<Row>> {
        self.record(CallKind::Query, text, options)
    }
}
