//! # User-Store Operations
//!
//! The concrete operations the engine drives: an HTTP client against the
//! remote user-store service, and the capability table that maps each
//! [`Mode`] to an operation function at startup. The engine itself only ever
//! sees an opaque `Record -> future<Result>` capability.
//!
//! The engine carries no internal timeout; whatever timeout policy applies
//! to a run belongs here, on the HTTP client.

use crate::cli::Mode;
use crate::records::Record;
use anyhow::{anyhow, Context, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// The future returned by one operation invocation.
pub type OperationFuture = BoxFuture<'static, Result<()>>;

/// An operation capability: consumes one record, settles with its outcome.
pub type Operation = Arc<dyn Fn(Record) -> OperationFuture + Send + Sync>;

/// Wrap an async closure as an [`Operation`] capability.
pub fn operation<F, Fut>(f: F) -> Operation
where
    F: Fn(Record) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |record| f(record).boxed())
}

/// HTTP client for the remote user-store service.
#[derive(Debug, Clone)]
pub struct UserStoreClient {
    http: reqwest::Client,
    base_url: String,
}

impl UserStoreClient {
    /// Build a client for `base_url`, optionally bounding every request by
    /// `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// `POST /users` with the full record payload.
    pub async fn create(&self, record: &Record) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/users", self.base_url))
            .json(record)
            .send()
            .await
            .with_context(|| format!("create request failed for {}", record.email))?;
        Self::check_status(response, &record.email).await
    }

    /// `GET /users/{email}`.
    pub async fn load(&self, email: &str) -> Result<()> {
        let response = self
            .http
            .get(format!("{}/users/{}", self.base_url, email))
            .send()
            .await
            .with_context(|| format!("load request failed for {}", email))?;
        Self::check_status(response, email).await
    }

    /// `DELETE /users/{email}`.
    pub async fn delete(&self, email: &str) -> Result<()> {
        let response = self
            .http
            .delete(format!("{}/users/{}", self.base_url, email))
            .send()
            .await
            .with_context(|| format!("delete request failed for {}", email))?;
        Self::check_status(response, email).await
    }

    /// `GET /users?email={email}` against the service's query index.
    pub async fn query(&self, email: &str) -> Result<()> {
        let response = self
            .http
            .get(format!("{}/users", self.base_url))
            .query(&[("email", email)])
            .send()
            .await
            .with_context(|| format!("query request failed for {}", email))?;
        Self::check_status(response, email).await
    }

    async fn check_status(response: reqwest::Response, email: &str) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(anyhow!(
                "user store returned {} for {}: {}",
                status,
                email,
                body.trim()
            ))
        }
    }
}

/// The closed mode-to-operation mapping, built once at startup.
///
/// Modes never dispatch by name at runtime; a missing entry is a
/// configuration error surfaced before the pipeline starts.
#[derive(Default)]
pub struct OperationTable {
    ops: BTreeMap<Mode, Operation>,
}

impl OperationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation for `mode`, replacing any previous entry.
    pub fn insert(&mut self, mode: Mode, op: Operation) {
        self.ops.insert(mode, op);
    }

    /// Look up the operation for `mode`.
    pub fn operation(&self, mode: Mode) -> Result<Operation> {
        self.ops
            .get(&mode)
            .cloned()
            .ok_or_else(|| anyhow!("no operation registered for mode {}", mode))
    }

    /// Build the full table over a shared user-store client.
    pub fn for_client(client: Arc<UserStoreClient>) -> Self {
        let mut table = Self::new();

        let c = Arc::clone(&client);
        table.insert(
            Mode::Create,
            operation(move |record: Record| {
                let c = Arc::clone(&c);
                async move { c.create(&record).await }
            }),
        );

        let c = Arc::clone(&client);
        table.insert(
            Mode::Load,
            operation(move |record: Record| {
                let c = Arc::clone(&c);
                async move { c.load(&record.email).await }
            }),
        );

        let c = Arc::clone(&client);
        table.insert(
            Mode::Delete,
            operation(move |record: Record| {
                let c = Arc::clone(&c);
                async move { c.delete(&record.email).await }
            }),
        );

        let c = Arc::clone(&client);
        table.insert(
            Mode::Query,
            operation(move |record: Record| {
                let c = Arc::clone(&c);
                async move { c.query(&record.email).await }
            }),
        );

        table
    }
}
