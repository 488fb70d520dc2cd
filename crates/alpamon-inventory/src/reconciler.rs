//! The inventory reconciler (component H): two entry points,
//! `commit` (bulk push) and `sync` (differential), both serialized per key
//! set by `alpamon-coalesce`'s single-flight primitive so concurrent
//! triggers for the same keys share one in-flight run.

use crate::coercion::coerce_rows;
use crate::diff::three_way_diff;
use crate::model::FactKey;
use crate::source::{FactSource, OsqueryFactSource, PipFactSource, SysinfoFactSource};
use alpamon_coalesce::CoalesceLayer;
use alpamon_core::Platform;
use alpamon_queue::{priority, Method, PriorityQueue, QueuedRequest};
use alpamon_transport::SharedClient;
use serde_json::Value;
use std::sync::Arc;
use tower::util::BoxCloneService;
use tower::{Layer, Service, ServiceExt};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Commit,
    Sync,
}

#[derive(Debug, Clone)]
struct ReconcileRequest {
    mode: Mode,
    keys: Vec<FactKey>,
}

fn reconcile_key(req: &ReconcileRequest) -> String {
    let mut names: Vec<&str> = req.keys.iter().map(|k| k.as_str()).collect();
    names.sort_unstable();
    format!("{:?}:{}", req.mode, names.join(","))
}

struct State {
    queue: PriorityQueue,
    client: SharedClient,
    platform: Platform,
    sources: Vec<Box<dyn FactSource>>,
}

impl State {
    fn resolve_keys(&self, keys: &[FactKey]) -> Vec<FactKey> {
        if keys.is_empty() {
            FactKey::ALL.to_vec()
        } else {
            keys.to_vec()
        }
    }

    /// Produces one key's rows, always as a `Vec` even for singleton keys;
    /// `server` is a composed routine rather than a single SQL query.
    async fn collect(&self, key: FactKey) -> Result<Vec<Value>, String> {
        match key {
            FactKey::Server => self.collect_server().await,
            other => {
                let source = self
                    .sources
                    .iter()
                    .find(|s| s.supports(other))
                    .ok_or_else(|| format!("no fact source available for {}", other.as_str()))?;
                let mut rows = source.collect(other, self.platform).await.map_err(|e| e.to_string())?;
                coerce_rows(&mut rows, other.def().coercions);
                Ok(rows)
            }
        }
    }

    async fn collect_server(&self) -> Result<Vec<Value>, String> {
        let osquery_version = match OsqueryFactSource.query("SELECT version AS osquery_version FROM osquery_info").await {
            Ok(rows) => rows.first().and_then(|r| r.get("osquery_version").cloned()),
            Err(_) => None,
        };
        let load = match OsqueryFactSource
            .query("SELECT average AS load FROM load_average WHERE period='1m'")
            .await
        {
            Ok(rows) => rows.first().and_then(|r| r.get("load").cloned()),
            Err(_) => None,
        };
        let mut row = serde_json::json!({
            "version": AGENT_VERSION,
            "osquery_version": osquery_version,
            "load": load,
        });
        coerce_rows(std::slice::from_mut(&mut row), FactKey::Server.def().coercions);
        Ok(vec![row])
    }

    async fn run_commit(&self, keys: Vec<FactKey>) -> Result<(), String> {
        #[cfg(feature = "tracing")]
        tracing::info!("starting inventory commit");
        let mut data = serde_json::Map::new();
        for key in &keys {
            let rows = self.collect(*key).await?;
            let value = if key.def().multirow || *key == FactKey::Server {
                Value::Array(rows)
            } else {
                rows.into_iter().next().unwrap_or(Value::Null)
            };
            data.insert(key.as_str().to_string(), value);
        }
        // server's fields are merged flat into the commit body rather than
        // nested under a "server" key, matching the original's `data.update(...)`.
        if let Some(Value::Array(mut server_rows)) = data.remove("server") {
            if let Some(Value::Object(server_obj)) = server_rows.pop() {
                for (k, v) in server_obj {
                    data.insert(k, v);
                }
            }
        }

        self.queue
            .enqueue(QueuedRequest::new(
                priority::INVENTORY,
                Method::Put,
                "/api/servers/servers/-/commit/",
                Value::Object(data),
            ))
            .await;
        self.queue
            .enqueue(QueuedRequest::new(
                priority::INVENTORY,
                Method::Post,
                "/api/events/events/",
                serde_json::json!({
                    "reporter": "alpamon",
                    "record": "committed",
                    "description": format!("Committed system information. version: {AGENT_VERSION}"),
                }),
            ))
            .await;
        #[cfg(feature = "tracing")]
        tracing::info!("finished inventory commit");
        Ok(())
    }

    async fn run_sync(&self, keys: Vec<FactKey>) -> Result<(), String> {
        for key in keys {
            if let Err(e) = self.sync_one(key).await {
                #[cfg(feature = "tracing")]
                tracing::error!(key = key.as_str(), error = %e, "inventory sync failed for key");
                let _ = e;
            }
        }
        Ok(())
    }

    async fn sync_one(&self, key: FactKey) -> Result<(), String> {
        let rows = self.collect(key).await?;
        let def = key.def();

        if key == FactKey::Server {
            let data = rows.into_iter().next().unwrap_or(Value::Null);
            self.queue
                .enqueue(QueuedRequest::new(priority::INVENTORY, Method::Patch, def.sync_url(), data))
                .await;
            return Ok(());
        }

        let response = self.client.request(reqwest::Method::GET, &def.sync_url(), None, std::time::Duration::from_secs(10)).await;
        let remote: Vec<Value> = match response {
            Ok(resp) if resp.status == 404 => Vec::new(),
            Ok(resp) if resp.is_success() => match resp.body {
                Value::Array(items) => items,
                Value::Null => Vec::new(),
                other if !def.multirow => vec![other],
                _ => Vec::new(),
            },
            Ok(resp) => {
                #[cfg(feature = "tracing")]
                tracing::error!(status = resp.status, key = key.as_str(), "failed to fetch remote snapshot");
                return Err(format!("HTTP {} fetching {} snapshot", resp.status, key.as_str()));
            }
            Err(e) => return Err(e.to_string()),
        };

        let diff = three_way_diff(def, self.platform, rows, remote);

        if let Some(create) = diff.create {
            self.queue
                .enqueue(QueuedRequest::new(priority::INVENTORY, Method::Post, def.collect_url, create))
                .await;
        }
        for (id, data) in diff.update {
            self.queue
                .enqueue(QueuedRequest::new(priority::INVENTORY, Method::Patch, format!("{}{}/", def.collect_url, id), data))
                .await;
        }
        for id in diff.delete {
            self.queue
                .enqueue(QueuedRequest::new(
                    priority::INVENTORY,
                    Method::Delete,
                    format!("{}{}/", def.collect_url, id),
                    Value::Null,
                ))
                .await;
        }
        Ok(())
    }
}

type ReconcileService = alpamon_coalesce::CoalesceService<
    BoxCloneService<ReconcileRequest, (), String>,
    String,
    ReconcileRequest,
    fn(&ReconcileRequest) -> String,
>;

/// The inventory reconciler. Cloning is cheap: the coalescing single-flight
/// map is shared, so cloned handles still serialize against one another.
#[derive(Clone)]
pub struct Reconciler {
    service: ReconcileService,
}

impl Reconciler {
    pub fn new(queue: PriorityQueue, client: SharedClient, platform: Platform) -> Self {
        let state = Arc::new(State {
            queue,
            client,
            platform,
            sources: vec![Box::new(OsqueryFactSource), Box::new(SysinfoFactSource), Box::new(PipFactSource)],
        });

        let inner = BoxCloneService::new(tower::service_fn(move |req: ReconcileRequest| {
            let state = Arc::clone(&state);
            async move {
                let keys = state.resolve_keys(&req.keys);
                match req.mode {
                    Mode::Commit => state.run_commit(keys).await,
                    Mode::Sync => state.run_sync(keys).await,
                }
            }
        }));

        let layer = CoalesceLayer::builder(reconcile_key as fn(&ReconcileRequest) -> String)
            .name("inventory-reconcile")
            .build();
        Self { service: layer.layer(inner) }
    }

    /// Whether the fact-query tool is present.
    pub fn has_fact_tool(&self) -> bool {
        alpamon_core::fact_tool_present()
    }

    pub async fn commit(&self, keys: Vec<String>) {
        self.run(Mode::Commit, keys).await;
    }

    pub async fn sync(&self, keys: Vec<String>) {
        self.run(Mode::Sync, keys).await;
    }

    async fn run(&self, mode: Mode, keys: Vec<String>) {
        let keys = keys.iter().filter_map(|k| FactKey::from_str(k)).collect();
        let mut svc = self.service.clone();
        let request = ReconcileRequest { mode, keys };
        match svc.ready().await {
            Ok(ready) => {
                if let Err(e) = ready.call(request).await {
                    #[cfg(feature = "tracing")]
                    tracing::error!(error = %e, "inventory reconciliation failed");
                    let _ = e;
                }
            }
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::error!(error = %e, "inventory reconciler service unavailable");
                let _ = e;
            }
        }
    }
}
