//! Query executor
//!
//! Parameterised reads against an acquired store handle, with an
//! optional result cache keyed by fingerprint. Writes go through
//! [`QueryExecutor::transaction`], which applies a batch atomically on
//! success and discards it on error. Queries slower than the configured
//! threshold emit a structured warning.

mod cache;
mod fingerprint;

pub use cache::ResultCache;
pub use fingerprint::{canonicalize, fingerprint};

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use crate::config::QueryConfig;
use crate::error::{EngineError, EngineResult, ErrorCode};
use crate::observability::{Logger, MetricsRegistry};
use crate::pool::PooledHandle;
use crate::store::StoreBatch;

/// Read statements the executor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statement {
    /// Point lookup; params `{key}`
    GetByKey,
    /// Ordered prefix scan; params `{prefix, limit?}`
    RangeByPrefix,
    /// Record count under a prefix; params `{prefix}`
    CountByPrefix,
}

impl Statement {
    fn name(&self) -> &'static str {
        match self {
            Statement::GetByKey => "get_by_key",
            Statement::RangeByPrefix => "range_by_prefix",
            Statement::CountByPrefix => "count_by_prefix",
        }
    }
}

/// Per-call cache options.
#[derive(Debug, Clone, Default)]
pub struct CacheOptions {
    /// Explicit key overriding the computed fingerprint
    pub key: Option<String>,
}

/// The executor.
pub struct QueryExecutor {
    results: ResultCache,
    config: QueryConfig,
    logger: Arc<Logger>,
    metrics: Arc<MetricsRegistry>,
}

impl QueryExecutor {
    /// Executor with its result cache.
    pub fn new(config: QueryConfig, logger: Arc<Logger>, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            results: ResultCache::new(
                Duration::from_millis(config.cache_ttl_ms),
                config.cache_max_entries,
            ),
            config,
            logger,
            metrics,
        }
    }

    /// Execute a read, consulting the result cache when options are
    /// supplied.
    pub fn execute(
        &self,
        handle: &PooledHandle<'_>,
        statement: Statement,
        params: &Value,
        cache_opts: Option<CacheOptions>,
    ) -> EngineResult<Value> {
        self.metrics.inc_queries();
        let key = cache_opts.as_ref().map(|opts| {
            opts.key
                .clone()
                .unwrap_or_else(|| fingerprint(statement.name(), params))
        });
        if let Some(key) = &key {
            if let Some(hit) = self.results.get(key) {
                return Ok(hit);
            }
        }

        let started = Instant::now();
        let result = self.run_statement(handle, statement, params)?;
        let elapsed = started.elapsed();
        if elapsed > Duration::from_millis(self.config.slow_query_ms) {
            self.metrics.inc_slow_queries();
            self.logger.warn(
                "slow_query",
                &[
                    ("statement", statement.name().to_string()),
                    ("elapsed_ms", elapsed.as_millis().to_string()),
                ],
            );
        }

        if let Some(key) = key {
            self.results.insert(key, result.clone());
        }
        Ok(result)
    }

    fn run_statement(
        &self,
        handle: &PooledHandle<'_>,
        statement: Statement,
        params: &Value,
    ) -> EngineResult<Value> {
        let store = handle
            .store()
            .read()
            .map_err(|_| EngineError::internal("query.execute", "store lock poisoned"))?;
        match statement {
            Statement::GetByKey => {
                let key = require_str(params, "key")?;
                Ok(store
                    .get(key)
                    .map(|record| record.body.clone())
                    .unwrap_or(Value::Null))
            }
            Statement::RangeByPrefix => {
                let prefix = require_str(params, "prefix")?;
                let limit = params
                    .get("limit")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(u64::MAX) as usize;
                let rows: Vec<Value> = store
                    .range(prefix)
                    .into_iter()
                    .take(limit)
                    .map(|record| json!({ "key": record.key, "body": record.body }))
                    .collect();
                Ok(Value::Array(rows))
            }
            Statement::CountByPrefix => {
                let prefix = require_str(params, "prefix")?;
                Ok(json!(store.range(prefix).len()))
            }
        }
    }

    /// Apply a non-returning write batch.
    pub fn run(&self, handle: &PooledHandle<'_>, batch: StoreBatch) -> EngineResult<()> {
        let mut store = handle
            .store()
            .write()
            .map_err(|_| EngineError::internal("query.run", "store lock poisoned"))?;
        store.apply(batch)?;
        self.results.clear();
        Ok(())
    }

    /// Run `body` against a staged batch; the batch commits only when
    /// `body` returns Ok. On error nothing reaches the store.
    pub fn transaction<T, F>(&self, handle: &PooledHandle<'_>, body: F) -> EngineResult<T>
    where
        F: FnOnce(&mut StoreBatch) -> EngineResult<T>,
    {
        let mut batch = StoreBatch::new();
        let value = body(&mut batch)?;
        if !batch.is_empty() {
            let mut store = handle
                .store()
                .write()
                .map_err(|_| EngineError::internal("query.transaction", "store lock poisoned"))?;
            store.apply(batch)?;
            self.results.clear();
        }
        Ok(value)
    }

    /// The result cache, for stats and invalidation.
    pub fn results(&self) -> &ResultCache {
        &self.results
    }
}

fn require_str<'a>(params: &'a Value, field: &str) -> EngineResult<&'a str> {
    params
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            EngineError::new(
                ErrorCode::MissingField,
                "query.execute",
                format!("missing parameter: {}", field),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::pool::StorePool;
    use crate::store::TaskStore;
    use std::sync::RwLock;
    use tempfile::TempDir;

    fn executor() -> QueryExecutor {
        QueryExecutor::new(
            QueryConfig::default(),
            Arc::new(Logger::disabled()),
            Arc::new(MetricsRegistry::new()),
        )
    }

    fn pooled_store() -> (StorePool, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RwLock::new(TaskStore::open(dir.path()).unwrap()));
        (StorePool::new(store, PoolConfig::default()), dir)
    }

    #[test]
    fn get_by_key_reads_through() {
        let (pool, _dir) = pooled_store();
        let exec = executor();
        let handle = pool.acquire(Duration::from_millis(100)).unwrap();
        let mut batch = StoreBatch::new();
        batch.put("task:proj/a", json!({"name": "a"}));
        exec.run(&handle, batch).unwrap();

        let result = exec
            .execute(
                &handle,
                Statement::GetByKey,
                &json!({"key": "task:proj/a"}),
                None,
            )
            .unwrap();
        assert_eq!(result, json!({"name": "a"}));
    }

    #[test]
    fn cached_read_skips_store_after_first_hit() {
        let (pool, _dir) = pooled_store();
        let exec = executor();
        let handle = pool.acquire(Duration::from_millis(100)).unwrap();
        let params = json!({"key": "task:proj/a"});
        exec.execute(&handle, Statement::GetByKey, &params, Some(CacheOptions::default()))
            .unwrap();
        exec.execute(&handle, Statement::GetByKey, &params, Some(CacheOptions::default()))
            .unwrap();
        let (hits, _) = exec.results().counters();
        assert_eq!(hits, 1);
    }

    #[test]
    fn writes_invalidate_cached_results() {
        let (pool, _dir) = pooled_store();
        let exec = executor();
        let handle = pool.acquire(Duration::from_millis(100)).unwrap();
        let params = json!({"key": "task:proj/a"});
        let opts = Some(CacheOptions::default());

        let miss = exec
            .execute(&handle, Statement::GetByKey, &params, opts.clone())
            .unwrap();
        assert_eq!(miss, Value::Null);

        let mut batch = StoreBatch::new();
        batch.put("task:proj/a", json!({"name": "a"}));
        exec.run(&handle, batch).unwrap();

        let fresh = exec
            .execute(&handle, Statement::GetByKey, &params, opts)
            .unwrap();
        assert_eq!(fresh, json!({"name": "a"}));
    }

    #[test]
    fn failed_transaction_commits_nothing() {
        let (pool, _dir) = pooled_store();
        let exec = executor();
        let handle = pool.acquire(Duration::from_millis(100)).unwrap();
        let result: EngineResult<()> = exec.transaction(&handle, |batch| {
            batch.put("task:proj/a", json!({"name": "a"}));
            Err(EngineError::internal("test", "forced failure"))
        });
        assert!(result.is_err());
        let read = exec
            .execute(
                &handle,
                Statement::GetByKey,
                &json!({"key": "task:proj/a"}),
                None,
            )
            .unwrap();
        assert_eq!(read, Value::Null);
    }

    #[test]
    fn range_and_count_by_prefix() {
        let (pool, _dir) = pooled_store();
        let exec = executor();
        let handle = pool.acquire(Duration::from_millis(100)).unwrap();
        let mut batch = StoreBatch::new();
        batch.put("task:proj/a", json!(1));
        batch.put("task:proj/b", json!(2));
        batch.put("project:proj", json!(0));
        exec.run(&handle, batch).unwrap();

        let rows = exec
            .execute(
                &handle,
                Statement::RangeByPrefix,
                &json!({"prefix": "task:"}),
                None,
            )
            .unwrap();
        assert_eq!(rows.as_array().unwrap().len(), 2);

        let count = exec
            .execute(
                &handle,
                Statement::CountByPrefix,
                &json!({"prefix": "task:"}),
                None,
            )
            .unwrap();
        assert_eq!(count, json!(2));
    }
}
