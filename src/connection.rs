//! Database handle.
//!
//! [`Database`] pairs an executor with the model registry and is what every
//! query, record and relation operation runs against. Statements are
//! rendered here for the executor's backend, logged, timed and counted.

use std::sync::Arc;
use std::time::Instant;

use sea_query::{DeleteStatement, InsertStatement, SelectStatement, UpdateStatement, Value, Values};

use crate::config::DatabaseConfig;
use crate::error::{OrmError, OrmResult};
use crate::executor::{Backend, LifeError, LifeExecutor, Row, RowStream};
use crate::model::{Model, ModelRef, ModelRegistry};
use crate::query::RecordQuery;
use crate::record::Record;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;
#[cfg(feature = "metrics")]
use crate::metrics::METRICS;

/// A statement that can be rendered for a backend.
pub trait Statement {
    fn render(&self, backend: Backend) -> (String, Values);
}

macro_rules! impl_statement {
    ($($ty:ty),*) => {
        $(
            impl Statement for $ty {
                fn render(&self, backend: Backend) -> (String, Values) {
                    self.build_any(backend.query_builder())
                }
            }
        )*
    };
}

impl_statement!(SelectStatement, InsertStatement, UpdateStatement, DeleteStatement);

/// Runtime switches read from [`DatabaseConfig`].
#[derive(Debug, Clone, Copy)]
pub struct Settings {
    /// Log every statement at debug level.
    pub log_queries: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self { log_queries: true }
    }
}

#[derive(Clone)]
pub struct Database {
    executor: Arc<dyn LifeExecutor>,
    registry: ModelRegistry,
    settings: Settings,
}

impl Database {
    pub fn new<E: LifeExecutor + 'static>(executor: E) -> Self {
        Self::from_executor(Arc::new(executor))
    }

    /// Share an executor the caller keeps a handle to (a mock it inspects,
    /// a pooled client).
    pub fn from_executor(executor: Arc<dyn LifeExecutor>) -> Self {
        Self {
            executor,
            registry: ModelRegistry::new(),
            settings: Settings::default(),
        }
    }

    pub fn with_config(mut self, config: &DatabaseConfig) -> Self {
        self.settings.log_queries = config.log_queries;
        if config.backend != self.executor.backend() {
            log::warn!(
                "configured backend {} differs from executor backend {}",
                config.backend.name(),
                self.executor.backend().name()
            );
        }
        self
    }

    /// Register a model so its scopes resolve and `query::<M>()` uses the
    /// registered declaration.
    pub fn register<M: Model>(mut self, model: M) -> Self {
        self.registry.register(Arc::new(model));
        self
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn executor(&self) -> &Arc<dyn LifeExecutor> {
        &self.executor
    }

    pub fn backend(&self) -> Backend {
        self.executor.backend()
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    fn model_ref<M: Model + Default>(&self) -> ModelRef {
        let model = M::default();
        match self.registry.model(model.type_name()) {
            Some(registered) => registered.clone(),
            None => Arc::new(model),
        }
    }

    /// Query over the rows of `M`.
    pub fn query<M: Model + Default>(&self) -> RecordQuery<'_> {
        RecordQuery::new(self, self.model_ref::<M>())
    }

    pub fn query_model(&self, model: ModelRef) -> RecordQuery<'_> {
        RecordQuery::new(self, model)
    }

    /// Record of `M` by primary key.
    pub fn get<M: Model + Default>(&self, id: impl Into<Value>) -> OrmResult<Option<Record>> {
        self.query::<M>().get(id)
    }

    /// A new, unsaved record of `M`.
    pub fn record<M: Model + Default>(&self) -> Record {
        Record::new(self.model_ref::<M>())
    }

    /// Fill a new record of `M` through the allow-list and save it.
    pub fn create<M, I, K, V>(&self, values: I) -> OrmResult<Record>
    where
        M: Model + Default,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut record = self.record::<M>();
        record.fill(values);
        record.save(self)?;
        Ok(record)
    }

    pub fn execute<S: Statement + ?Sized>(&self, stmt: &S) -> OrmResult<u64> {
        let (sql, values) = stmt.render(self.backend());
        self.run(&sql, |executor| executor.execute(&sql, &values))
    }

    pub fn query_one<S: Statement + ?Sized>(&self, stmt: &S) -> OrmResult<Option<Row>> {
        let (sql, values) = stmt.render(self.backend());
        self.run(&sql, |executor| executor.query_one(&sql, &values))
    }

    pub fn query_all<S: Statement + ?Sized>(&self, stmt: &S) -> OrmResult<Vec<Row>> {
        let (sql, values) = stmt.render(self.backend());
        self.run(&sql, |executor| executor.query_all(&sql, &values))
    }

    pub fn query_stream<S: Statement + ?Sized>(&self, stmt: &S) -> OrmResult<RowStream<'_>> {
        let (sql, values) = stmt.render(self.backend());
        self.run(&sql, |executor| executor.query_stream(&sql, &values))
    }

    pub fn last_insert_id(&self) -> OrmResult<Value> {
        Ok(self.executor.last_insert_id()?)
    }

    fn run<'s, T>(
        &'s self,
        sql: &str,
        op: impl FnOnce(&'s dyn LifeExecutor) -> Result<T, LifeError>,
    ) -> OrmResult<T> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::query_span(self.backend().name(), sql).entered();

        if self.settings.log_queries {
            log::debug!("{sql}");
        }
        let start = Instant::now();
        let result = op(self.executor.as_ref());
        let elapsed = start.elapsed();

        match result {
            Ok(value) => {
                #[cfg(feature = "metrics")]
                METRICS.record_query(elapsed);
                log::trace!("statement finished in {elapsed:?}");
                Ok(value)
            }
            Err(err) => {
                #[cfg(feature = "metrics")]
                METRICS.record_query_error();
                log::error!("statement failed after {elapsed:?}: {err}");
                Err(OrmError::from(err))
            }
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("backend", &self.backend())
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .finish()
    }
}

/// Open a PostgreSQL connection described by `config`.
#[cfg(feature = "postgres")]
pub fn connect(config: &DatabaseConfig) -> OrmResult<Database> {
    let executor = crate::postgres::PostgresExecutor::connect(&config.url)?;
    Ok(Database::new(executor).with_config(config))
}
