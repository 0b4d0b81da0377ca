//! Query bridge between models and the SQL builder.
//!
//! A [`RecordQuery`] is bound to one model. Builder methods consume and
//! return the query; terminal methods (`first`, `all`, `count`, `cursor`,
//! `batch`, `insert`, `update`, `delete`) render it for the connection's
//! backend, run it and hydrate rows into [`Record`]s. Eager loading of the
//! configured includes happens inside `first` and `all`.
//!
//! # Examples
//!
//! ```no_run
//! use tidepool::{Database, MockExecutor, Model};
//! use tidepool::sea_query::Order;
//!
//! #[derive(Default)]
//! struct User;
//!
//! impl Model for User {
//!     fn table_name(&self) -> &str {
//!         "users"
//!     }
//! }
//!
//! let db = Database::new(MockExecutor::default());
//! let users = db
//!     .query::<User>()
//!     .where_eq("active", true)
//!     .order_by("name", Order::Asc)
//!     .limit(10)
//!     .all()?;
//! # Ok::<(), tidepool::OrmError>(())
//! ```

pub(crate) mod hooks;
pub mod includes;

use std::fmt;

use sea_query::{
    Alias, Asterisk, Condition, Expr, Func, IntoCondition, JoinType, Order, Query,
    SelectStatement, SimpleExpr, Value,
};

use crate::connection::Database;
use crate::error::{OrmError, OrmResult};
use crate::model::ModelRef;
use crate::record::{Columns, Record};
use crate::relation::eager;
use crate::result_set::ResultSet;
use crate::value::{as_i64, is_null};

pub use includes::{Include, Includes, RelationFilter};

/// Alias of the `COUNT(*)` column read back by [`RecordQuery::count`].
const AGGREGATE: &str = "aggregate";

/// Table-qualified column expression.
pub fn col(table: &str, column: &str) -> Expr {
    Expr::col((Alias::new(table), Alias::new(column)))
}

/// Query over the rows of one model.
#[derive(Clone)]
pub struct RecordQuery<'a> {
    db: &'a Database,
    model: ModelRef,
    select: SelectStatement,
    condition: Condition,
    columns: Option<Vec<String>>,
    extras: Vec<(SimpleExpr, String)>,
    joined: bool,
    ordered: bool,
    read_only: bool,
    includes: Includes,
}

impl<'a> RecordQuery<'a> {
    /// Start a query over `model`, seeded with its default includes.
    pub fn new(db: &'a Database, model: ModelRef) -> Self {
        let mut select = Query::select();
        select.from(Alias::new(model.table_name()));
        let includes = model.includes().iter().copied().collect();
        Self {
            db,
            model,
            select,
            condition: Condition::all(),
            columns: None,
            extras: Vec::new(),
            joined: false,
            ordered: false,
            read_only: false,
            includes,
        }
    }

    pub fn model(&self) -> &ModelRef {
        &self.model
    }

    pub fn table(&self) -> &str {
        self.model.table_name()
    }

    pub fn includes(&self) -> &Includes {
        &self.includes
    }

    /// Add a condition, AND-ed with the existing ones.
    pub fn filter<F>(mut self, condition: F) -> Self
    where
        F: IntoCondition,
    {
        self.condition = self.condition.add(condition.into_condition());
        self
    }

    /// `table.column = value`, or `IS NULL` for a null value.
    pub fn where_eq(self, column: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        let column = col(self.table(), column);
        if is_null(&value) {
            self.filter(column.is_null())
        } else {
            self.filter(column.eq(value))
        }
    }

    /// `table.column IN (...)`. An empty list matches nothing.
    pub fn where_in<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        let column = col(self.table(), column);
        self.filter(column.is_in(values))
    }

    /// Order by a column of this model or by the alias of a computed column.
    pub fn order_by(mut self, column: &str, order: Order) -> Self {
        if self.extras.iter().any(|(_, alias)| alias == column) {
            self.select.order_by(Alias::new(column), order);
        } else {
            self.select
                .order_by((Alias::new(self.model.table_name()), Alias::new(column)), order);
        }
        self.ordered = true;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.select.limit(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.select.offset(offset);
        self
    }

    /// Select only these columns. Records hydrated from a partial
    /// projection are read-only.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self.read_only = true;
        self
    }

    /// Hydrate read-only records and refuse writes through this query.
    pub fn as_read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn join(mut self, table: &str, on: SimpleExpr) -> Self {
        self.select.join(JoinType::InnerJoin, Alias::new(table), on);
        self.joined = true;
        self
    }

    pub fn left_join(mut self, table: &str, on: SimpleExpr) -> Self {
        self.select.join(JoinType::LeftJoin, Alias::new(table), on);
        self.joined = true;
        self
    }

    /// Select an extra expression under `alias`, next to the model columns.
    pub(crate) fn select_also(mut self, expr: SimpleExpr, alias: &str) -> Self {
        self.extras.push((expr, alias.to_owned()));
        self
    }

    /// Add a `<relation>_count` column holding the number of related rows.
    pub fn with_count_of(self, relation: &str) -> OrmResult<Self> {
        let declared = self
            .model
            .relation(relation)
            .ok_or_else(|| OrmError::unknown_relation(self.model.type_name(), relation))?;
        let expr = declared.count_subquery(self.table());
        Ok(self.select_also(expr, &format!("{relation}_count")))
    }

    /// Eager-load these relation paths (`"articles"`, `"articles.comments"`).
    pub fn including<I, T>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Include>,
    {
        for path in paths {
            self.includes.insert(path);
        }
        self
    }

    /// Eager-load `path`, narrowing the query of its last segment.
    pub fn including_with<F>(mut self, path: &str, filter: F) -> Self
    where
        F: for<'q> Fn(RecordQuery<'q>) -> RecordQuery<'q> + Send + Sync + 'static,
    {
        self.includes.insert(Include::filtered(path, filter));
        self
    }

    /// Drop `path` (and paths nested beneath it) from the includes,
    /// including ones the model loads by default.
    pub fn excluding(mut self, path: &str) -> Self {
        self.includes.remove(path);
        self
    }

    pub fn clear_includes(mut self) -> Self {
        self.includes.clear();
        self
    }

    /// Paths forwarded from the level above: their exclusions override this
    /// model's default includes.
    pub(crate) fn merge_includes(mut self, forward: Includes) -> Self {
        self.includes.merge(forward);
        self
    }

    /// Apply a scope registered for this model.
    ///
    /// # Errors
    ///
    /// [`OrmError::UndefinedScope`] when no scope of that name is registered.
    pub fn scope(self, name: &str, args: &[Value]) -> OrmResult<Self> {
        let scope = self
            .db
            .registry()
            .scope(self.model.type_name(), name)
            .ok_or_else(|| OrmError::UndefinedScope {
                model: self.model.type_name().to_owned(),
                scope: name.to_owned(),
            })?;
        Ok(scope(self, args))
    }

    /// The SELECT this query renders to.
    pub fn to_statement(&self) -> SelectStatement {
        let table = self.model.table_name();
        let mut stmt = self.select.clone();
        match &self.columns {
            Some(columns) => {
                for column in columns {
                    stmt.column((Alias::new(table), Alias::new(column.as_str())));
                }
            }
            None if self.joined => {
                stmt.column((Alias::new(table), Asterisk));
            }
            None => {
                stmt.column(Asterisk);
            }
        }
        for (expr, alias) in &self.extras {
            stmt.expr_as(expr.clone(), Alias::new(alias.as_str()));
        }
        if !self.condition.is_empty() {
            stmt.cond_where(self.condition.clone());
        }
        stmt
    }

    /// First matching record, with includes loaded.
    pub fn first(mut self) -> OrmResult<Option<Record>> {
        self.select.limit(1);
        let Some(row) = self.db.query_one(&self.to_statement())? else {
            return Ok(None);
        };
        let mut records = [self.hydrate(row)];
        if !self.includes.is_empty() {
            eager::load(self.db, &self.model, &mut records, &self.includes)?;
        }
        let [record] = records;
        Ok(Some(record))
    }

    /// Like [`first`](Self::first), failing with [`OrmError::NotFound`].
    pub fn first_or_fail(self) -> OrmResult<Record> {
        let table = self.table().to_owned();
        self.first()?.ok_or(OrmError::NotFound { table })
    }

    /// Record by primary key.
    pub fn get(self, id: impl Into<Value>) -> OrmResult<Option<Record>> {
        let key = self.model.primary_key().to_owned();
        self.where_eq(&key, id).first()
    }

    /// Every matching record. Includes are loaded with one query per
    /// relation per level, whatever the number of rows.
    pub fn all(self) -> OrmResult<ResultSet> {
        let rows = self.db.query_all(&self.to_statement())?;
        let mut records: Vec<Record> = rows.into_iter().map(|row| self.hydrate(row)).collect();
        if !self.includes.is_empty() {
            eager::load(self.db, &self.model, &mut records, &self.includes)?;
        }
        Ok(ResultSet::new(records).with_model(self.model.clone()))
    }

    /// `COUNT(*)` of the matching rows, ignoring order, limit and offset.
    pub fn count(&self) -> OrmResult<u64> {
        let mut stmt = self.select.clone();
        stmt.clear_order_by().reset_limit().reset_offset();
        stmt.expr_as(Func::count(Expr::col(Asterisk)), Alias::new(AGGREGATE));
        if !self.condition.is_empty() {
            stmt.cond_where(self.condition.clone());
        }
        let total = self
            .db
            .query_one(&stmt)?
            .and_then(|row| row.get(AGGREGATE).and_then(as_i64))
            .unwrap_or(0);
        Ok(u64::try_from(total).unwrap_or(0))
    }

    /// Stream records one row at a time. Includes are not loaded; use
    /// [`batch`](Self::batch) when relations are needed.
    pub fn cursor(self) -> OrmResult<Box<dyn Iterator<Item = OrmResult<Record>> + 'a>> {
        let db = self.db;
        let stream = db.query_stream(&self.to_statement())?;
        let model = self.model.clone();
        let read_only = self.read_only;
        Ok(Box::new(stream.map(move |row| {
            row.map(|row| Record::hydrate(model.clone(), row, read_only, Includes::new()))
                .map_err(OrmError::from)
        })))
    }

    /// Walk the matching rows in pages of `size`, includes loaded per page.
    /// Unordered queries are ordered by primary key so pages are stable.
    pub fn batch<F>(mut self, size: u64, mut each: F) -> OrmResult<()>
    where
        F: FnMut(ResultSet) -> OrmResult<()>,
    {
        let size = size.max(1);
        if !self.ordered {
            let key = self.model.primary_key().to_owned();
            self = self.order_by(&key, Order::Asc);
        }
        let mut offset = 0;
        loop {
            let page = self.clone().limit(size).offset(offset).all()?;
            let fetched = page.len() as u64;
            if fetched == 0 {
                break;
            }
            each(page)?;
            if fetched < size {
                break;
            }
            offset += size;
        }
        Ok(())
    }

    /// Insert one row; returns the columns actually written.
    pub fn insert(&self, columns: Columns) -> OrmResult<Columns> {
        self.insert_row(columns, false).map(|(written, _)| written)
    }

    /// Insert one row and return the key the database assigned.
    pub fn insert_and_get_id(&self, columns: Columns) -> OrmResult<Value> {
        let (_, id) = self.insert_row(columns, true)?;
        id.ok_or_else(|| OrmError::MissingPrimaryKey {
            table: self.table().to_owned(),
            key: self.model.primary_key().to_owned(),
        })
    }

    pub(crate) fn insert_row(
        &self,
        mut columns: Columns,
        want_id: bool,
    ) -> OrmResult<(Columns, Option<Value>)> {
        self.guard()?;
        hooks::stamp_insert(self.model.as_ref(), &mut columns);
        self.model.before_insert(&mut columns)?;

        let key = self.model.primary_key();
        let mut stmt = Query::insert();
        stmt.into_table(Alias::new(self.table()));
        if columns.is_empty() {
            stmt.or_default_values();
        } else {
            stmt.columns(columns.keys().map(|column| Alias::new(column.as_str())));
            stmt.values(columns.values().cloned().map(SimpleExpr::Value))?;
        }

        let id = if !want_id {
            self.db.execute(&stmt)?;
            None
        } else if self.db.backend().supports_returning() {
            stmt.returning_col(Alias::new(key));
            self.db
                .query_one(&stmt)?
                .and_then(|row| row.get(key).cloned())
        } else {
            self.db.execute(&stmt)?;
            Some(self.db.last_insert_id()?)
        };

        self.model.after_insert(&columns)?;
        Ok((columns, id))
    }

    /// Update every matching row; returns the number of rows affected.
    pub fn update(&self, columns: Columns) -> OrmResult<u64> {
        self.update_rows(columns).map(|(affected, _)| affected)
    }

    pub(crate) fn update_rows(&self, mut columns: Columns) -> OrmResult<(u64, Columns)> {
        self.guard()?;
        hooks::stamp_update(self.model.as_ref(), &mut columns);
        self.model.before_update(&mut columns)?;
        if columns.is_empty() {
            return Ok((0, columns));
        }

        let mut stmt = Query::update();
        stmt.table(Alias::new(self.table())).values(
            columns
                .iter()
                .map(|(column, value)| (Alias::new(column.as_str()), SimpleExpr::Value(value.clone()))),
        );
        if !self.condition.is_empty() {
            stmt.cond_where(self.condition.clone());
        }
        let affected = self.db.execute(&stmt)?;
        self.model.after_update(&columns, affected)?;
        Ok((affected, columns))
    }

    /// Delete every matching row; returns the number of rows affected.
    pub fn delete(&self) -> OrmResult<u64> {
        self.guard()?;
        self.model.before_delete()?;
        let mut stmt = Query::delete();
        stmt.from_table(Alias::new(self.table()));
        if !self.condition.is_empty() {
            stmt.cond_where(self.condition.clone());
        }
        let affected = self.db.execute(&stmt)?;
        self.model.after_delete(affected)?;
        Ok(affected)
    }

    fn guard(&self) -> OrmResult<()> {
        if self.read_only || self.model.read_only() {
            return Err(OrmError::read_only(self.table()));
        }
        Ok(())
    }

    fn hydrate(&self, row: crate::executor::Row) -> Record {
        Record::hydrate(
            self.model.clone(),
            row,
            self.read_only,
            self.includes.clone(),
        )
    }
}

impl fmt::Debug for RecordQuery<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (sql, _) = self
            .to_statement()
            .build_any(self.db.backend().query_builder());
        f.debug_struct("RecordQuery")
            .field("table", &self.table())
            .field("sql", &sql)
            .field("includes", &self.includes.paths())
            .finish()
    }
}
