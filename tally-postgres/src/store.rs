use crate::error::PostgresError;
use log::{debug, trace};
use num_traits::ToPrimitive;
use postgres::{Client, NoTls};
use r2d2::{CustomizeConnection, ManageConnection, Pool, PooledConnection};
use r2d2_postgres::PostgresConnectionManager;
use std::{fmt, time::Duration};
use tally_core::{CounterKey, CounterRecord, CounterStore, Created, Raised};

/// Connection and layout settings for a [PostgresCounterStore].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// The counter table. Quoted as an identifier, so it may not be schema-qualified.
    pub table: String,

    /// Applied as `statement_timeout` on every pooled connection; `None` leaves the
    /// server default in place.
    pub statement_timeout: Option<Duration>,

    /// How long to wait for a pooled connection before giving up.
    pub checkout_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            table: "identity_counters".to_owned(),
            statement_timeout: Some(Duration::from_secs(5)),
            checkout_timeout: Duration::from_secs(30),
        }
    }
}

/// Sets `statement_timeout` on every connection as it is checked out of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementTimeout(pub Duration);

impl CustomizeConnection<Client, postgres::Error> for StatementTimeout {
    fn on_acquire(&self, conn: &mut Client) -> Result<(), postgres::Error> {
        // zero disables the timeout server-side
        let millis = self.0.as_millis().to_i32().unwrap_or(i32::max_value()).max(1);
        conn.batch_execute(&format!("SET statement_timeout = {}", millis))
    }
}

// CREATE TABLE identity_counters (
//   model text NOT NULL,
//   field text NOT NULL,
//   group_value text NOT NULL DEFAULT '',
//   count bigint NOT NULL,
//   UNIQUE (model, field, group_value)
// );

#[derive(Debug)]
struct Statements {
    create_table: String,
    find: String,
    create: String,
    raise: String,
    increment: String,
    set_count: String,
}

impl Statements {
    fn for_table(table: &str) -> Self {
        let table = quote_identifier(table);
        let key = "model = $1 AND field = $2 AND group_value = $3";

        Statements {
            create_table: format!(
                "CREATE TABLE IF NOT EXISTS {} (\
                 model text NOT NULL, \
                 field text NOT NULL, \
                 group_value text NOT NULL DEFAULT '', \
                 count bigint NOT NULL, \
                 UNIQUE (model, field, group_value))",
                table,
            ),
            find: format!("SELECT count FROM {} WHERE {}", table, key),
            create: format!(
                "INSERT INTO {} (model, field, group_value, count) VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (model, field, group_value) DO NOTHING",
                table,
            ),
            raise: format!("UPDATE {} SET count = $5 WHERE {} AND count < $4", table, key),
            increment: format!("UPDATE {} SET count = count + $4 WHERE {} RETURNING count", table, key),
            set_count: format!(
                "INSERT INTO {} (model, field, group_value, count) VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (model, field, group_value) DO UPDATE SET count = EXCLUDED.count \
                 RETURNING count",
                table,
            ),
        }
    }
}

fn quote_identifier(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// A counter store over a PostgreSQL table.
///
/// Generic over the pool's connection manager so that callers may bring their own
/// TLS setup; [connect](PostgresCounterStore::connect) builds an unencrypted pool.
pub struct PostgresCounterStore<M = PostgresConnectionManager<NoTls>>
where
    M: ManageConnection<Connection = Client>,
{
    pool: Pool<M>,
    config: Config,
    statements: Statements,
}

impl<M> fmt::Debug for PostgresCounterStore<M>
where
    M: ManageConnection<Connection = Client>,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PostgresCounterStore")
            .field("config", &self.config)
            .field("pool", &self.pool.state())
            .finish()
    }
}

impl PostgresCounterStore {
    /// Builds a pool from a connection string and wraps it.
    ///
    /// The configured statement timeout is installed as a connection customizer.
    pub fn connect(params: &str, config: Config) -> Result<Self, PostgresError> {
        let pg_config: postgres::Config = params.parse()?;
        let manager = PostgresConnectionManager::new(pg_config, NoTls);

        let mut builder = Pool::builder().connection_timeout(config.checkout_timeout);
        if let Some(timeout) = config.statement_timeout {
            builder = builder.connection_customizer(Box::new(StatementTimeout(timeout)));
        }

        let pool = builder.build(manager)?;
        Ok(PostgresCounterStore::with_pool(pool, config))
    }
}

impl<M> PostgresCounterStore<M>
where
    M: ManageConnection<Connection = Client>,
{
    /// Wraps an existing pool.
    ///
    /// The pool's own customizer governs statement timeouts; `config.statement_timeout`
    /// is only applied by [connect](PostgresCounterStore::connect).
    pub fn with_pool(pool: Pool<M>, config: Config) -> Self {
        let statements = Statements::for_table(&config.table);
        PostgresCounterStore {
            pool,
            config,
            statements,
        }
    }

    /// The store's configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Every counter row, ordered by key.
    pub fn records(&self) -> Result<Vec<CounterRecord>, PostgresError> {
        let mut conn = self.conn()?;
        let query = format!(
            "SELECT model, field, group_value, count FROM {} ORDER BY model, field, group_value",
            quote_identifier(&self.config.table),
        );

        conn.query(query.as_str(), &[])?
            .iter()
            .map(|row| {
                Ok(CounterRecord {
                    key: CounterKey::new(
                        row.try_get::<_, String>(0)?,
                        row.try_get::<_, String>(1)?,
                        row.try_get::<_, String>(2)?,
                    ),
                    count: row.try_get(3)?,
                })
            })
            .collect()
    }

    fn conn(&self) -> Result<PooledConnection<M>, PostgresError> {
        Ok(self.pool.get()?)
    }
}

impl<M> CounterStore for PostgresCounterStore<M>
where
    M: ManageConnection<Connection = Client>,
{
    type Error = PostgresError;

    fn initialize(&self) -> Result<(), Self::Error> {
        let mut conn = self.conn()?;
        conn.batch_execute(&self.statements.create_table)?;
        debug!("counter table {} ready", self.config.table);
        Ok(())
    }

    fn find(&self, key: &CounterKey) -> Result<Option<CounterRecord>, Self::Error> {
        let mut conn = self.conn()?;
        let row = conn.query_opt(self.statements.find.as_str(), &[&key.model(), &key.field(), &key.group()])?;

        match row {
            Some(row) => {
                let count: i64 = row.try_get(0)?;
                trace!("counter {}: loaded; count: {}", key, count);
                Ok(Some(CounterRecord {
                    key: key.to_owned(),
                    count,
                }))
            }
            None => {
                trace!("counter {}: no row found", key);
                Ok(None)
            }
        }
    }

    fn create_if_absent(&self, key: &CounterKey, initial_count: i64) -> Result<Created, Self::Error> {
        let mut conn = self.conn()?;
        let inserted = conn.execute(
            self.statements.create.as_str(),
            &[&key.model(), &key.field(), &key.group(), &initial_count],
        )?;

        trace!("counter {}: insert affected {} rows", key, inserted);
        Ok(if inserted == 0 { Created::Conflict } else { Created::Inserted })
    }

    fn compare_and_raise(&self, key: &CounterKey, lower_bound: i64, new_count: i64) -> Result<Raised, Self::Error> {
        let mut conn = self.conn()?;
        let updated = conn.execute(
            self.statements.raise.as_str(),
            &[&key.model(), &key.field(), &key.group(), &lower_bound, &new_count],
        )?;

        if updated > 0 {
            trace!("counter {}: raised; count: {}", key, new_count);
            return Ok(Raised::Updated);
        }

        // The guard failing and the row being gone look the same to UPDATE.
        let exists = conn
            .query_opt(self.statements.find.as_str(), &[&key.model(), &key.field(), &key.group()])?
            .is_some();

        if exists {
            Ok(Raised::NotApplied)
        } else {
            Err(PostgresError::Missing(key.to_owned()))
        }
    }

    fn increment_and_get(&self, key: &CounterKey, delta: i64) -> Result<i64, Self::Error> {
        let mut conn = self.conn()?;
        let row = conn.query_opt(
            self.statements.increment.as_str(),
            &[&key.model(), &key.field(), &key.group(), &delta],
        )?;

        match row {
            Some(row) => {
                let count: i64 = row.try_get(0)?;
                trace!("counter {}: incremented; count: {}", key, count);
                Ok(count)
            }
            None => Err(PostgresError::Missing(key.to_owned())),
        }
    }

    fn set_count(&self, key: &CounterKey, value: i64) -> Result<i64, Self::Error> {
        let mut conn = self.conn()?;
        let row = conn.query_one(
            self.statements.set_count.as_str(),
            &[&key.model(), &key.field(), &key.group(), &value],
        )?;

        let count: i64 = row.try_get(0)?;
        trace!("counter {}: set; count: {}", key, count);
        Ok(count)
    }
}
