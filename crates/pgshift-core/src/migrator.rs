//! Migrator - create, apply and revert migrations
//!
//! `up` and `down` run their whole batch inside one transaction. A failure
//! anywhere in the batch rolls every statement and ledger write back and is
//! reported as [`MigrationOutcome::RolledBack`] instead of an error; only
//! failures outside the transaction (connecting, reading the ledger) are
//! returned as errors.
//!
//! Nothing guards against two processes migrating the same database at once.

use chrono::{SubsecRound, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::MigratorConfig;
use crate::database::{Connector, Executor, PgConnector, SqlValue};
use crate::error::{MigrateError, MigrateResult};
use crate::ledger::{LedgerQueries, LedgerRecord};
use crate::naming::{self, Direction, Migration};
use crate::script;
use crate::store::{MigrationStore, ScriptFile, TraversalResult};

/// Result of an `up` or `down` run
#[derive(Debug)]
pub enum MigrationOutcome {
    /// Nothing needed to run
    UpToDate,
    /// Migrations applied by `up`, in order
    Applied(Vec<Migration>),
    /// Ledger records reverted by `down`, in order
    Reverted(Vec<LedgerRecord>),
    /// The batch failed and was rolled back; the ledger is unchanged
    RolledBack { cause: MigrateError },
}

impl MigrationOutcome {
    pub fn is_rolled_back(&self) -> bool {
        matches!(self, MigrationOutcome::RolledBack { .. })
    }

    /// Number of migrations applied or reverted
    pub fn count(&self) -> usize {
        match self {
            MigrationOutcome::Applied(migrations) => migrations.len(),
            MigrationOutcome::Reverted(records) => records.len(),
            MigrationOutcome::UpToDate | MigrationOutcome::RolledBack { .. } => 0,
        }
    }
}

/// Orchestrates migrations between a local directory and a database ledger
pub struct Migrator {
    config: MigratorConfig,
    connector: Arc<dyn Connector>,
}

impl Migrator {
    /// Create a migrator for the configured PostgreSQL database
    pub fn new(config: MigratorConfig) -> Self {
        let connector = Arc::new(PgConnector::new(&config.database));
        Self::with_connector(config, connector)
    }

    /// Create a migrator that obtains its connections from `connector`
    pub fn with_connector(config: MigratorConfig, connector: Arc<dyn Connector>) -> Self {
        Self { config, connector }
    }

    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    fn store(&self) -> MigrationStore {
        MigrationStore::new(&self.config.path)
    }

    fn executor(&self) -> Executor<LedgerRecord> {
        Executor::new(self.connector.connection(), LedgerRecord::from_row)
    }

    fn queries(&self) -> LedgerQueries {
        LedgerQueries::new(&self.config.table)
    }

    /// Create a new migration group with placeholder up and down scripts
    ///
    /// Never touches the database.
    pub async fn create(&self, name: &str) -> MigrateResult<Migration> {
        if name.trim().is_empty() {
            return Err(MigrateError::InvalidName {
                name: name.to_string(),
                reason: "name must not be empty".to_string(),
            });
        }

        let store = self.store();
        let sanitized = naming::sanitize(name);

        let existing = store
            .find(|group| {
                naming::decode(&group.directory)
                    .map(|migration| migration.name == sanitized)
                    .unwrap_or(false)
            })
            .await?;

        if let Some(group) = existing {
            debug!("Migration {} already exists as {}", name, group.directory);
            return Err(MigrateError::NameAlreadyExists {
                name: name.to_string(),
            });
        }

        let migration = Migration::new(sanitized, Utc::now().trunc_subsecs(3));
        let directory = migration.encode();

        let files = [Direction::Up, Direction::Down]
            .into_iter()
            .map(|direction| {
                ScriptFile::from_text(
                    migration.script(direction).encode(),
                    script::template(&migration, direction),
                )
            })
            .collect();

        store.write(&directory, files).await?;

        info!("Migration {} created.", directory);
        Ok(migration)
    }

    /// Apply every local migration not yet recorded in the ledger
    pub async fn up(&self) -> MigrateResult<MigrationOutcome> {
        let store = self.store();

        let local = store.list().await?;
        if local.is_empty() {
            info!("No migrations found in {}", store.root().display());
            return Ok(MigrationOutcome::UpToDate);
        }

        let mut executor = self.executor();
        let result = self.apply_pending(&mut executor, store, local).await;
        finish(&mut executor, result).await
    }

    /// Revert every migration recorded in the ledger, most recent first
    pub async fn down(&self) -> MigrateResult<MigrationOutcome> {
        let mut executor = self.executor();
        let result = self.revert_applied(&mut executor, self.store()).await;
        finish(&mut executor, result).await
    }

    async fn apply_pending(
        &self,
        executor: &mut Executor<LedgerRecord>,
        store: MigrationStore,
        local: Vec<TraversalResult>,
    ) -> MigrateResult<MigrationOutcome> {
        let queries = self.queries();

        executor.connect().await?;
        let ledger = fetch_ledger(executor, &queries.select_sql()).await?;
        let applied: HashSet<&str> = ledger.iter().map(|record| record.name.as_str()).collect();

        // Diff by name only: a re-created migration with a known name counts as applied
        let runnable: Vec<TraversalResult> = local
            .into_iter()
            .filter(|group| match naming::decode(&group.directory) {
                Ok(migration) => !applied.contains(migration.name.as_str()),
                Err(e) => {
                    warn!("Skipping {}: {}", group.directory, e);
                    false
                }
            })
            .collect();

        if runnable.is_empty() {
            info!("Migrations are up to date.");
            return Ok(MigrationOutcome::UpToDate);
        }

        executor.run(&queries.create_table_sql(), &[]).await?;

        let batch = executor
            .transaction(move |tx| {
                Box::pin(async move {
                    let mut migrations = Vec::with_capacity(runnable.len());
                    for group in &runnable {
                        migrations.push(apply_group(tx, &store, &queries, group).await?);
                    }
                    Ok::<_, MigrateError>(migrations)
                })
            })
            .await;

        match batch {
            Ok(migrations) => {
                info!("Migration up complete.");
                Ok(MigrationOutcome::Applied(migrations))
            }
            Err(cause) => {
                error!("Something went wrong, canceling migrations. {}", cause);
                Ok(MigrationOutcome::RolledBack { cause })
            }
        }
    }

    async fn revert_applied(
        &self,
        executor: &mut Executor<LedgerRecord>,
        store: MigrationStore,
    ) -> MigrateResult<MigrationOutcome> {
        let queries = self.queries();

        executor.connect().await?;
        let ledger = fetch_ledger(executor, &queries.select_latest_first_sql()).await?;

        if ledger.is_empty() {
            info!("No applied migrations to revert.");
            return Ok(MigrationOutcome::UpToDate);
        }

        let batch = executor
            .transaction(move |tx| {
                Box::pin(async move {
                    for record in &ledger {
                        revert_record(tx, &store, &queries, record).await?;
                    }
                    Ok::<_, MigrateError>(ledger)
                })
            })
            .await;

        match batch {
            Ok(records) => {
                info!("Migration down complete.");
                Ok(MigrationOutcome::Reverted(records))
            }
            Err(cause) => {
                error!("Something went wrong, canceling migrations. {}", cause);
                Ok(MigrationOutcome::RolledBack { cause })
            }
        }
    }
}

/// Disconnect whatever happened, preferring the operation's own error
async fn finish(
    executor: &mut Executor<LedgerRecord>,
    result: MigrateResult<MigrationOutcome>,
) -> MigrateResult<MigrationOutcome> {
    let disconnected = executor.disconnect().await;
    let outcome = result?;
    disconnected?;
    Ok(outcome)
}

/// Read the ledger; a ledger table that does not exist yet is an empty ledger
async fn fetch_ledger(
    executor: &mut Executor<LedgerRecord>,
    sql: &str,
) -> MigrateResult<Vec<LedgerRecord>> {
    match executor.execute(sql, &[]).await {
        Ok(records) => Ok(records),
        Err(e) if e.is_undefined_table() => {
            debug!("Ledger table does not exist yet: {}", e);
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

async fn apply_group(
    tx: &mut Executor<LedgerRecord>,
    store: &MigrationStore,
    queries: &LedgerQueries,
    group: &TraversalResult,
) -> MigrateResult<Migration> {
    let file = script_file(group, Direction::Up)?;
    let text = store.read(&group.directory, &file).await?;

    for statement in script::split_statements(&text) {
        tx.run(statement, &[]).await?;
    }

    let migration = naming::decode(&file)?;
    info!("Applied {}\n{}", migration.name, text);

    let record = LedgerRecord::from(&migration);
    tx.run(&queries.insert_sql(), &record.params()).await?;

    info!("Migration {} ran.", group.directory);
    Ok(migration)
}

async fn revert_record(
    tx: &mut Executor<LedgerRecord>,
    store: &MigrationStore,
    queries: &LedgerQueries,
    record: &LedgerRecord,
) -> MigrateResult<()> {
    let group = store
        .find(|group| {
            naming::decode(&group.directory)
                .map(|migration| migration.name == record.name)
                .unwrap_or(false)
        })
        .await?
        .ok_or_else(|| MigrateError::MissingGroup {
            name: record.name.clone(),
        })?;

    let file = script_file(&group, Direction::Down)?;
    let text = store.read(&group.directory, &file).await?;

    for statement in script::split_statements(&text) {
        tx.run(statement, &[]).await?;
    }

    info!("Reverted {}\n{}", record.name, text);

    tx.run(&queries.delete_sql(), &[SqlValue::Text(record.name.clone())])
        .await?;

    info!("Migration {} reverted.", record.migration().encode());
    Ok(())
}

/// The script of `group` running in `direction`, judged by its decoded name
fn script_file(group: &TraversalResult, direction: Direction) -> MigrateResult<String> {
    group
        .files
        .iter()
        .find(|file| {
            naming::decode(file)
                .map(|migration| migration.direction == Some(direction))
                .unwrap_or(false)
        })
        .cloned()
        .ok_or_else(|| MigrateError::MissingScript {
            directory: group.directory.clone(),
            direction: direction.to_string(),
        })
}
