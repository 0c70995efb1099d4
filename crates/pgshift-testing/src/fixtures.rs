//! Temporary migration directories

use chrono::{TimeZone, Utc};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use pgshift_core::naming::{Direction, Migration};
use pgshift_core::MigratorConfig;

use crate::{TestError, TestResult};

/// A migration root in a temporary directory, removed on drop
pub struct MigrationFixture {
    dir: TempDir,
}

impl MigrationFixture {
    pub fn new() -> TestResult<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    /// Root holding the migration groups
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Migrator configuration rooted at this fixture
    pub fn config(&self, table: &str) -> MigratorConfig {
        MigratorConfig::new(self.path()).with_table(table)
    }

    /// Write a group with both scripts, returning its directory name
    pub fn add(&self, millis: i64, name: &str, up: &str, down: &str) -> TestResult<String> {
        let migration = Self::migration(millis, name)?;
        let directory = self.add_group(&migration)?;
        self.write_script(&migration, Direction::Up, up)?;
        self.write_script(&migration, Direction::Down, down)?;
        Ok(directory)
    }

    /// Write a group with only an up script
    pub fn add_up_only(&self, millis: i64, name: &str, up: &str) -> TestResult<String> {
        let migration = Self::migration(millis, name)?;
        let directory = self.add_group(&migration)?;
        self.write_script(&migration, Direction::Up, up)?;
        Ok(directory)
    }

    /// Write an arbitrary file into an arbitrary directory below the root
    pub fn add_raw(&self, directory: &str, filename: &str, content: &str) -> TestResult<()> {
        let path = self.path().join(directory);
        fs::create_dir_all(&path)?;
        fs::write(path.join(filename), content)?;
        Ok(())
    }

    /// Names of the directories below the root, sorted
    pub fn directories(&self) -> TestResult<Vec<String>> {
        let mut directories = Vec::new();
        for entry in fs::read_dir(self.path())? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                directories.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        directories.sort();
        Ok(directories)
    }

    /// Files of one group directory, sorted
    pub fn files(&self, directory: &str) -> TestResult<Vec<String>> {
        let mut files = fs::read_dir(self.path().join(directory))?
            .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect::<Result<Vec<_>, _>>()?;
        files.sort();
        Ok(files)
    }

    pub fn read(&self, directory: &str, filename: &str) -> TestResult<String> {
        Ok(fs::read_to_string(self.path().join(directory).join(filename))?)
    }

    fn migration(millis: i64, name: &str) -> TestResult<Migration> {
        let created_at = Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| TestError::Setup(format!("invalid timestamp {}", millis)))?;
        Ok(Migration::new(name, created_at))
    }

    fn add_group(&self, migration: &Migration) -> TestResult<String> {
        let directory = migration.encode();
        fs::create_dir_all(self.path().join(&directory))?;
        Ok(directory)
    }

    fn write_script(&self, migration: &Migration, direction: Direction, text: &str) -> TestResult<()> {
        let script = migration.script(direction);
        let path = self.path().join(migration.encode()).join(script.encode());
        fs::write(path, text)?;
        Ok(())
    }
}
