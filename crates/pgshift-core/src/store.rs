//! Migration Store - File system operations for migrations
//!
//! Lists, searches, reads and writes migration groups below a root directory.
//! Each immediate subdirectory of the root is one group.

use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::MigrateResult;

/// One migration group and the script files found in it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraversalResult {
    pub directory: String,
    pub files: Vec<String>,
}

/// A file to write into a migration group
pub struct ScriptFile {
    pub filename: String,
    pub content: Box<dyn AsyncRead + Send + Unpin>,
}

impl ScriptFile {
    pub fn new(filename: impl Into<String>, content: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            filename: filename.into(),
            content: Box::new(content),
        }
    }

    /// A file whose content is already in memory
    pub fn from_text(filename: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(filename, std::io::Cursor::new(text.into().into_bytes()))
    }
}

/// Store of migration groups below a root directory
#[derive(Debug, Clone)]
pub struct MigrationStore {
    root: PathBuf,
}

impl MigrationStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a group directory
    pub fn group_path(&self, directory: &str) -> PathBuf {
        self.root.join(directory)
    }

    /// List every group, oldest first
    ///
    /// A missing root means no migrations have been created yet.
    pub async fn list(&self) -> MigrateResult<Vec<TraversalResult>> {
        let mut results = Vec::new();
        for directory in self.group_directories().await? {
            let files = self.group_files(&directory).await?;
            results.push(TraversalResult { directory, files });
        }
        Ok(results)
    }

    /// Find the oldest group satisfying `predicate`
    ///
    /// Groups are read one at a time and the scan stops at the first match.
    pub async fn find<P>(&self, mut predicate: P) -> MigrateResult<Option<TraversalResult>>
    where
        P: FnMut(&TraversalResult) -> bool,
    {
        for directory in self.group_directories().await? {
            let files = self.group_files(&directory).await?;
            let result = TraversalResult { directory, files };
            if predicate(&result) {
                return Ok(Some(result));
            }
        }
        Ok(None)
    }

    /// Read the full text of one script
    pub async fn read(&self, directory: &str, filename: &str) -> MigrateResult<String> {
        let path = self.group_path(directory).join(filename);
        debug!("Reading migration script {}", path.display());
        Ok(fs::read_to_string(path).await?)
    }

    /// Create a group directory and write its files one after another
    pub async fn write(&self, directory: &str, files: Vec<ScriptFile>) -> MigrateResult<()> {
        let path = self.group_path(directory);
        fs::create_dir_all(&path).await?;

        for mut file in files {
            let target = path.join(&file.filename);
            let mut output = fs::File::create(&target).await?;
            tokio::io::copy(&mut file.content, &mut output).await?;
            output.flush().await?;
            debug!("Wrote migration script {}", target.display());
        }

        Ok(())
    }

    async fn group_directories(&self) -> MigrateResult<Vec<String>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut directories = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => directories.push(name),
                Err(name) => warn!("Skipping migration directory with non UTF-8 name {:?}", name),
            }
        }

        directories.sort();
        Ok(directories)
    }

    async fn group_files(&self, directory: &str) -> MigrateResult<Vec<String>> {
        let mut entries = fs::read_dir(self.group_path(directory)).await?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => files.push(name),
                Err(name) => warn!("Skipping migration file with non UTF-8 name {:?}", name),
            }
        }

        files.sort();
        Ok(files)
    }
}
