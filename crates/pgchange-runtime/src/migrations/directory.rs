//! The on-disk migrations directory.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use pgchange_core::error::{PgChangeError, Result};
use pgchange_core::migration::{validate_file_name, Migration, MigrationName};

use super::template::{render, MIGRATION_TEMPLATE};

/// A directory holding one file per migration.
#[derive(Debug, Clone)]
pub struct MigrationDirectory {
    root: PathBuf,
}

impl MigrationDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Create the directory if it does not exist.
    pub async fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// File names in the directory, in listing order.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            // Follows symlinks, unlike DirEntry::file_type
            if !fs::metadata(entry.path()).await?.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => debug!("Skipping non UTF-8 file name {:?}", raw),
            }
        }

        Ok(names)
    }

    /// Read a migration by file name.
    pub async fn load(&self, name: &str) -> Result<Migration> {
        validate_file_name(name)?;
        let path = self.root.join(name);

        match fs::read_to_string(&path).await {
            Ok(sql) => Ok(Migration::new(name, sql)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(PgChangeError::NotFound(name.to_string()))
            }
            Err(e) => Err(PgChangeError::Io(e)),
        }
    }

    /// Write a new migration file from the boilerplate template.
    ///
    /// Refuses to overwrite an existing file.
    pub async fn scaffold(&self, label: &str, now: DateTime<Utc>) -> Result<MigrationName> {
        let timestamp_ms = u64::try_from(now.timestamp_millis()).map_err(|_| {
            PgChangeError::InvalidArgument(format!("Clock is before the Unix epoch: {}", now))
        })?;
        let name = MigrationName::scaffold(timestamp_ms, label)?;

        let created_at = now.to_rfc3339();
        let vars = HashMap::from([
            ("name", name.file_name()),
            ("created_at", created_at.as_str()),
        ]);
        let body = render(MIGRATION_TEMPLATE, &vars);

        let path = self.root.join(name.file_name());
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| {
                if e.kind() == ErrorKind::AlreadyExists {
                    PgChangeError::InvalidArgument(format!(
                        "Migration file already exists: {}",
                        path.display()
                    ))
                } else {
                    PgChangeError::Io(e)
                }
            })?;
        file.write_all(body.as_bytes()).await?;
        file.flush().await?;

        Ok(name)
    }
}
