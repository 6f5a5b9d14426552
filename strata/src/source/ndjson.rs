use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::bail;
use crate::error::{ErrorKind, StrataResult};
use crate::source::base::{EventSource, SourceBatch, SourcePosition};
use crate::strata_error;

/// File extension of the part files the upstream batcher writes.
const PART_FILE_EXTENSION: &str = "ndjson";

/// Durable checkpoint persisted next to the landing data.
#[derive(Debug, Serialize, Deserialize)]
struct Checkpoint {
    /// Relative path of the last fully landed part file.
    last_committed: String,
}

/// Event source over a directory of NDJSON part files.
///
/// The upstream batcher flushes change events per topic into
/// `<root>/<topic>/date=YYYY-MM-DD/hour=HH/part-<epoch_millis>.ndjson`.
/// This source discovers part files in lexicographic path order and delivers
/// one file per batch, using the file's relative path as the batch position.
///
/// The naming scheme makes lexicographic order match arrival order, which is
/// what lets a relative path act as a checkpoint: every file sorting at or
/// before the committed path has been landed, everything after has not.
/// The checkpoint is persisted as a small JSON file per topic and survives
/// restarts.
#[derive(Debug)]
pub struct NdjsonDirSource {
    topic_dir: PathBuf,
    checkpoint_path: PathBuf,
    last_committed: Option<String>,
    checkpoint_loaded: bool,
}

impl NdjsonDirSource {
    /// Creates a source for one topic under the landing root.
    ///
    /// The checkpoint is kept in `<checkpoint_dir>/<topic>.json`.
    pub fn new(
        landing_root: impl AsRef<Path>,
        topic: &str,
        checkpoint_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            topic_dir: landing_root.as_ref().join(topic),
            checkpoint_path: checkpoint_dir.as_ref().join(format!("{topic}.json")),
            last_committed: None,
            checkpoint_loaded: false,
        }
    }

    /// Loads the persisted checkpoint on first use.
    async fn ensure_checkpoint_loaded(&mut self) -> StrataResult<()> {
        if self.checkpoint_loaded {
            return Ok(());
        }

        match fs::read(&self.checkpoint_path).await {
            Ok(bytes) => {
                let checkpoint: Checkpoint = serde_json::from_slice(&bytes).map_err(|err| {
                    strata_error!(
                        ErrorKind::CheckpointError,
                        "Checkpoint file is corrupt",
                        self.checkpoint_path.display().to_string(),
                        source: err
                    )
                })?;
                self.last_committed = Some(checkpoint.last_committed);
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                self.last_committed = None;
            }
            Err(err) => {
                return Err(strata_error!(
                    ErrorKind::CheckpointError,
                    "Failed to read checkpoint file",
                    self.checkpoint_path.display().to_string(),
                    source: err
                ));
            }
        }

        self.checkpoint_loaded = true;
        Ok(())
    }

    /// Lists relative part file paths for this topic in lexicographic order.
    async fn discover_part_files(&self) -> StrataResult<Vec<String>> {
        // The topic directory appears only once the upstream batcher has
        // flushed something; until then there is simply nothing to land.
        if !self.topic_dir.exists() {
            return Ok(Vec::new());
        }

        let mut part_files = Vec::new();

        for date_dir in sorted_entries(&self.topic_dir, true).await? {
            let date_name = file_name(&date_dir);
            for hour_dir in sorted_entries(&date_dir, true).await? {
                let hour_name = file_name(&hour_dir);
                for part_file in sorted_entries(&hour_dir, false).await? {
                    if part_file.extension().and_then(|ext| ext.to_str())
                        == Some(PART_FILE_EXTENSION)
                    {
                        part_files.push(format!(
                            "{date_name}/{hour_name}/{}",
                            file_name(&part_file)
                        ));
                    }
                }
            }
        }

        part_files.sort();
        Ok(part_files)
    }

    /// Reads one part file into payloads, one JSON object per line.
    async fn read_part_file(&self, relative_path: &str) -> StrataResult<Vec<serde_json::Value>> {
        let path = self.topic_dir.join(relative_path);
        let content = fs::read_to_string(&path).await.map_err(|err| {
            strata_error!(
                ErrorKind::SourceError,
                "Failed to read part file",
                path.display().to_string(),
                source: err
            )
        })?;

        let mut payloads = Vec::new();
        for (line_number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let payload = serde_json::from_str(line).map_err(|err| {
                strata_error!(
                    ErrorKind::SchemaViolation,
                    "Part file contains a malformed payload",
                    format!("{relative_path}:{}", line_number + 1),
                    source: err
                )
            })?;
            payloads.push(payload);
        }

        Ok(payloads)
    }
}

impl EventSource for NdjsonDirSource {
    async fn next_batch(&mut self) -> StrataResult<Option<SourceBatch>> {
        self.ensure_checkpoint_loaded().await?;

        let part_files = self.discover_part_files().await?;
        let next = part_files.into_iter().find(|path| {
            self.last_committed
                .as_deref()
                .is_none_or(|committed| path.as_str() > committed)
        });

        let Some(relative_path) = next else {
            return Ok(None);
        };

        let payloads = self.read_part_file(&relative_path).await?;

        Ok(Some(SourceBatch {
            position: SourcePosition::new(relative_path),
            payloads,
        }))
    }

    async fn commit(&mut self, position: SourcePosition) -> StrataResult<()> {
        self.ensure_checkpoint_loaded().await?;

        if let Some(committed) = self.last_committed.as_deref()
            && position.as_str() < committed
        {
            bail!(
                ErrorKind::CheckpointError,
                "Checkpoint would move backwards",
                format!("attempted to commit `{position}` after `{committed}`")
            );
        }

        if let Some(parent) = self.checkpoint_path.parent() {
            fs::create_dir_all(parent).await.map_err(|err| {
                strata_error!(
                    ErrorKind::CheckpointError,
                    "Failed to create checkpoint directory",
                    parent.display().to_string(),
                    source: err
                )
            })?;
        }

        let checkpoint = Checkpoint {
            last_committed: position.as_str().to_owned(),
        };
        let bytes = serde_json::to_vec(&checkpoint)?;

        // Write-then-rename keeps the checkpoint readable even if the
        // process dies mid-write.
        let staged = self.checkpoint_path.with_extension("json.tmp");
        fs::write(&staged, bytes).await.map_err(|err| {
            strata_error!(
                ErrorKind::CheckpointError,
                "Failed to stage checkpoint file",
                staged.display().to_string(),
                source: err
            )
        })?;
        fs::rename(&staged, &self.checkpoint_path)
            .await
            .map_err(|err| {
                strata_error!(
                    ErrorKind::CheckpointError,
                    "Failed to publish checkpoint file",
                    self.checkpoint_path.display().to_string(),
                    source: err
                )
            })?;

        self.last_committed = Some(position.as_str().to_owned());

        Ok(())
    }
}

/// Lists the names of a directory's children, sorted, optionally directories only.
async fn sorted_entries(directory: &Path, directories_only: bool) -> StrataResult<Vec<PathBuf>> {
    let mut reader = fs::read_dir(directory).await.map_err(|err| {
        strata_error!(
            ErrorKind::SourceError,
            "Failed to list landing directory",
            directory.display().to_string(),
            source: err
        )
    })?;

    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().await.map_err(|err| {
        strata_error!(
            ErrorKind::SourceError,
            "Failed to list landing directory",
            directory.display().to_string(),
            source: err
        )
    })? {
        let path = entry.path();
        if directories_only == path.is_dir() {
            entries.push(path);
        }
    }

    entries.sort();
    Ok(entries)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn write_part_file(root: &Path, topic: &str, relative: &str, lines: &[&str]) {
        let path = root.join(topic).join(relative);
        fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        fs::write(&path, lines.join("\n")).await.unwrap();
    }

    #[tokio::test]
    async fn discovers_part_files_across_partitions_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let topic = "cdc.warehouse.stock_item";

        write_part_file(
            dir.path(),
            topic,
            "date=2024-03-02/hour=00/part-1709337600000.ndjson",
            &[r#"{"item_id": 2}"#],
        )
        .await;
        write_part_file(
            dir.path(),
            topic,
            "date=2024-03-01/hour=23/part-1709334000000.ndjson",
            &[r#"{"item_id": 1}"#],
        )
        .await;

        let checkpoints = tempfile::tempdir().unwrap();
        let mut source = NdjsonDirSource::new(dir.path(), topic, checkpoints.path());

        let first = source.next_batch().await.unwrap().unwrap();
        assert_eq!(first.payloads, vec![json!({"item_id": 1})]);
        source.commit(first.position).await.unwrap();

        let second = source.next_batch().await.unwrap().unwrap();
        assert_eq!(second.payloads, vec![json!({"item_id": 2})]);
        source.commit(second.position).await.unwrap();

        assert!(source.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn checkpoint_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoints = tempfile::tempdir().unwrap();
        let topic = "cdc.warehouse.stock_movement";

        write_part_file(
            dir.path(),
            topic,
            "date=2024-03-01/hour=10/part-1709287200000.ndjson",
            &[r#"{"movement_id": 900}"#],
        )
        .await;

        let mut source = NdjsonDirSource::new(dir.path(), topic, checkpoints.path());
        let batch = source.next_batch().await.unwrap().unwrap();
        source.commit(batch.position).await.unwrap();
        drop(source);

        // A fresh instance over the same checkpoint must not redeliver.
        let mut reopened = NdjsonDirSource::new(dir.path(), topic, checkpoints.path());
        assert!(reopened.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_line_is_a_schema_violation() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoints = tempfile::tempdir().unwrap();
        let topic = "cdc.warehouse.stock_item";

        write_part_file(
            dir.path(),
            topic,
            "date=2024-03-01/hour=10/part-1709287200000.ndjson",
            &[r#"{"item_id": 1}"#, "{not json"],
        )
        .await;

        let mut source = NdjsonDirSource::new(dir.path(), topic, checkpoints.path());
        let err = source.next_batch().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaViolation);
    }

    #[tokio::test]
    async fn missing_topic_directory_means_nothing_to_land() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoints = tempfile::tempdir().unwrap();

        let mut source = NdjsonDirSource::new(dir.path(), "cdc.warehouse.absent", checkpoints.path());
        assert!(source.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn blank_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoints = tempfile::tempdir().unwrap();
        let topic = "cdc.warehouse.stock_item";

        write_part_file(
            dir.path(),
            topic,
            "date=2024-03-01/hour=10/part-1709287200000.ndjson",
            &[r#"{"item_id": 1}"#, "", r#"{"item_id": 2}"#, ""],
        )
        .await;

        let mut source = NdjsonDirSource::new(dir.path(), topic, checkpoints.path());
        let batch = source.next_batch().await.unwrap().unwrap();
        assert_eq!(batch.payloads.len(), 2);
    }
}
