//! Save Directory Module
//!
//! Stores save-file documents as pretty-printed JSON files in a single
//! directory, one file per save.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use tokio::fs;
use tracing::{error, info};

use crate::error::{AppError, Result};
use crate::models::SaveSummary;

/// Message returned when a requested save file does not exist.
pub const SAVE_NOT_FOUND: &str = "存档不存在";

// == Save Directory ==
#[derive(Debug, Clone)]
pub struct SaveDirectory {
    root: PathBuf,
}

/// A save file that was just written.
#[derive(Debug, Clone)]
pub struct WrittenSave {
    pub file_name: String,
    pub file_path: PathBuf,
}

/// Local-time file name of the form `YYYY-MM-DD_HH-MM-SS.json`.
pub fn timestamp_file_name(now: DateTime<Local>) -> String {
    now.format("%Y-%m-%d_%H-%M-%S.json").to_string()
}

/// Rejects names that could escape the save directory.
fn check_file_name(file_name: &str) -> Result<()> {
    if file_name.is_empty()
        || file_name.contains('/')
        || file_name.contains('\\')
        || file_name.contains("..")
    {
        return Err(AppError::InvalidRequest(format!(
            "非法的存档文件名: {}",
            file_name
        )));
    }
    Ok(())
}

fn failed(context: &str, err: impl std::fmt::Display) -> AppError {
    AppError::Failed {
        context: context.to_string(),
        details: err.to_string(),
    }
}

impl SaveDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the directory if it is missing.
    pub async fn ensure_exists(&self) -> Result<()> {
        if fs::metadata(&self.root).await.is_err() {
            fs::create_dir_all(&self.root).await?;
            info!("Created save directory: {}", self.root.display());
        }
        Ok(())
    }

    // == Write ==
    /// Writes `save_data`, overwriting any existing file of the same name.
    ///
    /// The name comes from `save_data.fileName` when present, otherwise from
    /// the current local time.
    pub async fn write(&self, save_data: &serde_json::Value) -> Result<WrittenSave> {
        let file_name = match save_data.get("fileName").and_then(|v| v.as_str()) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => timestamp_file_name(Local::now()),
        };
        check_file_name(&file_name)?;

        let file_path = self.root.join(&file_name);
        let result: Result<()> = async {
            self.ensure_exists().await?;
            let json = serde_json::to_string_pretty(save_data)?;
            fs::write(&file_path, json).await?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            error!("Failed to write save {}: {}", file_name, e);
            return Err(failed("保存失败", e));
        }

        info!("Save written: {}", file_name);
        Ok(WrittenSave {
            file_name,
            file_path,
        })
    }

    // == List ==
    /// Lists `.json` saves, newest first. A missing directory lists as empty.
    pub async fn list(&self) -> Result<Vec<SaveSummary>> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(failed("获取存档列表失败", e)),
        };

        let mut saves = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| failed("获取存档列表失败", e))?
        {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if !file_name.ends_with(".json") {
                continue;
            }
            let meta = entry
                .metadata()
                .await
                .map_err(|e| failed("获取存档列表失败", e))?;
            let modified_time: DateTime<Utc> = meta
                .modified()
                .map(DateTime::from)
                .unwrap_or_else(|_| Utc::now());

            saves.push(SaveSummary {
                file_name,
                modified_time,
                size: meta.len(),
            });
        }

        saves.sort_by(|a, b| b.modified_time.cmp(&a.modified_time));
        Ok(saves)
    }

    // == Read ==
    pub async fn read(&self, file_name: &str) -> Result<serde_json::Value> {
        check_file_name(file_name)?;

        let raw = match fs::read_to_string(self.root.join(file_name)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AppError::NotFound(SAVE_NOT_FOUND.to_string()));
            }
            Err(e) => return Err(failed("加载存档失败", e)),
        };

        serde_json::from_str(&raw).map_err(|e| {
            error!("Save {} is not valid JSON: {}", file_name, e);
            failed("加载存档失败", e)
        })
    }
}
