//! Hour index over the published overlays.
//!
//! Built on every request by scanning the output directories; nothing is
//! persisted. Hours come from the file names, so the index always reflects
//! exactly what is on disk.

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::Path;

use overlay_common::{ConfigError, VariableSpec};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};

/// Response shape of the index endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexLayout {
    /// Sorted URL list for the primary variable
    #[default]
    Single,
    /// One object per hour with a URL per variable
    Combined,
}

/// How per-variable hour lists are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pairing {
    /// Pair the n-th file of every variable, truncated to the shortest list
    Positional,
    /// Join on equal hours; hours missing from any variable are dropped
    #[default]
    ByHour,
}

/// One published overlay file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HourFile {
    pub hour: u32,
    pub file_name: String,
    pub url: String,
}

/// A row of the combined index: `{"hour": 3, "refc": "/pngs/...", ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourEntry {
    pub hour: u32,
    #[serde(flatten)]
    pub urls: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HourIndex {
    Single(Vec<String>),
    Combined(Vec<HourEntry>),
}

/// Files in `dir` named like `variable`'s overlays, sorted by hour.
///
/// A missing directory is an empty list.
pub async fn list_hours(dir: &Path, variable: &VariableSpec) -> Result<Vec<HourFile>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(PipelineError::io(dir, e)),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PipelineError::io(dir, e))?
    {
        let Ok(file_name) = entry.file_name().into_string() else {
            continue;
        };
        let Some(hour) = variable.parse_hour(&file_name) else {
            continue;
        };
        let path = entry.path();
        if !listed_file(&path, entry.file_type().await.map(|t| t.is_file()))? {
            continue;
        }
        files.push(HourFile {
            hour,
            url: variable.url_for(&file_name),
            file_name,
        });
    }

    // Numeric order; the name breaks ties so the result is deterministic
    files.sort_by(|a, b| a.hour.cmp(&b.hour).then_with(|| a.file_name.cmp(&b.file_name)));
    Ok(files)
}

/// Whether a listed entry is a regular file.
///
/// An entry gone since the listing (a publish swapping the directory) is
/// skipped; any other error fails the listing.
fn listed_file(path: &Path, is_file: std::io::Result<bool>) -> Result<bool> {
    match is_file {
        Ok(is_file) => Ok(is_file),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "Entry removed while listing");
            Ok(false)
        }
        Err(e) => Err(PipelineError::io(path, e)),
    }
}

/// Sorted URLs of one variable's overlays.
pub async fn single_index(dir: &Path, variable: &VariableSpec) -> Result<Vec<String>> {
    Ok(list_hours(dir, variable)
        .await?
        .into_iter()
        .map(|f| f.url)
        .collect())
}

/// Combine per-variable hour lists (each sorted) into one entry per hour.
pub fn combine(columns: &[(&VariableSpec, Vec<HourFile>)], pairing: Pairing) -> Vec<HourEntry> {
    if columns.is_empty() {
        return Vec::new();
    }

    match pairing {
        Pairing::Positional => {
            let len = columns.iter().map(|(_, files)| files.len()).min().unwrap_or(0);
            (0..len)
                .map(|n| HourEntry {
                    hour: columns[0].1[n].hour,
                    urls: columns
                        .iter()
                        .map(|(variable, files)| (variable.key.clone(), files[n].url.clone()))
                        .collect(),
                })
                .collect()
        }
        Pairing::ByHour => {
            let lookups: Vec<HashMap<u32, &HourFile>> = columns
                .iter()
                .map(|(_, files)| {
                    let mut by_hour = HashMap::new();
                    for file in files {
                        by_hour.entry(file.hour).or_insert(file);
                    }
                    by_hour
                })
                .collect();

            let mut hours: Vec<u32> = columns[0].1.iter().map(|f| f.hour).collect();
            hours.dedup();

            let mut entries = Vec::new();
            for hour in hours {
                let missing: Vec<&str> = columns
                    .iter()
                    .zip(&lookups)
                    .filter(|(_, lookup)| !lookup.contains_key(&hour))
                    .map(|((variable, _), _)| variable.name.as_str())
                    .collect();
                if !missing.is_empty() {
                    debug!(hour, missing = ?missing, "Hour excluded from combined index");
                    continue;
                }

                let urls = columns
                    .iter()
                    .zip(&lookups)
                    .filter_map(|((variable, _), lookup)| {
                        lookup
                            .get(&hour)
                            .map(|file| (variable.key.clone(), file.url.clone()))
                    })
                    .collect();
                entries.push(HourEntry { hour, urls });
            }
            entries
        }
    }
}

/// Build the index described by `config` over the output directories under `static_root`.
pub async fn build_index(config: &PipelineConfig, static_root: &Path) -> Result<HourIndex> {
    match config.index.layout {
        IndexLayout::Single => {
            let variable = config.primary_variable().ok_or_else(|| {
                ConfigError::variable(
                    &config.index.primary,
                    "primary index variable is not configured",
                )
            })?;
            let urls = single_index(&static_root.join(&variable.output_dir), variable).await?;
            Ok(HourIndex::Single(urls))
        }
        IndexLayout::Combined => {
            let mut columns = Vec::with_capacity(config.variables.len());
            for variable in &config.variables {
                let files = list_hours(&static_root.join(&variable.output_dir), variable).await?;
                columns.push((variable, files));
            }
            Ok(HourIndex::Combined(combine(&columns, config.index.pairing)))
        }
    }
}
