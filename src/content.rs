//! Slideshow content library
//!
//! Read-only view over a directory of slideshow JSON files. The playback core
//! consults the library in two places: `resolve` when a show is loaded (slide
//! count and loop flag are snapshotted into the playback state) and
//! `slide_duration` when the auto-advance scheduler arms a timer.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info, warn};

/// On-disk slideshow file format
///
/// Unknown slide fields (content, layout, notes) are ignored; the sync core
/// only needs timing and the loop flag.
#[derive(Debug, Clone, Deserialize)]
struct ShowFile {
    #[serde(default)]
    name: Option<String>,

    #[serde(default)]
    config: ShowFileConfig,

    #[serde(default)]
    slides: Vec<SlideEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct ShowFileConfig {
    /// Whether playback wraps around at either end of the show
    #[serde(rename = "loop", default = "default_loop")]
    loop_enabled: bool,
}

impl Default for ShowFileConfig {
    fn default() -> Self {
        Self {
            loop_enabled: default_loop(),
        }
    }
}

fn default_loop() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
struct SlideEntry {
    /// Per-slide display duration; library default applies when absent or zero
    #[serde(default)]
    duration_ms: Option<u64>,
}

/// Resolved slideshow metadata held in the catalog
#[derive(Debug, Clone)]
pub struct ShowInfo {
    pub id: String,
    pub name: String,
    pub slide_count: usize,
    pub loop_enabled: bool,
    /// Per-slide durations; `None` entries fall back to the library default
    pub durations: Vec<Option<Duration>>,
}

/// Catalog entry shape returned to API clients
#[derive(Debug, Clone, Serialize)]
pub struct ShowSummary {
    pub id: String,
    pub name: String,
    pub slide_count: usize,
    pub loop_enabled: bool,
}

impl ShowInfo {
    fn summary(&self) -> ShowSummary {
        ShowSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            slide_count: self.slide_count,
            loop_enabled: self.loop_enabled,
        }
    }
}

/// Slideshow library backed by a directory of `*.json` files
///
/// The catalog is cached in memory; `refresh` rescans the directory. File ids
/// are the file stem, so `deck.json` is loadable as `"deck"`.
pub struct SlideLibrary {
    dir: PathBuf,
    default_slide_duration: Duration,
    catalog: RwLock<HashMap<String, ShowInfo>>,
}

impl SlideLibrary {
    /// Open a library rooted at `dir`, creating the directory if missing,
    /// and perform the initial scan.
    pub fn open(dir: &Path, default_slide_duration: Duration) -> Result<Self> {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
            info!("Created slideshows directory {:?}", dir);
        }

        let library = Self {
            dir: dir.to_path_buf(),
            default_slide_duration,
            catalog: RwLock::new(HashMap::new()),
        };
        let count = library.refresh()?;
        info!("Slideshow library opened: {} shows in {:?}", count, library.dir);
        Ok(library)
    }

    /// Rescan the directory and replace the cached catalog.
    ///
    /// Files that fail to parse are skipped with a warning; one bad file does
    /// not hide the rest of the library.
    pub fn refresh(&self) -> Result<usize> {
        let mut catalog = HashMap::new();

        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            Error::Content(format!("Failed to read {:?}: {}", self.dir, e))
        })?;

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            match Self::load_show(&path, stem) {
                Ok(info) => {
                    debug!("Discovered slideshow '{}' ({} slides)", info.id, info.slide_count);
                    catalog.insert(info.id.clone(), info);
                }
                Err(e) => {
                    warn!("Skipping slideshow file {:?}: {}", path, e);
                }
            }
        }

        let count = catalog.len();
        *self.catalog.write().unwrap() = catalog;
        Ok(count)
    }

    fn load_show(path: &Path, id: &str) -> Result<ShowInfo> {
        let raw = std::fs::read_to_string(path)?;
        let file: ShowFile = serde_json::from_str(&raw)
            .map_err(|e| Error::Content(format!("invalid slideshow JSON: {}", e)))?;

        let durations = file
            .slides
            .iter()
            .map(|s| match s.duration_ms {
                Some(0) | None => None,
                Some(ms) => Some(Duration::from_millis(ms)),
            })
            .collect();

        Ok(ShowInfo {
            id: id.to_string(),
            name: file.name.unwrap_or_else(|| id.to_string()),
            slide_count: file.slides.len(),
            loop_enabled: file.config.loop_enabled,
            durations,
        })
    }

    /// Resolve a slideshow id to its metadata, or `None` if unknown.
    pub fn resolve(&self, id: &str) -> Option<ShowInfo> {
        self.catalog.read().unwrap().get(id).cloned()
    }

    /// Display duration for one slide, falling back to the library default
    /// for unknown shows, out-of-range indexes, and slides without timing.
    pub fn slide_duration(&self, id: &str, index: usize) -> Duration {
        self.catalog
            .read()
            .unwrap()
            .get(id)
            .and_then(|info| info.durations.get(index).copied().flatten())
            .unwrap_or(self.default_slide_duration)
    }

    /// Catalog summaries for API listing, sorted by id for stable output.
    pub fn list(&self) -> Vec<ShowSummary> {
        let mut shows: Vec<ShowSummary> = self
            .catalog
            .read()
            .unwrap()
            .values()
            .map(ShowInfo::summary)
            .collect();
        shows.sort_by(|a, b| a.id.cmp(&b.id));
        shows
    }
}
