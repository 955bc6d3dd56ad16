//! Report browsing over a directory tree whose folder names encode facets.
//!
//! A layout such as `region=us/env=prod/daily.html` lets the browser offer
//! `region` and `env` as filters. Choosing a filter narrows the listing to
//! the matching subdirectory, and only facets still open are offered.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::constants::REPORT_EXTENSION;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Invalid report filter: {0}")]
    InvalidFilter(String),

    #[error("Invalid report path: {0}")]
    InvalidPath(String),

    #[error("Report not found: {0}")]
    NotFound(String),

    #[error("Failed to read reports: {0}")]
    Io(#[from] std::io::Error),
}

/// A facet pinned by the request, in request order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetFilter {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportListing {
    /// Report files relative to the reports base, `/`-separated.
    pub files: Vec<String>,

    /// Filters chosen by the request.
    pub pinned: Vec<FacetFilter>,

    /// Facets still open, with every value observed under the current filters.
    pub facets: BTreeMap<String, BTreeSet<String>>,
}

/// Turn query parameters into filters: empty values are skipped and the
/// first occurrence of a name wins.
pub fn parse_filters(params: &[(String, String)]) -> Result<Vec<FacetFilter>, ReportError> {
    let mut filters: Vec<FacetFilter> = Vec::new();

    for (name, value) in params {
        if value.is_empty() || filters.iter().any(|f| &f.name == name) {
            continue;
        }

        validate_segment(name, true)?;
        validate_segment(value, false)?;

        filters.push(FacetFilter {
            name: name.clone(),
            value: value.clone(),
        });
    }

    Ok(filters)
}

fn validate_segment(segment: &str, is_name: bool) -> Result<(), ReportError> {
    let invalid = segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains(['/', '\\', '\0'])
        || (is_name && segment.contains('='));

    if invalid {
        return Err(ReportError::InvalidFilter(segment.to_string()));
    }
    Ok(())
}

/// `base/name1=value1/name2=value2/...`
#[must_use]
pub fn restricted_path(base: &Path, filters: &[FacetFilter]) -> PathBuf {
    filters.iter().fold(base.to_path_buf(), |path, filter| {
        path.join(format!("{}={}", filter.name, filter.value))
    })
}

/// Split a `name=value` directory name. The value is whatever follows the
/// last `=`; both sides must be non-empty.
fn facet_segment(segment: &str) -> Option<(&str, &str)> {
    let (name, value) = segment.rsplit_once('=')?;
    if name.is_empty() || value.is_empty() {
        return None;
    }
    Some((name, value))
}

/// Build the listing from already-listed entries under the restricted path.
#[must_use]
pub fn build_listing(base: &Path, filters: &[FacetFilter], entries: &[PathBuf]) -> ReportListing {
    let mut listing = ReportListing {
        pinned: filters.to_vec(),
        ..ReportListing::default()
    };

    for entry in entries {
        let Ok(relative) = entry.strip_prefix(base) else {
            continue;
        };

        let Some(segments) = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_str()),
                _ => None,
            })
            .collect::<Option<Vec<&str>>>()
        else {
            debug!(path = %entry.display(), "Skipping report entry with non-UTF-8 name");
            continue;
        };

        if segments
            .last()
            .is_some_and(|name| name.ends_with(REPORT_EXTENSION))
        {
            listing.files.push(segments.join("/"));
        }

        for (name, value) in segments.iter().filter_map(|s| facet_segment(s)) {
            if filters.iter().any(|f| f.name == name) {
                continue;
            }
            listing
                .facets
                .entry(name.to_string())
                .or_default()
                .insert(value.to_string());
        }
    }

    listing.files.sort();
    listing
}

/// Direct children of `dir`, sorted by name. A missing directory is empty.
pub async fn list_entries(dir: PathBuf) -> Result<Vec<PathBuf>, ReportError> {
    let entries = tokio::task::spawn_blocking(move || {
        if !dir.is_dir() {
            debug!(path = %dir.display(), "Report directory does not exist");
            return Ok(Vec::new());
        }

        walkdir::WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .map(|entry| entry.map(walkdir::DirEntry::into_path))
            .collect::<Result<Vec<_>, _>>()
            .map_err(std::io::Error::from)
    })
    .await
    .map_err(|e| ReportError::Io(std::io::Error::other(e)))??;

    Ok(entries)
}

/// List the reports and facets consistent with the requested filters.
pub async fn browse(base: &Path, params: &[(String, String)]) -> Result<ReportListing, ReportError> {
    let filters = parse_filters(params)?;
    let dir = restricted_path(base, &filters);
    let entries = list_entries(dir).await?;

    Ok(build_listing(base, &filters, &entries))
}

/// Resolve a report path relative to the base. A leading `/` is ignored so
/// that both `a.html` and `/region=us/a.html` work; parent and root
/// components are rejected.
pub fn resolve_report_file(base: &Path, file: &str) -> Result<PathBuf, ReportError> {
    let trimmed = file.trim_start_matches('/');
    if trimmed.is_empty() {
        return Err(ReportError::InvalidPath(file.to_string()));
    }

    let relative = Path::new(trimmed);
    let safe = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !safe {
        return Err(ReportError::InvalidPath(file.to_string()));
    }

    Ok(base.join(relative))
}

/// Raw file bytes; reports are served in whatever encoding they were written.
pub async fn read_report(base: &Path, file: &str) -> Result<Vec<u8>, ReportError> {
    let path = resolve_report_file(base, file)?;

    match tokio::fs::read(&path).await {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ReportError::NotFound(file.to_string()))
        }
        Err(e) => Err(ReportError::Io(e)),
    }
}
