//! Survey and response files on disk.
//!
//! A responses path may name a single JSON file or a directory; directories
//! are walked recursively and every `*.json` file below them is loaded.

use super::{parse_response_page, parse_survey, SourceError};
use crate::models::{ResponseRecord, Survey};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

/// Load a survey definition from a JSON file.
pub fn load_survey(path: &Path) -> Result<Survey, SourceError> {
    let text = read_file(path)?;
    let survey = parse_survey(&text, &path.display().to_string())?;

    info!(
        "Loaded survey {} ({} questions) from {}",
        survey.id,
        survey.questions.len(),
        path.display()
    );
    Ok(survey)
}

/// Load responses from a JSON file or a directory of JSON files.
pub fn load_responses(path: &Path) -> Result<Vec<ResponseRecord>, SourceError> {
    let files = if path.is_dir() {
        collect_json_files(path)?
    } else {
        vec![path.to_path_buf()]
    };

    let mut responses = Vec::new();
    for file in &files {
        let text = read_file(file)?;
        let page = parse_response_page(&text, &file.display().to_string())?;
        debug!("{}: {} responses", file.display(), page.responses.len());
        responses.extend(page.responses);
    }

    info!(
        "Loaded {} responses from {} file(s)",
        responses.len(),
        files.len()
    );
    Ok(responses)
}

fn read_file(path: &Path) -> Result<String, SourceError> {
    fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
}

/// All `*.json` files below `dir`, in file-name order.
fn collect_json_files(dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = entry?;
        let is_json = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if entry.file_type().is_file() && is_json {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}
