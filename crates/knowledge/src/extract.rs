//! Loading chunk candidates produced by document extraction.
//!
//! Two input shapes are understood:
//! - `*.json`: an array of `{text, page, order, source}` records, one per
//!   structural element (paragraph, table, heading). `page` may be `-1` or
//!   `null` when unknown.
//! - `*.txt` / `*.md`: plain text, one candidate per line.
//!
//! Directories are walked recursively in file-name order so repeated builds
//! over the same tree number chunks identically. Hidden entries below the
//! given root (including `.docqa/`) are not visited.

use crate::types::ChunkCandidate;
use docqa_core::{AppError, AppResult};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Deserialize)]
struct ExtractedRecord {
    text: String,
    #[serde(default)]
    page: Option<i64>,
    #[serde(default)]
    order: Option<u32>,
    #[serde(default)]
    source: Option<String>,
}

/// Collect candidates from files and directories, in the order given.
///
/// Blank records are kept; the builder reports them as skipped.
pub fn load_candidates(paths: &[PathBuf]) -> AppResult<Vec<ChunkCandidate>> {
    let mut candidates = Vec::new();

    for path in paths {
        if !path.exists() {
            return Err(AppError::NotFound {
                what: "input path",
                path: path.clone(),
            });
        }

        if path.is_file() {
            load_file(path, &mut candidates)?;
            continue;
        }

        for entry in WalkDir::new(path)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()))
        {
            let entry = entry.map_err(|e| {
                AppError::Io(std::io::Error::other(format!(
                    "failed to walk {:?}: {}",
                    path, e
                )))
            })?;
            if entry.file_type().is_file() {
                load_file(entry.path(), &mut candidates)?;
            }
        }
    }

    tracing::info!(
        "Loaded {} candidates from {} input path(s)",
        candidates.len(),
        paths.len()
    );
    Ok(candidates)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|name| name.starts_with('.'))
}

fn load_file(path: &Path, out: &mut Vec<ChunkCandidate>) -> AppResult<()> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let before = out.len();
    match extension.as_deref() {
        Some("json") => load_records(path, out)?,
        Some("txt") | Some("md") => load_lines(path, out)?,
        _ => {
            tracing::debug!("Skipping unsupported file {:?}", path);
            return Ok(());
        }
    }

    tracing::debug!("{:?}: {} candidates", path, out.len() - before);
    Ok(())
}

fn load_records(path: &Path, out: &mut Vec<ChunkCandidate>) -> AppResult<()> {
    let bytes = fs::read(path)?;
    let records: Vec<ExtractedRecord> = serde_json::from_slice(&bytes)
        .map_err(|e| AppError::corrupt(path, format!("malformed extraction record: {}", e)))?;

    // Extraction writes `<name>.json` for `<name>.pdf`.
    let default_source = path
        .file_stem()
        .map(|s| format!("{}.pdf", s.to_string_lossy()));

    for (index, record) in records.into_iter().enumerate() {
        let page = match record.page {
            None => None,
            Some(p) if p < 0 => None,
            Some(p) => Some(u32::try_from(p).map_err(|_| {
                AppError::corrupt(path, format!("record {} has page {} out of range", index, p))
            })?),
        };
        let order = match record.order {
            Some(order) => order,
            None => u32::try_from(index).map_err(|_| {
                AppError::corrupt(path, format!("record {} exceeds the order range", index))
            })?,
        };

        out.push(ChunkCandidate::new(
            record.text,
            record.source.or_else(|| default_source.clone()),
            page,
            order,
        ));
    }
    Ok(())
}

fn load_lines(path: &Path, out: &mut Vec<ChunkCandidate>) -> AppResult<()> {
    let content = fs::read_to_string(path)?;
    let source = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned());

    for (index, line) in content.lines().enumerate() {
        let order = u32::try_from(index)
            .map_err(|_| AppError::corrupt(path, "too many lines"))?;
        out.push(ChunkCandidate::new(line, source.clone(), None, order));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_json_records() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("biology.json");
        fs::write(
            &path,
            r#"[
                {"text": "细胞是生命的基本单位", "page": 1, "order": 0, "source": "biology.pdf"},
                {"text": "Table: phases", "page": -1, "order": 1},
                {"text": "No order here", "page": null}
            ]"#,
        )
        .unwrap();

        let candidates = load_candidates(&[path]).unwrap();
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].source.as_deref(), Some("biology.pdf"));
        assert_eq!(candidates[0].page, Some(1));
        assert_eq!(candidates[1].source.as_deref(), Some("biology.pdf"));
        assert_eq!(candidates[1].page, None);
        assert_eq!(candidates[2].order, 2);
    }

    #[test]
    fn test_text_lines_keep_blanks() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("notes.txt");
        fs::write(&path, "first line\n\nthird line\n").unwrap();

        let candidates = load_candidates(&[path]).unwrap();
        assert_eq!(candidates.len(), 3);
        assert!(!candidates[1].is_indexable());
        assert_eq!(candidates[2].order, 2);
        assert_eq!(candidates[2].source.as_deref(), Some("notes.txt"));
    }

    #[test]
    fn test_directory_walk_is_sorted_and_filtered() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.txt"), "from b").unwrap();
        fs::write(temp.path().join("a.md"), "from a").unwrap();
        fs::write(temp.path().join("image.png"), [0u8, 1, 2]).unwrap();

        let candidates = load_candidates(&[temp.path().to_path_buf()]).unwrap();
        let texts: Vec<&str> = candidates.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["from a", "from b"]);
    }

    #[test]
    fn test_missing_path() {
        let err = load_candidates(&[PathBuf::from("/definitely/not/here.json")]).unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[test]
    fn test_malformed_json_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.json");
        fs::write(&path, r#"[{"page": 1}]"#).unwrap();
        assert!(matches!(
            load_candidates(&[path]).unwrap_err(),
            AppError::CorruptData { .. }
        ));
    }

    #[test]
    fn test_directory_walk_skips_index_directory() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("lesson.txt"), "from lesson").unwrap();
        let generation = temp.path().join(".docqa/corpora/default/gen-1");
        fs::create_dir_all(&generation).unwrap();
        fs::write(generation.join("manifest.json"), r#"{"generation": "1"}"#).unwrap();
        fs::write(generation.join("chunks.json"), r#"[{"text": "indexed"}]"#).unwrap();

        let candidates = load_candidates(&[temp.path().to_path_buf()]).unwrap();
        let texts: Vec<&str> = candidates.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["from lesson"]);
    }
}
