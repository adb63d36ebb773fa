use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Reads a persisted JSON record, treating a missing or malformed file as empty.
///
/// Partial configuration must never stop a run, so parse errors are logged and
/// swallowed here rather than returned.
pub fn load_json_or_default<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::debug!("{} does not exist, starting empty", path.display());
        return T::default();
    }

    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("Failed to read {}: {}", path.display(), e);
            return T::default();
        }
    };

    match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("Ignoring malformed JSON in {}: {}", path.display(), e);
            T::default()
        }
    }
}

/// Reads a persisted JSON record for rewriting. A missing file is empty, a malformed one is an error.
pub fn read_json<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Writes `value` as pretty-printed UTF-8 JSON, creating parent directories as needed.
pub fn write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Writes one JSON object per line.
pub fn write_json_lines<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    ensure_parent(path)?;
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    fs::write(path, out).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Reads an NDJSON file, skipping blank lines. Any malformed line fails the whole read.
pub fn read_json_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .enumerate()
        .map(|(i, l)| {
            serde_json::from_str(l)
                .with_context(|| format!("Malformed record on line {} of {}", i + 1, path.display()))
        })
        .collect()
}

/// Reads a text file as trimmed lines.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(content.lines().map(|l| l.trim().to_string()).collect())
}

pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// File stem as an owned string, `"scene"` for `input/scene.txt`.
pub fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .with_context(|| format!("{} has no file name", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_malformed_json_is_treated_as_empty() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("broken.json");
        fs::write(&path, "{ \"anon\": ")?;

        let map: BTreeMap<String, String> = load_json_or_default(&path);
        assert!(map.is_empty());

        let missing: BTreeMap<String, String> = load_json_or_default(&temp_dir.path().join("nope.json"));
        assert!(missing.is_empty());
        Ok(())
    }

    #[test]
    fn test_read_json_rejects_malformed_input() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("broken.json");
        fs::write(&path, "{ \"anon\": \"anon\", }")?;

        let err = read_json::<BTreeMap<String, String>>(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse"));

        let missing: BTreeMap<String, String> = read_json(&temp_dir.path().join("nope.json"))?;
        assert!(missing.is_empty());
        Ok(())
    }

    #[test]
    fn test_json_lines_skip_blank_lines() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("nested").join("m.jsonl");
        write_json_lines(&path, &[serde_json::json!({"a": 1}), serde_json::json!({"a": 2})])?;

        let mut content = fs::read_to_string(&path)?;
        content.push_str("\n\n");
        fs::write(&path, content)?;

        let records: Vec<serde_json::Value> = read_json_lines(&path)?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["a"], 2);
        Ok(())
    }

    #[test]
    fn test_read_lines_trims() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("scene.txt");
        fs::write(&path, "  爱音: 你好  \r\n旁白\n")?;
        assert_eq!(read_lines(&path)?, vec!["爱音: 你好", "旁白"]);
        assert_eq!(file_stem(&path)?, "scene");
        Ok(())
    }
}
