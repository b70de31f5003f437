//! Filesystem enumeration for ingest: directory walking with ignore
//! filters, stat-based file records, and a small extension-to-mime table.
//! Unreadable paths yield a sentinel record rather than an error so a bad
//! entry never aborts a whole ingest run.

use chrono::{DateTime, TimeZone, Utc};
use passagedb_core::types::Meta;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Stat snapshot of a single filesystem entry.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub path: PathBuf,
    pub is_dir: bool,
    pub owner: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    /// -1 when the size could not be read.
    pub size_bytes: i64,
}

impl FileRecord {
    /// Sentinel record for paths whose metadata could not be read.
    fn unknown(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            is_dir: false,
            owner: "unknown".to_string(),
            created: Utc.timestamp_opt(0, 0).single().unwrap_or_default(),
            modified: Utc.timestamp_opt(0, 0).single().unwrap_or_default(),
            size_bytes: -1,
        }
    }

    /// Flattens the record into string metadata for the document store.
    pub fn metadata(&self) -> Meta {
        let mut meta = Meta::new();
        meta.insert("owner".to_string(), self.owner.clone());
        meta.insert("created".to_string(), self.created.format("%Y-%m-%d %H:%M:%S").to_string());
        meta.insert("modified".to_string(), self.modified.format("%Y-%m-%d %H:%M:%S").to_string());
        if self.size_bytes >= 0 {
            meta.insert("size_bytes".to_string(), self.size_bytes.to_string());
        }
        if !self.is_dir {
            if let Some((group, mime)) = classify(&self.path) {
                meta.insert("group".to_string(), group.to_string());
                meta.insert("mime_type".to_string(), mime.to_string());
            }
        }
        meta
    }
}

/// Stats a single path. Never fails; IO errors produce the sentinel record.
pub fn stat(path: &Path) -> FileRecord {
    let Ok(md) = std::fs::metadata(path) else {
        tracing::debug!(path = %path.display(), "stat failed, recording sentinel");
        return FileRecord::unknown(path);
    };
    let created = md.created().ok().map(DateTime::<Utc>::from).unwrap_or_default();
    let modified = md.modified().ok().map(DateTime::<Utc>::from).unwrap_or_default();
    FileRecord {
        path: path.to_path_buf(),
        is_dir: md.is_dir(),
        owner: owner_of(&md),
        created,
        modified,
        size_bytes: i64::try_from(md.len()).unwrap_or(-1),
    }
}

#[cfg(unix)]
fn owner_of(md: &std::fs::Metadata) -> String {
    use std::os::unix::fs::MetadataExt;
    md.uid().to_string()
}

#[cfg(not(unix))]
fn owner_of(_md: &std::fs::Metadata) -> String {
    "unknown".to_string()
}

/// Walks `root` depth-first and returns records for all regular files,
/// skipping any entry whose name matches one of `ignore`. A matching
/// directory name prunes its whole subtree.
pub fn walk(root: &Path, ignore: &[String]) -> Vec<FileRecord> {
    let mut records = Vec::new();
    let walker = WalkDir::new(root).into_iter().filter_entry(|e| {
        e.file_name()
            .to_str()
            .is_none_or(|name| !ignore.iter().any(|pat| pat == name))
    });
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().is_file() {
            records.push(stat(entry.path()));
        }
    }
    records
}

/// Maps a file extension to a coarse content group and mime type.
pub fn classify(path: &Path) -> Option<(&'static str, &'static str)> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let pair = match ext.as_str() {
        "txt" => ("text", "text/plain"),
        "md" | "markdown" => ("text", "text/markdown"),
        "html" | "htm" => ("text", "text/html"),
        "json" => ("data", "application/json"),
        "csv" => ("data", "text/csv"),
        "toml" => ("data", "application/toml"),
        "yaml" | "yml" => ("data", "application/yaml"),
        "rs" => ("code", "text/x-rust"),
        "py" => ("code", "text/x-python"),
        "js" | "mjs" => ("code", "text/javascript"),
        "go" => ("code", "text/x-go"),
        "c" | "h" => ("code", "text/x-c"),
        "pdf" => ("document", "application/pdf"),
        "png" => ("image", "image/png"),
        "jpg" | "jpeg" => ("image", "image/jpeg"),
        _ => return None,
    };
    Some(pair)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn stat_on_missing_path_yields_sentinel() {
        let rec = stat(Path::new("/nonexistent/really/not-here"));
        assert_eq!(rec.owner, "unknown");
        assert_eq!(rec.size_bytes, -1);
        assert_eq!(rec.modified.timestamp(), 0);
        let meta = rec.metadata();
        assert!(!meta.contains_key("size_bytes"), "negative size omitted");
    }

    #[test]
    fn classify_maps_known_extensions() {
        assert_eq!(classify(Path::new("a/b.rs")), Some(("code", "text/x-rust")));
        assert_eq!(classify(Path::new("notes.MD")), Some(("text", "text/markdown")));
        assert_eq!(classify(Path::new("blob.xyz")), None);
        assert_eq!(classify(Path::new("no_extension")), None);
    }

    #[test]
    fn walk_skips_ignored_directories_and_files() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        std::fs::create_dir(root.join(".git")).unwrap();
        std::fs::write(root.join(".git/config"), "hidden").unwrap();
        std::fs::create_dir(root.join("src")).unwrap();
        let mut f = std::fs::File::create(root.join("src/main.rs")).unwrap();
        writeln!(f, "fn main() {{}}").unwrap();
        std::fs::write(root.join("notes.txt"), "hello").unwrap();

        let records = walk(root, &[".git".to_string()]);
        let mut names: Vec<String> = records
            .iter()
            .filter_map(|r| r.path.file_name().and_then(|n| n.to_str()).map(String::from))
            .collect();
        names.sort();
        assert_eq!(names, vec!["main.rs", "notes.txt"]);
    }

    #[test]
    fn file_record_metadata_includes_stat_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("doc.txt");
        std::fs::write(&path, "twelve bytes").unwrap();
        let meta = stat(&path).metadata();
        assert_eq!(meta.get("size_bytes").map(String::as_str), Some("12"));
        assert_eq!(meta.get("mime_type").map(String::as_str), Some("text/plain"));
        assert!(meta.contains_key("owner"));
        assert!(meta.contains_key("modified"));
    }
}
