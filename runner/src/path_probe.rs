use crate::trace::Trace;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathVerdict {
    NotFound,
    File,
    Directory,
}

impl PathVerdict {
    pub fn exists(self) -> bool {
        self != PathVerdict::NotFound
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PathVerdict::NotFound => "not_found",
            PathVerdict::File => "file",
            PathVerdict::Directory => "directory",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PathReport {
    pub path: String,
    pub verdict: PathVerdict,
    pub trace: Trace,
}

/// Single metadata query, following symlinks. Any error, including a
/// permission failure on a parent directory, reads as `NotFound`.
pub fn exists(path: &str) -> PathVerdict {
    match std::fs::metadata(Path::new(path)) {
        Ok(meta) if meta.is_dir() => PathVerdict::Directory,
        Ok(_) => PathVerdict::File,
        Err(err) => {
            tracing::debug!(path, error = %err, "path metadata unavailable");
            PathVerdict::NotFound
        }
    }
}

pub fn check(path: &str) -> PathReport {
    let mut trace = Trace::new();
    trace.push("Initiating path existence check...");
    trace.push("Using std::fs::metadata");
    trace.push(format!("Checking path: {path}"));

    let verdict = exists(path);
    trace.push(format!("metadata query returned: {}", verdict.exists()));
    match verdict {
        PathVerdict::NotFound => trace.push(format!("Path does NOT exist: {path}")),
        PathVerdict::File | PathVerdict::Directory => {
            trace.push(format!("Path exists: {path}"));
            let kind = if verdict == PathVerdict::Directory {
                "directory"
            } else {
                "file"
            };
            trace.push(format!("Detected as {kind}"));
        }
    }
    trace.push("Path existence check complete.");

    tracing::info!(path, verdict = verdict.as_str(), "path probe finished");
    PathReport {
        path: path.to_string(),
        verdict,
        trace,
    }
}
