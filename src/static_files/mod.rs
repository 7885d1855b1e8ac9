//! Static directories: a thin prefix-to-directory file passthrough.
//!
//! Checked before any routing. A request whose path starts with a registered
//! prefix is answered from the mapped directory and never reaches filters or
//! controllers. `/favicon.ico` is served from the first registered directory.

use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::context::Context;
use crate::http::StatusCode;

const FAVICON: &str = "/favicon.ico";

/// Why a static file could not be served.
#[derive(Debug, Error)]
pub enum StaticFileError {
    #[error("path `{0}` escapes its static directory")]
    Traversal(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StaticFileError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Traversal(_) => StatusCode::NotFound,
            Self::Read { source, .. } if source.kind() == io::ErrorKind::NotFound => StatusCode::NotFound,
            Self::Read { .. } => StatusCode::InternalServerError,
        }
    }
}

/// Registered `(url prefix, directory)` pairs, in registration order.
#[derive(Debug, Default, Clone)]
pub struct StaticDirs {
    dirs: Vec<(String, PathBuf)>,
}

impl StaticDirs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `prefix` to `dir`. Re-registering a prefix replaces its directory.
    pub fn insert(&mut self, prefix: impl Into<String>, dir: impl Into<PathBuf>) {
        let prefix = prefix.into();
        let dir = dir.into();
        match self.dirs.iter_mut().find(|(p, _)| *p == prefix) {
            Some((_, existing)) => *existing = dir,
            None => self.dirs.push((prefix, dir)),
        }
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    /// Maps a request path to a file, if any registered prefix claims it.
    ///
    /// The outer `Option` says whether a prefix claimed the path; the inner
    /// `Result` says whether the remainder is a safe relative path.
    pub fn resolve(&self, path: &str) -> Option<Result<PathBuf, StaticFileError>> {
        let (dir, rest) = self.dirs.iter().find_map(|(prefix, dir)| {
            if path == FAVICON {
                Some((dir, path))
            } else {
                path.strip_prefix(prefix.as_str()).map(|rest| (dir, rest))
            }
        })?;
        Some(join_checked(dir, rest).ok_or_else(|| StaticFileError::Traversal(path.to_owned())))
    }

    /// Serves the request from a static directory. Returns `false` when no
    /// prefix claims the path and routing should continue.
    pub fn serve(&self, ctx: &mut Context) -> bool {
        let Some(resolved) = self.resolve(ctx.request().path()) else {
            return false;
        };
        let outcome = resolved.and_then(|file| {
            std::fs::read(&file)
                .map(|bytes| (file.clone(), bytes))
                .map_err(|source| StaticFileError::Read { path: file, source })
        });

        let w = ctx.response_mut();
        match outcome {
            Ok((file, bytes)) => {
                debug!(file = %file.display(), size = bytes.len(), "serving static file");
                w.headers_mut().set("Content-Type", content_type(&file));
                w.write_header(StatusCode::Ok);
                w.write(&bytes);
            }
            Err(e) => {
                let status = e.status();
                if status == StatusCode::InternalServerError {
                    warn!(error = %e, "static file unavailable");
                } else {
                    debug!(error = %e, "static file not found");
                }
                w.write_header(status);
                w.write_str(status.canonical_reason());
            }
        }
        true
    }
}

// Joins only plain path components; anything that could climb out of `dir`
// is refused.
fn join_checked(dir: &Path, rest: &str) -> Option<PathBuf> {
    let mut file = dir.to_path_buf();
    for component in Path::new(rest.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => file.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(file)
}

fn content_type(file: &Path) -> String {
    mime_guess::from_path(file).first_or_octet_stream().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Request;

    fn ctx(path: &str) -> Context {
        let raw = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        Context::new(Request::parse(raw.as_bytes()).unwrap().0)
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rttp-route-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn unclaimed_path_falls_through() {
        let mut dirs = StaticDirs::new();
        dirs.insert("/static", "/srv/static");
        assert!(dirs.resolve("/api/users").is_none());
        assert!(!dirs.serve(&mut ctx("/api/users")));
    }

    #[test]
    fn resolves_below_directory() {
        let mut dirs = StaticDirs::new();
        dirs.insert("/static", "/srv/static");
        let file = dirs.resolve("/static/css/site.css").unwrap().unwrap();
        assert_eq!(file, Path::new("/srv/static/css/site.css"));
    }

    #[test]
    fn parent_segments_are_refused() {
        let mut dirs = StaticDirs::new();
        dirs.insert("/static", "/srv/static");
        assert!(matches!(
            dirs.resolve("/static/../etc/passwd"),
            Some(Err(StaticFileError::Traversal(_)))
        ));
    }

    #[test]
    fn favicon_comes_from_first_directory() {
        let mut dirs = StaticDirs::new();
        dirs.insert("/assets", "/srv/assets");
        dirs.insert("/img", "/srv/img");
        let file = dirs.resolve("/favicon.ico").unwrap().unwrap();
        assert_eq!(file, Path::new("/srv/assets/favicon.ico"));
    }

    #[test]
    fn serves_existing_file() {
        let dir = temp_dir("serve");
        std::fs::write(dir.join("hello.txt"), "hi there").unwrap();
        let mut dirs = StaticDirs::new();
        dirs.insert("/static", &dir);

        let mut c = ctx("/static/hello.txt");
        assert!(dirs.serve(&mut c));
        assert_eq!(c.response().status(), Some(StatusCode::Ok));
        assert_eq!(c.response().body(), b"hi there");
        assert_eq!(c.response().headers().get("content-type"), Some("text/plain"));
    }

    #[test]
    fn content_type_is_guessed_from_extension() {
        assert_eq!(content_type(Path::new("a/photo.webp")), "image/webp");
        assert_eq!(content_type(Path::new("doc.pdf")), "application/pdf");
        assert_eq!(content_type(Path::new("app.wasm")), "application/wasm");
        assert_eq!(content_type(Path::new("blob.unknownext")), "application/octet-stream");
    }

    #[test]
    fn missing_file_is_404_and_still_handled() {
        let dir = temp_dir("missing");
        let mut dirs = StaticDirs::new();
        dirs.insert("/static", &dir);

        let mut c = ctx("/static/nope.css");
        assert!(dirs.serve(&mut c));
        assert_eq!(c.response().status(), Some(StatusCode::NotFound));
    }
}
