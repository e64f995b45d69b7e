//! Static file mounting.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use http::header::CONTENT_TYPE;
use http::{Method, StatusCode};
use tracing::debug;

use crate::context::Context;
use crate::error::{Error, MountError};
use crate::handler::handler;
use crate::mux::normalize;
use crate::response::ContentType;
use crate::service::Service;

impl Service {
    /// Serves `filename` on `GET path` of the default version.
    ///
    /// A `path` ending in a wildcard (`/assets/*filepath`) serves files below
    /// `filename`, which must then be a directory; the captured suffix is
    /// joined onto it. Directories resolve to their `index.html`.
    ///
    /// Fails if `filename` does not exist or if `path` has a parameter other
    /// than a trailing wildcard.
    pub fn serve_files(&mut self, path: &str, filename: impl AsRef<Path>) -> Result<(), MountError> {
        let filename = filename.as_ref();
        let wildcard = wildcard_param(path)?;
        let meta = std::fs::metadata(filename).map_err(|source| MountError::MissingFile {
            path: filename.display().to_string(),
            source,
        })?;

        let root: Arc<Path> = Arc::from(filename);
        let base: Arc<Path> = Arc::from(base_dir(filename, meta.is_dir()));
        let wildcard: Option<Arc<str>> = wildcard.map(Arc::from);
        let serve = handler(move |ctx: Context| {
            let root = Arc::clone(&root);
            let base = Arc::clone(&base);
            let wildcard = wildcard.clone();
            async move {
                let target = match wildcard.as_deref() {
                    Some(name) => ctx.param(name).and_then(|suffix| resolve(&base, suffix)),
                    None => Some(root.to_path_buf()),
                };
                match target {
                    Some(target) => serve_file(&ctx, &target).await,
                    None => ctx.respond_bytes(StatusCode::NOT_FOUND, ""),
                }
            }
        });

        let ctrl = self.new_controller("FileServer");
        let entry = ctrl.handle_func("Serve", serve, None);
        self.mux().handle(Method::GET, path, entry)
    }
}

/// The trailing wildcard's name, if `path` ends in one.
fn wildcard_param(path: &str) -> Result<Option<String>, MountError> {
    let normalized = normalize(path);
    let segments: Vec<&str> = normalized.split('/').collect();
    let last = segments.len().saturating_sub(1);

    let mut wildcard = None;
    for (i, segment) in segments.iter().enumerate() {
        let Some(inner) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) else {
            continue;
        };
        match inner.strip_prefix('*') {
            Some(name) if i == last => wildcard = Some(name.to_owned()),
            _ => return Err(MountError::PartialWildcard(path.to_owned())),
        }
    }
    Ok(wildcard)
}

/// Where wildcard suffixes are resolved: the mounted directory itself, or
/// the directory holding the mounted file.
fn base_dir(filename: &Path, is_dir: bool) -> &Path {
    if is_dir {
        filename
    } else {
        filename.parent().unwrap_or(filename)
    }
}

/// Joins a captured suffix onto `base`. Anything other than plain names
/// (`..`, roots, drive prefixes) is refused.
fn resolve(base: &Path, suffix: &str) -> Option<PathBuf> {
    let mut path = base.to_path_buf();
    for component in Path::new(suffix.trim_start_matches('/')).components() {
        match component {
            Component::Normal(name) => path.push(name),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(path)
}

async fn serve_file(ctx: &Context, path: &Path) -> Result<(), Error> {
    let mut path = path.to_path_buf();
    if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_dir()) {
        path.push("index.html");
    }

    let body = match tokio::fs::read(&path).await {
        Ok(body) => body,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "static file not found");
            return ctx.respond_bytes(StatusCode::NOT_FOUND, "");
        }
        Err(e) => return Err(e.into()),
    };

    let content_type = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(ContentType::from_extension)
        .unwrap_or(ContentType::OctetStream);
    ctx.set_header(CONTENT_TYPE, content_type.header_value());
    ctx.respond_bytes(StatusCode::OK, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_wildcard_is_accepted() {
        assert_eq!(wildcard_param("/assets/*filepath").unwrap().as_deref(), Some("filepath"));
        assert_eq!(wildcard_param("/assets/{*rest}").unwrap().as_deref(), Some("rest"));
        assert_eq!(wildcard_param("/favicon.ico").unwrap(), None);
    }

    #[test]
    fn named_or_inner_parameters_are_rejected() {
        assert!(matches!(wildcard_param("/users/:id"), Err(MountError::PartialWildcard(_))));
        assert!(matches!(wildcard_param("/a/*rest/b"), Err(MountError::PartialWildcard(_))));
    }

    #[test]
    fn traversal_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        assert!(resolve(dir.path(), "../etc/passwd").is_none());
        assert!(resolve(dir.path(), "css/../../x").is_none());
        assert_eq!(resolve(dir.path(), "css/./site.css").unwrap(), dir.path().join("css/site.css"));
    }

    #[test]
    fn suffix_joins_onto_the_parent_of_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("index.html");

        assert_eq!(base_dir(&file, false), dir.path());
        assert_eq!(base_dir(dir.path(), true), dir.path());
        assert_eq!(resolve(base_dir(&file, false), "a.css").unwrap(), dir.path().join("a.css"));
    }
}
