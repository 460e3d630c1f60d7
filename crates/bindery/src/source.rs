//! Where configuration text comes from.
//!
//! The include loader never touches the file system itself; it asks a
//! [`SourceLoader`] to turn an include path into text plus a stable
//! identifier. The identifier is what circular-include detection compares and
//! what diagnostics print.

use std::io;
use std::path::{Component, Path as FsPath, PathBuf};

use indexmap::IndexMap;
use tracing::trace;

/// A loaded source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSource {
    /// Resolved identifier (canonical path, URI, or in-memory name)
    pub id: String,
    pub text: String,
}

/// Resolves include paths to source text.
pub trait SourceLoader {
    /// Load `path`, as written in an include statement or on the command
    /// line. `including` is the identifier of the file doing the including,
    /// if any.
    fn load(&self, path: &str, including: Option<&str>) -> io::Result<LoadedSource>;
}

impl<L: SourceLoader + ?Sized> SourceLoader for &L {
    fn load(&self, path: &str, including: Option<&str>) -> io::Result<LoadedSource> {
        (**self).load(path, including)
    }
}

impl<L: SourceLoader + ?Sized> SourceLoader for Box<L> {
    fn load(&self, path: &str, including: Option<&str>) -> io::Result<LoadedSource> {
        (**self).load(path, including)
    }
}

/// `scheme://...` paths are opaque to the file system loader.
pub fn is_uri(path: &str) -> bool {
    match path.find("://") {
        Some(idx) if idx > 0 => path[..idx]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')),
        _ => false,
    }
}

/// Lexically resolve `.` and `..` components so one file has one spelling.
pub fn normalize(path: &FsPath) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Loads sources from the local file system.
///
/// Relative paths are tried against the including file's directory, then each
/// search path in order, then the working directory. URIs go to the remote
/// loader if one is configured.
#[derive(Default)]
pub struct FsLoader {
    search_paths: Vec<PathBuf>,
    remote: Option<Box<dyn SourceLoader>>,
}

impl FsLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_paths.push(dir.into());
        self
    }

    pub fn with_search_paths<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.search_paths.extend(dirs.into_iter().map(Into::into));
        self
    }

    /// Delegate `scheme://` paths to `remote`.
    pub fn with_remote(mut self, remote: impl SourceLoader + 'static) -> Self {
        self.remote = Some(Box::new(remote));
        self
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    fn candidates(&self, path: &str, including: Option<&str>) -> Vec<PathBuf> {
        let requested = FsPath::new(path);
        if requested.is_absolute() {
            return vec![requested.to_path_buf()];
        }
        let mut candidates = Vec::new();
        if let Some(dir) = including
            .filter(|id| !is_uri(id))
            .and_then(|id| FsPath::new(id).parent())
        {
            candidates.push(dir.join(requested));
        }
        candidates.extend(self.search_paths.iter().map(|dir| dir.join(requested)));
        candidates.push(requested.to_path_buf());
        candidates
    }
}

impl SourceLoader for FsLoader {
    fn load(&self, path: &str, including: Option<&str>) -> io::Result<LoadedSource> {
        if is_uri(path) {
            return match &self.remote {
                Some(remote) => remote.load(path, including),
                None => Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "no loader configured for remote paths",
                )),
            };
        }

        for candidate in self.candidates(path, including) {
            trace!(candidate = %candidate.display(), "trying include path");
            if candidate.is_file() {
                let text = std::fs::read_to_string(&candidate)?;
                let id =
                    std::fs::canonicalize(&candidate).unwrap_or_else(|_| normalize(&candidate));
                return Ok(LoadedSource {
                    id: id.display().to_string(),
                    text,
                });
            }
        }
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!(
                "not found relative to the including file or any of {} search path(s)",
                self.search_paths.len()
            ),
        ))
    }
}

/// Serves sources from memory, keyed by name.
///
/// Relative names are tried against the including file's directory first,
/// mirroring [`FsLoader`]. Names are compared after [`normalize`].
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: IndexMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.files.insert(name.into(), text.into());
    }

    /// Builder-style [`MemoryLoader::insert`].
    pub fn with(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(name, text);
        self
    }
}

impl SourceLoader for MemoryLoader {
    fn load(&self, path: &str, including: Option<&str>) -> io::Result<LoadedSource> {
        // URIs are matched verbatim; `normalize` would fold their `//`.
        let spelled = |name: PathBuf| {
            let raw = name.display().to_string();
            if is_uri(&raw) {
                raw
            } else {
                normalize(&name).display().to_string()
            }
        };
        let relative = including
            .filter(|_| !is_uri(path))
            .and_then(|id| FsPath::new(id).parent())
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| spelled(dir.join(path)));
        let direct = spelled(PathBuf::from(path));

        relative
            .into_iter()
            .chain(std::iter::once(direct))
            .find_map(|name| {
                self.files.get(&name).map(|text| LoadedSource {
                    id: name.clone(),
                    text: text.clone(),
                })
            })
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such in-memory source"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_uri() {
        assert!(is_uri("gs://t5-data/pretrained/base.gin"));
        assert!(is_uri("s3+http://bucket/x.gin"));
        assert!(!is_uri("configs/base.gin"));
        assert!(!is_uri("://nothing"));
        assert!(!is_uri("/abs/path.gin"));
    }

    #[test]
    fn test_memory_loader_prefers_including_directory() {
        let loader = MemoryLoader::new()
            .with("runs/base.gin", "A = 1")
            .with("base.gin", "A = 2");

        let nested = loader.load("base.gin", Some("runs/finetune.gin")).unwrap();
        assert_eq!(nested.id, "runs/base.gin");

        let top = loader.load("base.gin", None).unwrap();
        assert_eq!(top.id, "base.gin");
        assert_eq!(top.text, "A = 2");
    }

    #[test]
    fn test_memory_loader_normalizes_names() {
        let loader = MemoryLoader::new().with("a.gin", "A = 1");
        let loaded = loader.load("../a.gin", Some("sub/b.gin")).unwrap();
        assert_eq!(loaded.id, "a.gin");
        assert_eq!(loader.load("./a.gin", Some("a.gin")).unwrap().id, "a.gin");

        let remote = MemoryLoader::new().with("gs://bucket/a.gin", "A = 1");
        let loaded = remote.load("gs://bucket/a.gin", Some("runs/top.gin")).unwrap();
        assert_eq!(loaded.id, "gs://bucket/a.gin");
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(FsPath::new("sub/../a.gin")), PathBuf::from("a.gin"));
        assert_eq!(normalize(FsPath::new("./x/./y.gin")), PathBuf::from("x/y.gin"));
        assert_eq!(normalize(FsPath::new("../up.gin")), PathBuf::from("../up.gin"));
        assert_eq!(normalize(FsPath::new("/a/../../b.gin")), PathBuf::from("/b.gin"));
    }

    #[test]
    fn test_fs_loader_canonicalizes_ids() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.gin"), "A = 1").unwrap();

        let loader = FsLoader::new();
        let direct = loader
            .load(&dir.path().join("a.gin").display().to_string(), None)
            .unwrap();
        let dotted = loader
            .load("../a.gin", Some(&dir.path().join("sub/b.gin").display().to_string()))
            .unwrap();
        assert_eq!(direct.id, dotted.id);
        assert!(!dotted.id.contains(".."));
    }

    #[test]
    fn test_memory_loader_missing() {
        let err = MemoryLoader::new().load("nope.gin", None).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_fs_loader_remote_without_delegate() {
        let err = FsLoader::new().load("gs://bucket/a.gin", None).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn test_fs_loader_remote_delegate() {
        let remote = MemoryLoader::new().with("gs://bucket/a.gin", "A = 1");
        let loader = FsLoader::new().with_remote(remote);
        let loaded = loader.load("gs://bucket/a.gin", None).unwrap();
        assert_eq!(loaded.id, "gs://bucket/a.gin");
    }
}
