use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("downloaded model from {0} is empty")]
    EmptyDownload(String),
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Locates detector model files, downloading them once into a cache.
///
/// Lookup order: cache directory, then the optional bundled directory,
/// then a download into the cache.
pub struct ModelResolver {
    cache_dir: PathBuf,
    bundled_dir: Option<PathBuf>,
}

impl ModelResolver {
    /// Resolver rooted at the platform cache directory.
    pub fn new() -> Result<Self, ModelResolveError> {
        Ok(Self::with_cache_dir(model_cache_dir()?))
    }

    pub fn with_cache_dir(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            bundled_dir: None,
        }
    }

    pub fn with_bundled_dir(mut self, dir: PathBuf) -> Self {
        self.bundled_dir = Some(dir);
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns a local path for `name`, fetching it from `url` if needed.
    pub fn resolve(
        &self,
        name: &str,
        url: &str,
        progress: Option<ProgressFn>,
    ) -> Result<PathBuf, ModelResolveError> {
        if let Some(found) = self.find_local(name) {
            log::debug!("Model {name} found at {}", found.display());
            return Ok(found);
        }

        fs::create_dir_all(&self.cache_dir).map_err(ModelResolveError::CacheDir)?;
        let cached_path = self.cache_dir.join(name);
        log::info!("Downloading {name} from {url}");
        download(url, &cached_path, progress)?;
        Ok(cached_path)
    }

    /// Cached or bundled copy of `name`, without touching the network.
    pub fn find_local(&self, name: &str) -> Option<PathBuf> {
        let cached = self.cache_dir.join(name);
        if cached.is_file() {
            return Some(cached);
        }
        self.bundled_dir
            .as_ref()
            .map(|dir| dir.join(name))
            .filter(|p| p.is_file())
    }
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/facecrop/models/`
/// - Linux: `$XDG_CACHE_HOME/facecrop/models/` or `~/.cache/facecrop/models/`
/// - Windows: `%LOCALAPPDATA%/facecrop/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join("facecrop").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join("facecrop").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");
    let result = download_to(url, dest, &temp_path, progress);
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn download_to(
    url: &str,
    dest: &Path,
    temp_path: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;
    let total = response.content_length().unwrap_or(0);

    let write_err = |e: std::io::Error| ModelResolveError::Write {
        path: temp_path.to_path_buf(),
        source: e,
    };
    let mut file = fs::File::create(temp_path).map_err(write_err)?;

    let mut downloaded: u64 = 0;
    let mut buf = vec![0u8; 256 * 1024];
    loop {
        let n = response.read(&mut buf).map_err(write_err)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err)?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }
    file.flush().map_err(write_err)?;
    drop(file);

    if downloaded == 0 {
        return Err(ModelResolveError::EmptyDownload(url.to_string()));
    }

    fs::rename(temp_path, dest).map_err(|e| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const UNREACHABLE_URL: &str = "http://invalid.nonexistent.example.com/model.bin";

    #[test]
    fn test_resolve_prefers_cache() {
        let tmp = TempDir::new().unwrap();
        let cached = tmp.path().join("seeta.bin");
        fs::write(&cached, b"cached model").unwrap();

        let resolver = ModelResolver::with_cache_dir(tmp.path().to_path_buf());
        assert_eq!(resolver.resolve("seeta.bin", UNREACHABLE_URL, None).unwrap(), cached);
    }

    #[test]
    fn test_resolve_falls_back_to_bundled() {
        let tmp = TempDir::new().unwrap();
        let bundled = tmp.path().join("bundled");
        fs::create_dir_all(&bundled).unwrap();
        fs::write(bundled.join("seeta.bin"), b"bundled model").unwrap();

        let resolver = ModelResolver::with_cache_dir(tmp.path().join("cache"))
            .with_bundled_dir(bundled.clone());
        let path = resolver.resolve("seeta.bin", UNREACHABLE_URL, None).unwrap();
        assert_eq!(path, bundled.join("seeta.bin"));
        assert!(!resolver.cache_dir().exists());
    }

    #[test]
    fn test_find_local_none_when_missing() {
        let tmp = TempDir::new().unwrap();
        let resolver = ModelResolver::with_cache_dir(tmp.path().to_path_buf());
        assert!(resolver.find_local("seeta.bin").is_none());
    }

    #[test]
    fn test_unreachable_download_leaves_nothing_behind() {
        let tmp = TempDir::new().unwrap();
        let resolver = ModelResolver::with_cache_dir(tmp.path().join("cache"));
        let result = resolver.resolve("seeta.bin", UNREACHABLE_URL, None);
        assert!(matches!(result, Err(ModelResolveError::Download { .. })));
        let dest = resolver.cache_dir().join("seeta.bin");
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }

    #[test]
    fn test_model_cache_dir_is_namespaced() {
        let path = model_cache_dir().unwrap();
        assert!(path.ends_with("facecrop/models"));
    }
}
