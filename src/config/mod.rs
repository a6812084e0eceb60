use std::path::{Path, PathBuf};
use std::{env, fs, io};

use anyhow::{bail, Context, Result};
use log::warn;
use serde::de::DeserializeOwned;

/// Directories the broker reads configuration from and keeps its data in.
pub struct PathSet {
    pub config_path: PathBuf,
    pub data_path: PathBuf,
    pub pki_path: PathBuf,
}

impl PathSet {
    pub fn new(config_path: Option<PathBuf>, data_path: Option<PathBuf>) -> Result<Self> {
        // Check if running as root (UID == 0)
        let is_root = unsafe { libc::geteuid() == 0 };

        let config_path = if let Some(path) = config_path {
            path
        } else if let Ok(path) = env::var("S3BRIDGE_CONFIG") {
            PathBuf::from(path)
        } else if is_root {
            PathBuf::from("/etc/s3bridge")
        } else {
            home_dir()?.join(".config").join("s3bridge")
        };

        let data_path = if let Some(path) = data_path {
            path
        } else if let Ok(path) = env::var("S3BRIDGE_DATA") {
            PathBuf::from(path)
        } else if is_root {
            PathBuf::from("/var/lib/s3bridge")
        } else {
            home_dir()?.join(".local").join("share").join("s3bridge")
        };

        // PKI path is always under config path
        let pki_path = config_path.join("pki");

        ensure_dir_exists(&config_path)
            .with_context(|| format!("ensure config directory: {}", config_path.display()))?;
        ensure_dir_exists(&data_path)
            .with_context(|| format!("ensure data directory: {}", data_path.display()))?;
        ensure_dir_exists(&pki_path)
            .with_context(|| format!("ensure pki directory: {}", pki_path.display()))?;

        Ok(Self {
            config_path,
            data_path,
            pki_path,
        })
    }

    pub fn load_config<T, F>(&self, name: &str, default_func: F) -> Result<T>
    where
        T: CommonConfig + DeserializeOwned,
        F: FnOnce() -> T,
    {
        let path = self.config_path.join(format!("{name}.toml"));
        let mut cfg: T = match fs::read_to_string(&path) {
            Ok(s) => toml::from_str(&s).context("parse config toml")?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!("Config file for {name} not found, using defaults");
                default_func()
            }
            Err(err) => {
                return Err(err).context(format!("read config file: {}", path.display()));
            }
        };

        cfg.complete(self).context("validate config")?;
        Ok(cfg)
    }
}

/// Every configuration section knows its defaults and how to validate and
/// fill itself in against the resolved directories.
pub trait CommonConfig {
    fn default() -> Self;
    fn complete(&mut self, ps: &PathSet) -> Result<()>;
}

/// See: [`shellexpand::full`].
pub fn expandenv(name: &str, s: impl AsRef<str>) -> Result<String> {
    let s =
        shellexpand::full(s.as_ref()).with_context(|| format!("expand env value for '{name}'"))?;
    Ok(s.to_string())
}

pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

pub fn home_dir() -> Result<PathBuf> {
    let dir = env::var_os("HOME") // Unix/Linux/macOS
        .or_else(|| env::var_os("USERPROFILE")) // Windows
        .map(PathBuf::from);
    match dir {
        Some(dir) => Ok(dir),
        None => {
            bail!("could not determine home directory, please specify config path manually")
        }
    }
}

#[cfg(test)]
pub mod tests {
    use std::path::PathBuf;

    use super::PathSet;

    /// A path set rooted in a per-test temporary directory.
    pub fn temp_path_set(name: &str) -> PathSet {
        let root: PathBuf = std::env::temp_dir()
            .join("s3bridge-tests")
            .join(format!("{name}-{}", std::process::id()));
        PathSet::new(Some(root.join("config")), Some(root.join("data"))).unwrap()
    }
}
