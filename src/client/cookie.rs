use std::path::{Path, PathBuf};
use std::{env, fs, io};

use anyhow::{bail, Context, Result};
use log::debug;

use crate::config::home_dir;

pub const COOKIES_ENV: &str = "S3BRIDGE_COOKIES";
const COOKIES_FILE: &str = ".s3bridge_cookies";

/// Where the session cookie sent to the broker comes from: the environment
/// first, then a file in the home directory. Both hold a raw `Cookie` header
/// value, e.g. `s3bridge_session=eyJ...`.
pub struct CookieSource {
    env_value: Option<String>,
    path: PathBuf,
}

impl CookieSource {
    pub fn new() -> Result<Self> {
        Ok(Self {
            env_value: env::var(COOKIES_ENV).ok(),
            path: home_dir()?.join(COOKIES_FILE),
        })
    }

    pub fn with_path(env_value: Option<String>, path: &Path) -> Self {
        Self {
            env_value,
            path: path.to_path_buf(),
        }
    }

    pub fn load(&self) -> Result<String> {
        if let Some(value) = self.env_value.as_deref() {
            let value = value.trim();
            if !value.is_empty() {
                debug!("Use session cookie from ${COOKIES_ENV}");
                return Ok(value.to_string());
            }
        }

        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                bail!(
                    "no session cookie found, please set ${COOKIES_ENV} or write it to '{}'",
                    self.path.display()
                );
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("read cookie file '{}'", self.path.display()))
            }
        };

        let value = data.trim();
        if value.is_empty() {
            bail!("cookie file '{}' is empty", self.path.display());
        }
        debug!("Use session cookie from '{}'", self.path.display());
        Ok(value.to_string())
    }
}
