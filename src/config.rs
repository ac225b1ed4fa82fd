//! Locations of the cadena original templates and the SAT catalogs.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding [`Config::xslt_root`].
pub const XSLT_ROOT_ENV: &str = "CFDI_XSLT_ROOT";
/// Environment variable overriding [`Config::catalog_dir`].
pub const CATALOG_DIR_ENV: &str = "CFDI_CATALOG_DIR";

/// File and directory locations used while generating documents.
///
/// # Examples
/// ```rust
/// use cfdi::config::Config;
///
/// let config = Config::new("sat/xslt/cadenaoriginal_4_0.xslt", "sat/catalogos");
/// assert!(config.xslt_root().ends_with("cadenaoriginal_4_0.xslt"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    xslt_root: PathBuf,
    catalog_dir: PathBuf,
}

impl Config {
    pub fn new(xslt_root: impl Into<PathBuf>, catalog_dir: impl Into<PathBuf>) -> Self {
        Self {
            xslt_root: xslt_root.into(),
            catalog_dir: catalog_dir.into(),
        }
    }

    /// Defaults, overridden by `CFDI_XSLT_ROOT` and `CFDI_CATALOG_DIR` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(root) = std::env::var_os(XSLT_ROOT_ENV) {
            config.xslt_root = PathBuf::from(root);
        }
        if let Some(dir) = std::env::var_os(CATALOG_DIR_ENV) {
            config.catalog_dir = PathBuf::from(dir);
        }
        config
    }

    /// Root cadena original template (`cadenaoriginal_4_0.xslt`).
    pub fn xslt_root(&self) -> &Path {
        &self.xslt_root
    }

    /// Directory holding the `cat_*.json` files.
    pub fn catalog_dir(&self) -> &Path {
        &self.catalog_dir
    }
}

/// Points at the templates and catalogs bundled with the crate, independent
/// of the working directory.
impl Default for Config {
    fn default() -> Self {
        Config {
            xslt_root: PathBuf::from(concat!(
                env!("CARGO_MANIFEST_DIR"),
                "/resources/xslt/cadenaoriginal_4_0.xslt"
            )),
            catalog_dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/resources/catalogos")),
        }
    }
}
