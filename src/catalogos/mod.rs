//! Read-only lookups in the SAT catalogs (`c_FormaPago`, `c_UsoCFDI`, ...).
//!
//! Each catalog is a JSON array of records stored as `cat_<snake_case>.json`,
//! e.g. `FormaPago` lives in `cat_forma_pago.json`.

use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::CatalogError;

/// Outcome of a lookup. A missing catalog or key is a `status: false` result,
/// not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogResult {
    pub status: bool,
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CatalogResult {
    fn found(data: Value) -> Self {
        Self {
            status: true,
            data: Some(data),
            message: None,
        }
    }

    fn missing(message: String) -> Self {
        Self {
            status: false,
            data: None,
            message: Some(message),
        }
    }
}

/// Catalog directory handle.
#[derive(Debug, Clone)]
pub struct Catalogs {
    dir: PathBuf,
}

impl Catalogs {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing catalog `name`.
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(format!("cat_{}.json", snake_case(name)))
    }

    /// Whole catalog as parsed JSON.
    pub fn get_catalog(&self, name: &str) -> Result<CatalogResult, CatalogError> {
        let path = self.path_of(name);
        if !path.exists() {
            debug!(catalog = name, path = %path.display(), "catalog not found");
            return Ok(CatalogResult::missing(format!(
                "catalog \"{name}\" does not exist"
            )));
        }
        let text = std::fs::read_to_string(&path).map_err(|source| CatalogError::Io {
            name: name.to_string(),
            source,
        })?;
        let data: Value = serde_json::from_str(&text).map_err(|e| CatalogError::Parse {
            name: name.to_string(),
            message: e.to_string(),
        })?;
        Ok(CatalogResult::found(data))
    }

    /// First record of catalog `name` whose `key` field is the string `value`.
    pub fn find_in_catalog(
        &self,
        value: &str,
        key: &str,
        name: &str,
    ) -> Result<CatalogResult, CatalogError> {
        let catalog = self.get_catalog(name)?;
        let Some(data) = catalog.data else {
            return Ok(catalog);
        };
        let Value::Array(records) = data else {
            return Err(CatalogError::NotAList(name.to_string()));
        };
        let found = records
            .into_iter()
            .find(|record| record.get(key).and_then(Value::as_str) == Some(value));
        Ok(match found {
            Some(record) => CatalogResult::found(record),
            None => CatalogResult::missing(format!(
                "key \"{value}\" not found in catalog \"{name}\""
            )),
        })
    }
}

/// `FormaPago` → `forma_pago`, `UsoCFDI` → `uso_c_f_d_i`.
///
/// Every ASCII uppercase letter gets a `_` in front and is lowercased; one
/// leading `_` is dropped.
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.extend(c.to_lowercase());
        }
    }
    match out.strip_prefix('_') {
        Some(rest) => rest.to_string(),
        None => out,
    }
}
