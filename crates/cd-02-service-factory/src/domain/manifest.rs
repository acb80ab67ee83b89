//! # Module Manifests
//!
//! A module manifest declares the implementations a module provides. It is
//! read before any module is loaded and merged into the descriptors the
//! static registrations produced.
//!
//! ```json
//! {
//!   "id": "filters",
//!   "services": [
//!     {
//!       "impl": "conduit::Doubler",
//!       "interface": "conduit::Filter",
//!       "objects": ["conduit::Integer"],
//!       "description": "Doubles an integer",
//!       "tags": ["math"]
//!     }
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use shared_types::{ModuleId, TypeTag};
use tracing::debug;

use crate::error::{ServiceFactoryError, ServiceFactoryResult};

/// One implementation declared by a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestService {
    #[serde(rename = "impl")]
    pub impl_id: String,
    pub interface: TypeTag,
    #[serde(default)]
    pub objects: Vec<TypeTag>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// The declarations of one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleManifest {
    pub id: ModuleId,
    #[serde(default)]
    pub services: Vec<ManifestService>,
}

impl ModuleManifest {
    pub fn new(id: impl Into<ModuleId>) -> Self {
        Self {
            id: id.into(),
            services: Vec::new(),
        }
    }

    /// Builder-style service declaration.
    #[must_use]
    pub fn with_service(
        mut self,
        impl_id: &str,
        interface: impl Into<TypeTag>,
        objects: &[&'static str],
    ) -> Self {
        self.services.push(ManifestService {
            impl_id: impl_id.to_string(),
            interface: interface.into(),
            objects: objects.iter().copied().map(TypeTag::from_static).collect(),
            description: String::new(),
            tags: Vec::new(),
        });
        self
    }

    /// Parse a manifest from JSON text. `source_name` only labels errors.
    pub fn from_json(source_name: &str, text: &str) -> ServiceFactoryResult<Self> {
        let manifest: Self =
            serde_json::from_str(text).map_err(|e| ServiceFactoryError::Manifest {
                source_name: source_name.to_string(),
                reason: e.to_string(),
            })?;
        manifest.validate(source_name)?;
        Ok(manifest)
    }

    pub fn from_file(path: &Path) -> ServiceFactoryResult<Self> {
        let source_name = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|e| ServiceFactoryError::Manifest {
            source_name: source_name.clone(),
            reason: e.to_string(),
        })?;
        Self::from_json(&source_name, &text)
    }

    /// Every `*.json` file of `dir`, sorted by file name.
    pub fn load_dir(dir: &Path) -> ServiceFactoryResult<Vec<Self>> {
        let entries = fs::read_dir(dir).map_err(|e| ServiceFactoryError::Manifest {
            source_name: dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut paths: Vec<_> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let manifests = paths
            .iter()
            .map(|path| Self::from_file(path))
            .collect::<ServiceFactoryResult<Vec<_>>>()?;
        debug!(dir = %dir.display(), count = manifests.len(), "Module manifests read");
        Ok(manifests)
    }

    fn validate(&self, source_name: &str) -> ServiceFactoryResult<()> {
        let invalid = |reason: String| ServiceFactoryError::Manifest {
            source_name: source_name.to_string(),
            reason,
        };
        if self.id.is_empty() {
            return Err(invalid("empty module id".to_string()));
        }
        for service in &self.services {
            if service.impl_id.is_empty() {
                return Err(invalid("service with empty impl id".to_string()));
            }
            if service.interface.as_str().is_empty() {
                return Err(invalid(format!("service '{}' has no interface", service.impl_id)));
            }
        }
        Ok(())
    }
}
