//! Application descriptors.
//!
//! A descriptor is stored as an envelope:
//!
//! ```json
//! { "public": { "name": "foo", "version": "1.0.0", "dapp": { "entrypoint": "index.js" } },
//!   "private": { ... } }
//! ```
//!
//! or as a bare public object. The private part is kept on the in-memory
//! descriptor as an opaque value and is never serialized again, so it cannot
//! reach the descriptor cache, the module system or an embedded frame.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{LoaderError, LoaderResult};

/// Default maximum descriptor size accepted by [`parse_envelope`] (2 MiB).
pub const DEFAULT_MAX_DESCRIPTOR_BYTES: usize = 2 * 1024 * 1024;

static NO_DEPENDENCIES: BTreeMap<String, String> = BTreeMap::new();

/// The parsed application manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDescriptor {
    pub name: String,

    #[serde(default)]
    pub version: String,

    /// Published version -> content location (hash or symbolic address).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub versions: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dapp: Option<DappSection>,

    /// Unknown public fields, kept so the cached form round-trips.
    #[serde(flatten)]
    pub extra: Map<String, Value>,

    #[serde(skip)]
    private: Option<Value>,
}

/// The `dapp` section of a descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DappSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,

    /// Dependency name -> version range.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,

    /// Content folder the application files are published under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_ipns: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// `false` opts the descriptor out of the persistent cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<bool>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Where an application's files live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentLocation {
    pub origin: String,
    pub is_content_addressed: bool,
}

/// How an entrypoint is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrypointKind {
    /// `*.js`: imported and started through its exported start function.
    Script,
    /// `*.html`: mounted as an embedded document.
    Document,
    /// `*.css`: injected as a stylesheet.
    Stylesheet,
}

impl EntrypointKind {
    pub fn of(file: &str) -> Option<Self> {
        let lower = file.to_ascii_lowercase();
        if lower.ends_with(".js") {
            Some(Self::Script)
        } else if lower.ends_with(".html") {
            Some(Self::Document)
        } else if lower.ends_with(".css") {
            Some(Self::Stylesheet)
        } else {
            None
        }
    }
}

impl ApplicationDescriptor {
    /// Minimal descriptor, mostly useful for tests and fixtures.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            versions: BTreeMap::new(),
            description: None,
            dapp: Some(DappSection::default()),
            extra: Map::new(),
            private: None,
        }
    }

    pub fn with_entrypoint(mut self, entrypoint: impl Into<String>) -> Self {
        self.dapp_mut().entrypoint = Some(entrypoint.into());
        self
    }

    pub fn with_dependency(mut self, name: impl Into<String>, range: impl Into<String>) -> Self {
        self.dapp_mut().dependencies.insert(name.into(), range.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>, location: impl Into<String>) -> Self {
        self.versions.insert(version.into(), location.into());
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.dapp_mut().origin = Some(origin.into());
        self
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.dapp_mut().files.push(file.into());
        self
    }

    fn dapp_mut(&mut self) -> &mut DappSection {
        self.dapp.get_or_insert_with(DappSection::default)
    }

    /// Entrypoint file, if declared and non-empty.
    pub fn entrypoint(&self) -> Option<&str> {
        self.dapp
            .as_ref()
            .and_then(|d| d.entrypoint.as_deref())
            .filter(|e| !e.trim().is_empty())
    }

    pub fn dependencies(&self) -> &BTreeMap<String, String> {
        self.dapp
            .as_ref()
            .map(|d| &d.dependencies)
            .unwrap_or(&NO_DEPENDENCIES)
    }

    pub fn files(&self) -> &[String] {
        self.dapp.as_ref().map(|d| d.files.as_slice()).unwrap_or(&[])
    }

    pub fn content_location(&self) -> Option<ContentLocation> {
        let dapp = self.dapp.as_ref()?;
        let origin = dapp.origin.as_ref().filter(|o| !o.is_empty())?;
        Some(ContentLocation {
            origin: origin.clone(),
            is_content_addressed: !dapp.is_ipns,
        })
    }

    /// Whether the descriptor may be written to the persistent cache.
    pub fn is_cacheable(&self) -> bool {
        self.dapp.as_ref().and_then(|d| d.cache).unwrap_or(true)
    }

    /// Insert the current version into the history if it is missing.
    pub fn ensure_current_version(&mut self, location: &str) {
        if !self.version.is_empty() && !self.versions.contains_key(&self.version) {
            self.versions.insert(self.version.clone(), location.to_string());
        }
    }

    /// The private part of the envelope, available only to the resolving caller.
    pub fn private(&self) -> Option<&Value> {
        self.private.as_ref()
    }

    /// Drop the private part.
    pub fn into_public(mut self) -> Self {
        self.private = None;
        self
    }

    /// Public JSON text. The private part is never included.
    pub fn to_public_json(&self) -> LoaderResult<String> {
        serde_json::to_string(self).map_err(|e| LoaderError::parse(&self.name, e))
    }
}

/// Parse descriptor bytes fetched for `address`.
///
/// Accepts an envelope or a bare public object, and a JSON string that itself
/// contains the document.
pub fn parse_envelope(address: &str, bytes: &[u8], max_bytes: usize) -> LoaderResult<ApplicationDescriptor> {
    if bytes.len() > max_bytes {
        return Err(LoaderError::parse(
            address,
            format!("descriptor too large ({} bytes > limit {max_bytes})", bytes.len()),
        ));
    }

    let mut doc: Value = serde_json::from_slice(bytes).map_err(|e| LoaderError::parse(address, e))?;
    if let Value::String(inner) = &doc {
        doc = serde_json::from_str(inner).map_err(|e| LoaderError::parse(address, e))?;
    }

    let Value::Object(mut obj) = doc else {
        return Err(LoaderError::parse(address, "descriptor is not a JSON object"));
    };

    let (public, private) = match obj.remove("public") {
        Some(public) => (public, obj.remove("private")),
        None => {
            let private = obj.remove("private");
            (Value::Object(obj), private)
        }
    };
    let private = private.filter(|p| !p.is_null());

    let has_dapp = public.get("dapp").is_some_and(Value::is_object);
    if !public.is_object() {
        return Err(LoaderError::parse(address, "public section is not a JSON object"));
    }
    if !has_dapp {
        return Err(LoaderError::MissingEntrypoint {
            address: address.to_string(),
        });
    }

    let mut descriptor: ApplicationDescriptor =
        serde_json::from_value(public).map_err(|e| LoaderError::parse(address, e))?;
    descriptor.private = private;
    Ok(descriptor)
}
