//! Module request parsing.
//!
//! Grammar: `address[/file][#export][!plugin]`, where plugin is `ens`
//! (descriptor JSON) or `dapp-content` (application files).

use std::fmt;

use dapploader_core::plugin;
use dapploader_core::{LoaderError, LoaderResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Plugin {
    Ens,
    DappContent,
}

impl Plugin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ens => plugin::ENS,
            Self::DappContent => plugin::DAPP_CONTENT,
        }
    }

    fn parse(s: &str) -> LoaderResult<Self> {
        match s.trim() {
            plugin::ENS => Ok(Self::Ens),
            plugin::DAPP_CONTENT => Ok(Self::DappContent),
            other => Err(LoaderError::invalid_argument(format!("unknown module plugin: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRequest {
    pub address: String,
    pub file: Option<String>,
    /// Export selected from the module once imported.
    pub export: Option<String>,
    pub plugin: Option<Plugin>,
}

impl ModuleRequest {
    pub fn parse(raw: &str) -> LoaderResult<Self> {
        let (body, plugin) = match raw.rsplit_once('!') {
            Some((body, p)) => (body, Some(Plugin::parse(p)?)),
            None => (raw, None),
        };
        let (body, export) = match body.split_once('#') {
            Some((body, e)) if !e.is_empty() => (body, Some(e.to_string())),
            Some((body, _)) => (body, None),
            None => (body, None),
        };

        let body = body.trim().trim_start_matches('/');
        let (address, file) = match body.split_once('/') {
            Some((a, f)) if !f.is_empty() => (a, Some(f.to_string())),
            Some((a, _)) => (a, None),
            None => (body, None),
        };
        if address.is_empty() {
            return Err(LoaderError::invalid_argument(format!("module request without address: {raw:?}")));
        }

        Ok(Self {
            address: address.to_string(),
            file,
            export,
            plugin,
        })
    }

    pub fn content(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            file: None,
            export: None,
            plugin: Some(Plugin::DappContent),
        }
    }

    pub fn descriptor(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            file: None,
            export: None,
            plugin: Some(Plugin::Ens),
        }
    }

    /// Module id: the request without its export selector.
    pub fn id(&self) -> String {
        let mut id = self.address.clone();
        if let Some(file) = &self.file {
            id.push('/');
            id.push_str(file);
        }
        if let Some(plugin) = self.plugin {
            id.push('!');
            id.push_str(plugin.as_str());
        }
        id
    }
}

impl fmt::Display for ModuleRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())?;
        if let Some(export) = &self.export {
            write!(f, " #{export}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_request() {
        let r = ModuleRequest::parse("dashboard.evan/lib/ui.js#Button!dapp-content").unwrap();
        assert_eq!(r.address, "dashboard.evan");
        assert_eq!(r.file.as_deref(), Some("lib/ui.js"));
        assert_eq!(r.export.as_deref(), Some("Button"));
        assert_eq!(r.plugin, Some(Plugin::DappContent));
        assert_eq!(r.id(), "dashboard.evan/lib/ui.js!dapp-content");
    }

    #[test]
    fn bare_and_descriptor_requests() {
        let r = ModuleRequest::parse("angular-core").unwrap();
        assert_eq!(r, ModuleRequest {
            address: "angular-core".to_string(),
            file: None,
            export: None,
            plugin: None,
        });
        assert_eq!(ModuleRequest::parse("foo.evan!ens").unwrap(), ModuleRequest::descriptor("foo.evan"));
    }

    #[test]
    fn rejects_bad_requests() {
        assert!(ModuleRequest::parse("!ens").is_err());
        assert!(ModuleRequest::parse("foo.evan!css").is_err());
    }
}
