//! The identity of whoever typed a command. The core treats it as opaque: it
//! only asks for a name (used as the suggestion-cache session key) and hands
//! it to permission predicates.
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

pub trait Issuer: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Whether the issuer holds the permission `node`. Defaults to `true`.
    fn has_permission(&self, node: &str) -> bool {
        let _ = node;
        true
    }
}

/// The host application's own console. Holds every permission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsoleIssuer;

impl Issuer for ConsoleIssuer {
    fn name(&self) -> &str {
        "console"
    }
}

/// A named issuer with an explicit set of permission nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimpleIssuer {
    name: String,
    permissions: BTreeSet<String>,
}

impl SimpleIssuer {
    pub fn new(name: &str) -> SimpleIssuer {
        SimpleIssuer {
            name: name.to_owned(),
            permissions: BTreeSet::new(),
        }
    }

    pub fn with_permission(mut self, node: &str) -> SimpleIssuer {
        self.permissions.insert(node.to_owned());
        self
    }
}

impl Issuer for SimpleIssuer {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_permission(&self, node: &str) -> bool {
        self.permissions.contains(node)
    }
}

/// A boolean predicate deciding whether an issuer may use a command.
pub type Permission = Arc<dyn Fn(&dyn Issuer) -> bool + Send + Sync>;

pub mod permissions {
    use super::*;

    /// Allows issuers holding the permission `node`.
    pub fn node(node: &str) -> Permission {
        let node = node.to_owned();
        Arc::new(move |issuer: &dyn Issuer| issuer.has_permission(&node))
    }

    /// Allows only the host console.
    pub fn console_only() -> Permission {
        Arc::new(|issuer: &dyn Issuer| issuer.name() == ConsoleIssuer.name())
    }
}
