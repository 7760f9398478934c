//! Evaluation context handed to policies.

use custos_core::{AttributeBundle, Resource};

use crate::registry::PolicyRegistry;

/// Maximum nesting of composite policies.
pub(crate) const MAX_DEPTH: usize = 16;

/// Everything a policy may look at.
///
/// Contexts are cheap to copy; composite policies derive a nested context
/// for each member.
#[derive(Clone, Copy)]
pub struct PolicyContext<'a> {
    /// The user's roles and attributes.
    pub bundle: &'a AttributeBundle,
    /// The object acted on, if any.
    pub target: Option<&'a dyn Resource>,
    /// The requested action.
    pub action: &'a str,
    registry: Option<&'a PolicyRegistry>,
    depth: usize,
}

impl<'a> PolicyContext<'a> {
    /// Creates a context.
    pub fn new(bundle: &'a AttributeBundle, target: Option<&'a dyn Resource>, action: &'a str) -> Self {
        Self {
            bundle,
            target,
            action,
            registry: None,
            depth: 0,
        }
    }

    /// Attaches the registry composite policies resolve members from.
    pub fn with_registry(mut self, registry: &'a PolicyRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// The registry, if attached.
    pub fn registry(&self) -> Option<&'a PolicyRegistry> {
        self.registry
    }

    /// Nesting depth of this context.
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Id of the requesting user.
    pub fn user_id(&self) -> &'a str {
        self.bundle.user_id.as_str()
    }

    pub(crate) fn nested(&self) -> Self {
        Self {
            depth: self.depth + 1,
            ..*self
        }
    }
}

impl std::fmt::Debug for PolicyContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyContext")
            .field("user_id", &self.bundle.user_id)
            .field("service", &self.bundle.service)
            .field("target", &self.target.map(|target| target.entity_type()))
            .field("action", &self.action)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}
