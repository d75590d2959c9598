//! Tools the assistant can call.
//!
//! Two families are registered: the store actions in [`actions`], which
//! read and mutate a user's tasks, routines, memory and goal; and the
//! configured lookups in [`lookup`], which answer questions from an
//! external service.

pub mod actions;
pub mod args;
pub mod lookup;

use remindly_config::LookupConfig;
use remindly_core::cadence::CadencePolicy;
use remindly_core::store::Store;
use remindly_core::tool::ToolRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

pub use actions::{Action, ActionName, ActionTool};
pub use lookup::{HttpLookup, LookupBackend, LookupTool};

/// Register every store action against `store`.
pub fn register_actions(registry: &mut ToolRegistry, store: Arc<dyn Store>, cadence: CadencePolicy) {
    for action in ActionName::ALL {
        registry.register(Box::new(ActionTool::new(action, store.clone(), cadence)));
    }
}

/// Register one HTTP lookup per `[lookups.<name>]` section.
///
/// A lookup named like a tool that is already registered (a store action,
/// for instance) is skipped, never swapped in.
pub fn register_lookups(registry: &mut ToolRegistry, lookups: &HashMap<String, LookupConfig>) {
    for (name, config) in lookups {
        if registry.get(name).is_some() {
            warn!(tool = %name, "Lookup name is already taken by another tool, skipped");
            continue;
        }
        registry.register(Box::new(LookupTool::from_config(name, config)));
    }
}

/// A registry with all store actions and no lookups.
pub fn default_registry(store: Arc<dyn Store>, cadence: CadencePolicy) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    register_actions(&mut registry, store, cadence);
    registry
}
