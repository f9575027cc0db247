//! Value types exchanged with the host: plan results, imports and metadata.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A change to a single flattened attribute (`modules.0.name`, `autoscale.#`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// Dotted attribute key.
    pub path: String,
    /// Value in prior state, `None` when the key is new.
    pub before: Option<Value>,
    /// Value in the planned state, `None` when the key goes away.
    pub after: Option<Value>,
}

impl AttributeChange {
    /// Build a change from its optional sides.
    pub fn new(path: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// A key that only exists in the planned state.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// A key that only exists in prior state.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, Some(value), None)
    }
}

/// Outcome of planning a `ghost_app`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// State the resource will have once applied.
    pub planned_state: Value,
    /// Per-key differences that survived diff suppression.
    pub changes: Vec<AttributeChange>,
    /// Whether the change needs destroy + create.
    pub requires_replace: bool,
}

impl PlanResult {
    /// Nothing to do: the planned state is the current one.
    pub fn no_change(state: Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    /// An in-place update or a create.
    pub fn with_changes(
        planned_state: Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    /// Whether applying this plan does anything.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// A resource brought under management by `import_resource`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// Always `ghost_app`.
    pub resource_type: String,
    /// Full state as read from the API.
    pub state: Value,
}

impl ImportedResource {
    /// Wrap a state read for `resource_type`.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Names of everything the provider serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Resource type names.
    pub resources: Vec<String>,
    /// Data source type names.
    pub data_sources: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_change_constructors() {
        let added = AttributeChange::added("modules.1.name", json!("worker"));
        assert!(added.before.is_none());
        assert_eq!(added.after, Some(json!("worker")));

        let removed = AttributeChange::removed("autoscale.#", json!(1));
        assert_eq!(removed.before, Some(json!(1)));
        assert!(removed.after.is_none());

        let changed = AttributeChange::new("autoscale.0.max", Some(json!(2)), Some(json!(4)));
        assert_eq!(changed.before, Some(json!(2)));
        assert_eq!(changed.after, Some(json!(4)));
    }

    #[test]
    fn test_plan_result() {
        let no_change = PlanResult::no_change(json!({"id": "5a2f"}));
        assert!(!no_change.has_changes());
        assert!(!no_change.requires_replace);

        let update = PlanResult::with_changes(
            json!({"id": "5a2f", "instance_type": "t3.small"}),
            vec![AttributeChange::new(
                "instance_type",
                Some(json!("t3.micro")),
                Some(json!("t3.small")),
            )],
            false,
        );
        assert!(update.has_changes());
        assert_eq!(update.changes[0].path, "instance_type");
    }

    #[test]
    fn test_imported_resource() {
        let imported = ImportedResource::new("ghost_app", json!({"id": "5a2f"}));
        assert_eq!(imported.resource_type, "ghost_app");
        assert_eq!(imported.state["id"], "5a2f");
    }
}
