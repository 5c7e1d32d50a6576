//! Processor actions and the command table that selects them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{OperariusError, Result};

/// One of the capabilities a [`TaskProcessor`](super::TaskProcessor) may implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Create,
    Update,
    Delete,
    Describe,
    #[serde(rename = "drift")]
    DetectDrift,
    Rollback,
}

impl Action {
    /// Every action, in declaration order.
    pub const ALL: [Action; 6] = [
        Action::Create,
        Action::Update,
        Action::Delete,
        Action::Describe,
        Action::DetectDrift,
        Action::Rollback,
    ];

    /// Whether the action changes external state and may be rolled back.
    pub fn is_mutating(&self) -> bool {
        matches!(self, Action::Create | Action::Update | Action::Delete)
    }

    /// Name used in configuration and as the built-in command.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Describe => "describe",
            Action::DetectDrift => "drift",
            Action::Rollback => "rollback",
        }
    }

    /// Prefix for processing event labels, e.g. `CREATE_ACTION`.
    pub fn event_prefix(&self) -> &'static str {
        match self {
            Action::Create => "CREATE_ACTION",
            Action::Update => "UPDATE_ACTION",
            Action::Delete => "DELETE_ACTION",
            Action::Describe => "DESCRIBE_ACTION",
            Action::DetectDrift => "DETECT_DRIFT_ACTION",
            Action::Rollback => "ROLLBACK_ACTION",
        }
    }

    /// Parse an action name.
    pub fn from_name(name: &str) -> Option<Action> {
        Action::ALL.into_iter().find(|a| a.name() == name)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Maps run commands to processor actions.
///
/// The default table links each action's own name (`create`, `update`,
/// `delete`, `describe`, `drift`, `rollback`). Further commands are
/// aliases linked to one of those actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTable {
    links: BTreeMap<String, Action>,
}

impl Default for CommandTable {
    fn default() -> Self {
        let links = Action::ALL
            .into_iter()
            .map(|a| (a.name().to_string(), a))
            .collect();
        Self { links }
    }
}

impl CommandTable {
    /// Create a table with the built-in links.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table with no links at all.
    pub fn empty() -> Self {
        Self {
            links: BTreeMap::new(),
        }
    }

    /// Link a command to an action, replacing any previous link.
    pub fn link(&mut self, command: impl Into<String>, action: Action) -> &mut Self {
        self.links.insert(command.into(), action);
        self
    }

    /// Builder-style [`link`](Self::link).
    pub fn with_link(mut self, command: impl Into<String>, action: Action) -> Self {
        self.link(command, action);
        self
    }

    /// Look up the action for a command.
    pub fn action_for(&self, command: &str) -> Result<Action> {
        self.links
            .get(command)
            .copied()
            .ok_or_else(|| OperariusError::UnknownCommand {
                command: command.to_string(),
                known: self.links.keys().cloned().collect(),
            })
    }

    /// All linked commands, ascending.
    pub fn commands(&self) -> impl Iterator<Item = (&str, Action)> {
        self.links.iter().map(|(c, a)| (c.as_str(), *a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_links_action_names() {
        let table = CommandTable::new();
        for action in Action::ALL {
            assert_eq!(table.action_for(action.name()).unwrap(), action);
        }
    }

    #[test]
    fn custom_command_links_to_action() {
        let table = CommandTable::new()
            .with_link("apply", Action::Create)
            .with_link("destroy", Action::Delete);
        assert_eq!(table.action_for("apply").unwrap(), Action::Create);
        assert_eq!(table.action_for("destroy").unwrap(), Action::Delete);
    }

    #[test]
    fn relinking_replaces_previous_action() {
        let mut table = CommandTable::new();
        table.link("create", Action::Update);
        assert_eq!(table.action_for("create").unwrap(), Action::Update);
    }

    #[test]
    fn unknown_command_is_an_error() {
        let table = CommandTable::empty().with_link("apply", Action::Create);
        match table.action_for("deploy") {
            Err(OperariusError::UnknownCommand { command, known }) => {
                assert_eq!(command, "deploy");
                assert_eq!(known, vec!["apply"]);
            }
            other => panic!("expected UnknownCommand, got {:?}", other),
        }
    }

    #[test]
    fn only_create_update_delete_are_mutating() {
        let mutating: Vec<_> = Action::ALL.into_iter().filter(Action::is_mutating).collect();
        assert_eq!(mutating, vec![Action::Create, Action::Update, Action::Delete]);
    }

    #[test]
    fn action_names_round_trip() {
        for action in Action::ALL {
            assert_eq!(Action::from_name(action.name()), Some(action));
        }
        assert_eq!(Action::from_name("detect-drift"), None);
    }

    #[test]
    fn serde_uses_action_names() {
        let action: Action = serde_yaml::from_str("drift").unwrap();
        assert_eq!(action, Action::DetectDrift);
        let yaml = serde_yaml::to_string(&Action::Rollback).unwrap();
        assert_eq!(yaml.trim(), "rollback");
    }
}
