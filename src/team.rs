//! Team directory used by the orchestrator to resolve delegates

use serde::{Deserialize, Serialize};

use crate::topic::TopicId;

/// A delegation target: the topic to publish on plus a description used
/// when composing the roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub topic: TopicId,
    pub description: String,
}

/// Ordered mapping from participant name to delegation target.
///
/// Built once at team-formation time. The roster and name-list strings
/// are derived at construction and reused across every prompt that needs
/// them.
#[derive(Debug, Clone)]
pub struct AgentTeam {
    members: Vec<(String, TeamMember)>,
    roster: String,
    names: String,
}

impl AgentTeam {
    pub fn new(members: Vec<(String, TeamMember)>) -> Self {
        let roster = members
            .iter()
            .map(|(name, member)| format!("{name}: {}", member.description))
            .collect::<Vec<_>>()
            .join("\n");
        let names = members
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            members,
            roster,
            names,
        }
    }

    /// Resolve a participant by name.
    ///
    /// Lookup is case-sensitive exact match on the name used at
    /// team-formation time; no trimming or fuzzy matching.
    pub fn get(&self, name: &str) -> Option<&TeamMember> {
        self.members
            .iter()
            .find(|(member_name, _)| member_name == name)
            .map(|(_, member)| member)
    }

    /// "name: description" per line, in formation order.
    pub fn roster(&self) -> &str {
        &self.roster
    }

    /// Comma-separated participant names, in formation order.
    pub fn names(&self) -> &str {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Iterate members in formation order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TeamMember)> {
        self.members
            .iter()
            .map(|(name, member)| (name.as_str(), member))
    }
}
