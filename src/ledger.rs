//! Structured ledger evaluation produced by the manager each iteration

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::completion::ResponseSchema;

/// One boolean judgment with the model's reasoning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// The result for the property being evaluated.
    pub result: bool,
    /// The reason for the result.
    pub reason: String,
}

/// The manager's structured self-assessment for one iteration.
///
/// Produced fresh every iteration from a schema-constrained completion
/// call; never mutated, only replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerStatus {
    /// The name of who is selected to respond.
    pub name: String,
    /// Direction to the selected responder, phrased in the second person.
    pub instruction: String,
    /// The reason for selecting the agent and its instruction.
    pub reason: String,
    /// Is the task completed?
    pub is_task_complete: LedgerEntry,
    /// Is the task making progress, but not complete?
    pub is_task_progressing: LedgerEntry,
    /// Is the task stuck in a loop?
    pub is_task_in_loop: LedgerEntry,
}

impl LedgerStatus {
    /// The response schema constraining ledger evaluations.
    pub fn schema() -> ResponseSchema {
        let entry = |description: &str| {
            json!({
                "type": "object",
                "description": description,
                "properties": {
                    "result": { "type": "boolean" },
                    "reason": { "type": "string" }
                },
                "required": ["result", "reason"],
                "additionalProperties": false
            })
        };

        ResponseSchema {
            name: "ledger_status",
            schema: json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "The name of who is selected to respond."
                    },
                    "instruction": {
                        "type": "string",
                        "description": "Direction to the selected responder, phrased in the 2nd person."
                    },
                    "reason": {
                        "type": "string",
                        "description": "The reason for selecting the agent and its instruction."
                    },
                    "is_task_complete": entry("Is the task completed?"),
                    "is_task_progressing": entry("Is the task making progress, but not complete?"),
                    "is_task_in_loop": entry("Is the task stuck in a loop?")
                },
                "required": [
                    "name",
                    "instruction",
                    "reason",
                    "is_task_complete",
                    "is_task_progressing",
                    "is_task_in_loop"
                ],
                "additionalProperties": false
            }),
        }
    }
}
