//! Prompt templates for the manager's synthesis steps
//!
//! The wording here is intentionally minimal; embedding applications are
//! expected to tune it. The orchestrator only depends on the parameter
//! sets, never on the text.

/// Survey the task before planning.
pub fn new_facts(task: &str) -> String {
    format!(
        "Below is a request we are going to address:\n\n{task}\n\n\
         Before planning, compile a fact sheet with these sections:\n\
         1. GIVEN FACTS: facts stated in the request itself\n\
         2. FACTS TO LOOK UP: facts that must be researched\n\
         3. FACTS TO DERIVE: facts to compute or infer\n\
         4. EDUCATED GUESSES: recalled or estimated values\n\n\
         Respond with the fact sheet only."
    )
}

/// Take a fresh look at the task after a reset.
pub fn update_facts(task: &str, facts: &str) -> String {
    format!(
        "We are addressing this request:\n\n{task}\n\n\
         The previous attempt did not finish. Here is the old fact sheet:\n\n\
         {facts}\n\n\
         Rewrite the fact sheet in the same four sections, folding in \
         anything learned from the conversation so far. Move guesses that \
         proved wrong out, and promote anything verified."
    )
}

/// Derive a plan from the roster.
pub fn new_plan(team: &str) -> String {
    format!(
        "The following team members are available:\n\n{team}\n\n\
         Propose a concise bullet-point plan for addressing the request \
         using only these team members. Respond with the plan only."
    )
}

/// Seed the shared transcript for a new attempt.
pub fn ledger(task: &str, team: &str, facts: &str, plan: &str) -> String {
    format!(
        "We are working to address the following request:\n\n{task}\n\n\
         The team consists of:\n\n{team}\n\n\
         Known and suspected facts:\n\n{facts}\n\n\
         The current plan:\n\n{plan}"
    )
}

/// Evaluate status and choose the next speaker.
pub fn status(task: &str, team: &str, names: &str, facts: &str) -> String {
    format!(
        "Evaluate our progress on the request:\n\n{task}\n\n\
         Team:\n\n{team}\n\n\
         Facts:\n\n{facts}\n\n\
         Decide whether the request is fully satisfied, whether we are \
         making forward progress, and whether we are repeating ourselves. \
         Then select who should speak next from: {names}. Never select \
         the manager. Provide an instruction for the selected speaker, \
         phrased in the second person.\n\
         Respond with JSON conforming to the provided schema."
    )
}

/// Compose the final answer from the transcript.
pub fn answer(task: &str) -> String {
    format!(
        "The request below has been addressed by the conversation above:\n\n\
         {task}\n\n\
         Compose the complete final answer to present to the user. Do not \
         mention the team or the process."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_embed_their_parameters() {
        assert!(new_facts("build a parser").contains("build a parser"));
        assert!(new_plan("coder: Writes code.").contains("coder: Writes code."));
        assert!(update_facts("task", "old facts").contains("old facts"));
        assert!(status("task", "team", "coder, writer", "facts").contains("coder, writer"));

        let seeded = ledger("task", "team", "facts", "plan");
        for part in ["task", "team", "facts", "plan"] {
            assert!(seeded.contains(part));
        }
    }
}
