//! System-prompt composition.

use crate::catalog::RoleCard;

const WORLDVIEW: &str = "Maintain the persona's worldview and speaking style; never venture into \
                         domains the persona would not know.";
const SOCRATIC_QUESTIONS: &str =
    "Lead with questions that clarify concepts, probe evidence, and compare alternatives.";
const SOCRATIC_LIMIT: &str = "Ask at most 2-3 key questions per turn.";
const SUMMARY: &str =
    "Append a bullet summary of at most 3 key points at the end of the reply.";
const OPENING: &str =
    "Open with a short empathetic or encouraging phrase matched to the user's tone.";

/// The composed prompt for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptBuild {
    /// The persona's system prompt, verbatim.
    pub system_message: String,
    /// Behavioral guidelines, in the order they should be presented.
    pub guidelines: Vec<String>,
}

/// Builds [`PromptBuild`]s from a persona and a user utterance.
///
/// Role-specific rules are keyed by role id. Supporting a new persona-specific
/// guideline means adding one more arm to [`PromptComposer::role_guidelines`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptComposer;

impl PromptComposer {
    /// Composes the prompt for `role`.
    ///
    /// The result depends only on the inputs. `_user_text` is accepted so
    /// that tone-dependent rules can be added without changing callers.
    pub fn build(&self, role: &RoleCard, _user_text: &str) -> PromptBuild {
        let mut guidelines = vec![WORLDVIEW.to_string()];
        guidelines.extend(Self::role_guidelines(&role.id).iter().map(|g| g.to_string()));
        guidelines.push(SUMMARY.to_string());
        guidelines.push(OPENING.to_string());

        PromptBuild {
            system_message: role.system_prompt.clone(),
            guidelines,
        }
    }

    fn role_guidelines(role_id: &str) -> &'static [&'static str] {
        match role_id {
            "socrates" => &[SOCRATIC_QUESTIONS, SOCRATIC_LIMIT],
            _ => &[],
        }
    }
}
