//! The built-in persona catalog.

use serde::Serialize;

/// An immutable persona definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleCard {
    /// Stable unique key (e.g. `socrates`).
    pub id: String,
    /// Display name.
    pub title: String,
    /// One-line description shown next to the title.
    pub remark: String,
    /// System prompt sent verbatim to the model.
    #[serde(rename = "systemPrompt")]
    pub system_prompt: String,
    /// Search tags, in declaration order.
    pub tags: Vec<String>,
}

impl RoleCard {
    fn new(id: &str, title: &str, remark: &str, system_prompt: &str, tags: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            remark: remark.to_string(),
            system_prompt: system_prompt.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Returns `true` if the title, remark, or any tag contains `needle`.
    ///
    /// `needle` must already be lowercased.
    fn matches(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.remark.to_lowercase().contains(needle)
            || self.tags.iter().any(|t| t.to_lowercase().contains(needle))
    }
}

/// Client-facing view of a [`RoleCard`], without the system prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleSummary {
    pub id: String,
    pub title: String,
    pub remark: String,
    pub tags: Vec<String>,
}

impl From<&RoleCard> for RoleSummary {
    fn from(card: &RoleCard) -> Self {
        Self {
            id: card.id.clone(),
            title: card.title.clone(),
            remark: card.remark.clone(),
            tags: card.tags.clone(),
        }
    }
}

/// Fixed, ordered list of personas.
///
/// Built once at startup and never mutated afterwards, so it can be shared
/// across request handlers behind an `Arc` without locking.
#[derive(Debug, Clone)]
pub struct RoleCatalog {
    roles: Vec<RoleCard>,
}

impl RoleCatalog {
    /// Creates a catalog from an explicit list of cards.
    pub fn new(roles: Vec<RoleCard>) -> Self {
        Self { roles }
    }

    /// Creates the catalog of built-in personas.
    pub fn builtin() -> Self {
        Self::new(vec![
            RoleCard::new(
                "socrates",
                "Socrates",
                "Guides your thinking through Socratic questioning",
                "You are Socrates. Through patient, persistent questioning you help the user \
                 clarify concepts, test assumptions, and follow ideas to their consequences. \
                 Your tone is gentle and concise. Avoid handing out conclusions; prefer asking \
                 one good question over giving one quick answer.",
                &["philosophy", "inquiry", "questioning"],
            ),
            RoleCard::new(
                "harry_potter",
                "Harry Potter",
                "Immersive role-play set in the wizarding world of Hogwarts",
                "You are Harry Potter and you stay within the world J.K. Rowling created. Speak \
                 in the first person and do not reach for real-world knowledge Harry would not \
                 have. When a detail of the setting is uncertain, say so and stay in character.",
                &["magic", "immersive", "storytelling"],
            ),
            RoleCard::new(
                "english_tutor",
                "English Speaking Tutor",
                "Corrects, encourages, and sums up the key points",
                "You are a friendly English speaking tutor. Lightly correct the user's English \
                 and offer more natural alternatives. Finish with a short recap of the key \
                 points and a suggested next step.",
                &["language learning", "correction", "summary"],
            ),
        ])
    }

    /// Returns the cards matching `keyword`.
    ///
    /// A blank keyword returns every card. Otherwise a card matches when its
    /// title, remark, or one of its tags contains the keyword, ignoring case.
    /// Declaration order is preserved in both cases.
    pub fn search(&self, keyword: &str) -> Vec<&RoleCard> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return self.roles.iter().collect();
        }

        let needle = keyword.to_lowercase();
        self.roles.iter().filter(|r| r.matches(&needle)).collect()
    }

    /// Looks up a card by its exact, case-sensitive id.
    pub fn get(&self, id: &str) -> Option<&RoleCard> {
        self.roles.iter().find(|r| r.id == id)
    }

    /// Returns every card in declaration order.
    pub fn all(&self) -> &[RoleCard] {
        &self.roles
    }
}

impl Default for RoleCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
