//! Unit tests for the persona catalog and prompt composer.

use crate::{PromptComposer, RoleCard, RoleCatalog, RoleSummary};

fn ids(cards: &[&RoleCard]) -> Vec<String> {
    cards.iter().map(|c| c.id.clone()).collect()
}

// ── RoleCatalog ─────────────────────────────────────────────────────

#[test]
fn blank_search_returns_all_roles_in_declaration_order() {
    let catalog = RoleCatalog::builtin();

    let expected = vec!["socrates", "harry_potter", "english_tutor"];
    assert_eq!(ids(&catalog.search("")), expected);
    assert_eq!(ids(&catalog.search("   ")), expected);
}

#[test]
fn search_is_case_insensitive_on_tags() {
    let catalog = RoleCatalog::builtin();

    assert_eq!(ids(&catalog.search("PHILOS")), vec!["socrates"]);
    assert_eq!(ids(&catalog.search("Magic")), vec!["harry_potter"]);
}

#[test]
fn search_matches_title_and_remark() {
    let catalog = RoleCatalog::builtin();

    assert_eq!(ids(&catalog.search("tutor")), vec!["english_tutor"]);
    assert_eq!(ids(&catalog.search("hogwarts")), vec!["harry_potter"]);
}

#[test]
fn search_preserves_order_for_multiple_matches() {
    let catalog = RoleCatalog::builtin();

    // "summary" is a tag of english_tutor; "s" hits every card.
    let all = catalog.search("s");
    assert_eq!(ids(&all), vec!["socrates", "harry_potter", "english_tutor"]);
}

#[test]
fn search_without_match_is_empty() {
    let catalog = RoleCatalog::builtin();
    assert!(catalog.search("quantum chromodynamics").is_empty());
}

#[test]
fn search_handles_non_ascii_text() {
    let catalog = RoleCatalog::new(vec![RoleCard {
        id: "sage".to_string(),
        title: "Sage".to_string(),
        remark: "Ünicode remark".to_string(),
        system_prompt: String::new(),
        tags: vec!["哲学".to_string()],
    }]);

    assert_eq!(ids(&catalog.search("哲学")), vec!["sage"]);
    assert_eq!(ids(&catalog.search("ünicode")), vec!["sage"]);
}

#[test]
fn get_is_exact_and_case_sensitive() {
    let catalog = RoleCatalog::builtin();

    assert_eq!(catalog.get("socrates").map(|r| r.title.as_str()), Some("Socrates"));
    assert!(catalog.get("Socrates").is_none());
    assert!(catalog.get("socra").is_none());
    assert!(catalog.get("").is_none());
}

#[test]
fn builtin_ids_are_unique() {
    let catalog = RoleCatalog::builtin();
    let mut seen = std::collections::HashSet::new();
    for card in catalog.all() {
        assert!(seen.insert(card.id.clone()), "duplicate id {}", card.id);
    }
}

#[test]
fn summary_omits_system_prompt() {
    let catalog = RoleCatalog::builtin();
    let summary = RoleSummary::from(catalog.get("socrates").unwrap());

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["id"], "socrates");
    assert!(json.get("systemPrompt").is_none());
    assert_eq!(json["tags"][0], "philosophy");
}

// ── PromptComposer ──────────────────────────────────────────────────

#[test]
fn socrates_gets_socratic_guidelines_in_fixed_order() {
    let catalog = RoleCatalog::builtin();
    let role = catalog.get("socrates").unwrap();

    let prompt = PromptComposer.build(role, "Is virtue teachable?");

    assert_eq!(prompt.system_message, role.system_prompt);
    assert_eq!(prompt.guidelines.len(), 5);
    assert!(prompt.guidelines[0].contains("worldview"));
    assert!(prompt.guidelines[1].contains("clarify concepts"));
    assert!(prompt.guidelines[2].contains("2-3 key questions"));
    assert!(prompt.guidelines[3].contains("bullet summary"));
    assert!(prompt.guidelines[4].contains("empathetic or encouraging"));
}

#[test]
fn other_roles_get_only_universal_guidelines() {
    let catalog = RoleCatalog::builtin();
    let role = catalog.get("harry_potter").unwrap();

    let prompt = PromptComposer.build(role, "Tell me about Quidditch");

    assert_eq!(prompt.guidelines.len(), 3);
    assert!(prompt.guidelines[0].contains("worldview"));
    assert!(prompt.guidelines[1].contains("bullet summary"));
    assert!(prompt.guidelines[2].contains("empathetic or encouraging"));
}

#[test]
fn build_is_deterministic() {
    let catalog = RoleCatalog::builtin();
    let role = catalog.get("english_tutor").unwrap();

    let a = PromptComposer.build(role, "hello");
    let b = PromptComposer.build(role, "hello");
    assert_eq!(a, b);
}

#[test]
fn socratic_branch_keys_on_id_not_title() {
    let impostor = RoleCard {
        id: "not_socrates".to_string(),
        title: "Socrates".to_string(),
        remark: String::new(),
        system_prompt: "prompt".to_string(),
        tags: vec![],
    };

    let prompt = PromptComposer.build(&impostor, "hi");
    assert_eq!(prompt.guidelines.len(), 3);
}
