//! `#[derive(Upsertable)]` expansion behavior.

use std::cmp::Ordering;

use serde::Serialize;
use serde_json::json;
use storeflow::{Identifiable, Identity, Upsertable};

#[derive(Debug, Serialize, Upsertable)]
struct Plain {
    id: u32,
    name: String,
}

#[derive(Debug, Serialize, Upsertable)]
struct Keyed {
    #[upsertable(key)]
    email: String,
    #[upsertable(order)]
    seen_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    nickname: Option<String>,
}

#[derive(Debug, Serialize, Upsertable)]
struct Draft {
    id: Option<String>,
    body: String,
}

#[test]
fn defaults_to_the_id_field() {
    let item = Plain {
        id: 7,
        name: "ada".into(),
    };
    assert_eq!(item.primary_key(), "id");
    assert_eq!(item.primary_value(), Some("7".into()));
    assert_eq!(item.identity(), Identity::new("id", "7"));
    assert_eq!(item.ordering_value(), None);
}

#[test]
fn update_dictionary_is_the_serialized_struct() {
    let item = Keyed {
        email: "ada@example.com".into(),
        seen_at: 10,
        nickname: None,
    };
    let update = item.update_dictionary();

    assert_eq!(item.primary_key(), "email");
    assert_eq!(update.get("email"), Some(&json!("ada@example.com")));
    assert_eq!(update.get("seen_at"), Some(&json!(10)));
    assert!(!update.contains_key("nickname"));
}

#[test]
fn order_field_drives_comparison() {
    let early = Keyed {
        email: "a@example.com".into(),
        seen_at: 1,
        nickname: None,
    };
    let late = Keyed {
        email: "b@example.com".into(),
        seen_at: 2,
        nickname: Some("bee".into()),
    };
    assert_eq!(early.ordering_value(), Some(json!(1)));
    assert_eq!(early.compare(&late), Ordering::Less);
}

#[test]
fn optional_key_without_value_has_no_identity_value() {
    let draft = Draft {
        id: None,
        body: "wip".into(),
    };
    assert_eq!(draft.primary_value(), None);

    let saved = Draft {
        id: Some("d-1".into()),
        body: "done".into(),
    };
    assert_eq!(saved.primary_value(), Some("d-1".into()));
}
