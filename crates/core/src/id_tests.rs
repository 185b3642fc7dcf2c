// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

crate::define_id! {
    pub struct TestId("tst_");
}

#[test]
fn new_ids_are_unique() {
    assert_ne!(TestId::new(), TestId::new());
}

#[test]
fn display_includes_prefix() {
    let id = TestId::new();
    assert!(id.to_string().starts_with("tst_"));
}

#[test]
fn roundtrips_through_uuid() {
    let id = TestId::new();
    let raw: uuid::Uuid = id.into();
    assert_eq!(TestId::from_uuid(raw), id);
}

#[test]
fn serializes_as_bare_uuid() {
    let id = TestId::new();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{}\"", id.as_uuid()));
}
