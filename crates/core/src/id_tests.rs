// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn pool_id_has_prefix_and_fixed_length() {
    let id = PoolId::new();
    assert!(id.as_str().starts_with("pool-"));
    assert_eq!(id.as_str().len(), "pool-".len() + 16);
}

#[test]
fn container_id_generate_sorts_by_time() {
    let a = ContainerId::generate(1_000);
    let b = ContainerId::generate(2_000);
    assert!(a.as_str().starts_with("ctr-"));
    assert!(a.as_str() < b.as_str());
}

#[test]
fn container_id_generate_is_unique() {
    let a = ContainerId::generate(5_000);
    let b = ContainerId::generate(5_000);
    assert_ne!(a, b);
}

#[test]
fn ids_roundtrip_through_strings() {
    let id = ContainerId::generate(42);
    assert_eq!(ContainerId::from_string(id.as_str()), id);
}

#[test]
fn id_equality_against_str() {
    let id = PoolId::from_string("pool-abc");
    assert_eq!(id, "pool-abc");
    assert_ne!(id, "pool-xyz");
}

#[test]
fn equal_ids_hash_alike() {
    use std::collections::HashMap;
    let mut map: HashMap<ContainerId, u32> = HashMap::new();
    map.insert(ContainerId::from_string("ctr-k"), 7);
    assert_eq!(map.get(&ContainerId::from_string("ctr-k")), Some(&7));
}

#[test]
fn oversized_input_is_cut_at_capacity() {
    let long = "p".repeat(ID_CAPACITY + 10);
    let id = PoolId::from_string(&long);
    assert_eq!(id.as_str().len(), ID_CAPACITY);
    assert_eq!(id.as_str(), &long[..ID_CAPACITY]);
}

#[test]
fn multibyte_input_keeps_whole_chars() {
    // 16 two-byte chars fill the buffer exactly; one more must not
    // leave a torn char behind.
    let input = "é".repeat(ID_CAPACITY / 2 + 1);
    let id = PoolId::from_string(&input);
    assert_eq!(id.as_str(), "é".repeat(ID_CAPACITY / 2));
}

#[test]
fn debug_shows_type_and_value() {
    let id = PoolId::from_string("pool-dbg");
    assert_eq!(format!("{id:?}"), "PoolId(\"pool-dbg\")");
}

#[test]
fn serde_is_transparent() {
    let id = PoolId::from_string("pool-serde");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"pool-serde\"");
    let back: PoolId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn serde_rejects_oversized() {
    let long = format!("\"{}\"", "x".repeat(ID_CAPACITY + 1));
    assert!(serde_json::from_str::<PoolId>(&long).is_err());
}

#[test]
fn tenant_id_is_freeform() {
    let t = TenantId::new("user@example.com/session-1");
    assert_eq!(t.as_str(), "user@example.com/session-1");
    assert_eq!(t, "user@example.com/session-1");
    assert_eq!(t.to_string(), "user@example.com/session-1");
}
