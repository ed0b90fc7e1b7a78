#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Integration tests for the tool registry: built-in catalog, resolution, and
//! concurrent read access.

use crewmaster_core::{CapabilityTag, CrewmasterError};
use crewmaster_tools::{register_builtins, ToolRegistry};
use std::collections::BTreeSet;
use std::sync::Arc;

fn builtin_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    register_builtins(&mut registry).unwrap();
    registry
}

#[test]
fn resolution_is_reproducible() {
    let registry = builtin_registry();
    let wanted: BTreeSet<CapabilityTag> = ["file_operations", "web_search", "code_execution"]
        .into_iter()
        .map(CapabilityTag::from)
        .collect();

    let first = registry.order(&wanted).unwrap();
    let second = registry.order(&wanted).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        first,
        vec![
            CapabilityTag::from("web_search"),
            CapabilityTag::from("file_operations"),
            CapabilityTag::from("code_execution"),
        ]
    );
}

#[test]
fn unknown_capability_is_reported() {
    let registry = builtin_registry();
    let wanted: BTreeSet<CapabilityTag> = [CapabilityTag::from("teleportation")].into();
    match registry.resolve(&wanted) {
        Err(CrewmasterError::UnknownCapability(tag)) => assert_eq!(tag, "teleportation"),
        other => panic!("expected UnknownCapability, got {other:?}"),
    }
}

#[tokio::test]
async fn handles_instantiate_tools() {
    let registry = builtin_registry();
    let handles = registry.resolve(&[CapabilityTag::from("vision")]).unwrap();
    assert_eq!(handles.len(), 1);
    assert_eq!(handles[0].descriptor().category, "media");

    let tool = handles[0].instantiate().unwrap();
    assert_eq!(tool.name(), "vision");
    let out = tool.invoke("describe this chart").await.unwrap();
    assert!(out.contains("describe this chart"));
}

#[tokio::test]
async fn concurrent_resolution_is_safe() {
    let registry = Arc::new(builtin_registry());
    let mut handles = Vec::new();
    for _ in 0..16 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            let wanted = [CapabilityTag::from("api_calls"), CapabilityTag::from("web_search")];
            (registry.order(&wanted).unwrap(), registry.categories().len())
        }));
    }
    for handle in handles {
        let (order, categories) = handle.await.unwrap();
        assert_eq!(order[0].as_str(), "web_search");
        assert_eq!(categories, registry.categories().len());
    }
}
