//! Dependency validator behaviour through the engine

mod common;

use atlas::api::request::DependencySpec;
use atlas::model::DependencyKind;

use common::{engine, project, task_spec};

fn edge(source: &str, target: &str) -> DependencySpec {
    DependencySpec {
        source: source.to_string(),
        target: target.to_string(),
        kind: DependencyKind::Requires,
        description: None,
    }
}

#[test]
fn cycle_rejected_and_no_edge_added() {
    let (engine, _root) = engine();
    project(&engine, "proj");
    engine
        .create_tasks(&[task_spec("proj/a", &[]), task_spec("proj/b", &[])])
        .unwrap();

    engine.add_dependency(&edge("proj/a", "proj/b")).unwrap();
    let err = engine.add_dependency(&edge("proj/b", "proj/a")).unwrap_err();
    assert_eq!(err.code.as_str(), "CIRCULAR_DEPENDENCY");

    let (outgoing, _) = engine.list_dependencies("proj/b").unwrap();
    assert!(outgoing.is_empty());
    // The original edge survives untouched
    let (outgoing, _) = engine.list_dependencies("proj/a").unwrap();
    assert_eq!(outgoing.len(), 1);
}

#[test]
fn transitive_cycle_rejected() {
    let (engine, _root) = engine();
    project(&engine, "proj");
    engine
        .create_tasks(&[
            task_spec("proj/a", &[]),
            task_spec("proj/b", &[]),
            task_spec("proj/c", &[]),
        ])
        .unwrap();
    engine.add_dependency(&edge("proj/a", "proj/b")).unwrap();
    engine.add_dependency(&edge("proj/b", "proj/c")).unwrap();
    let err = engine.add_dependency(&edge("proj/c", "proj/a")).unwrap_err();
    assert_eq!(err.code.as_str(), "CIRCULAR_DEPENDENCY");
}

#[test]
fn missing_target_rejected() {
    let (engine, _root) = engine();
    project(&engine, "proj");
    engine.create_tasks(&[task_spec("proj/a", &[])]).unwrap();
    let err = engine
        .add_dependency(&edge("proj/a", "proj/ghost"))
        .unwrap_err();
    assert_eq!(err.code.as_str(), "INVALID_REFERENCE");
}

#[test]
fn edge_kinds_are_preserved() {
    let (engine, _root) = engine();
    project(&engine, "proj");
    engine
        .create_tasks(&[task_spec("proj/a", &[]), task_spec("proj/b", &[])])
        .unwrap();
    let mut spec = edge("proj/b", "proj/a");
    spec.kind = DependencyKind::Implements;
    spec.description = Some("fulfils the interface".to_string());
    engine.add_dependency(&spec).unwrap();

    let (outgoing, _) = engine.list_dependencies("proj/b").unwrap();
    assert_eq!(outgoing[0].kind, DependencyKind::Implements);
    assert_eq!(
        outgoing[0].description.as_deref(),
        Some("fulfils the interface")
    );
    // Inbound view from the target side
    let (_, inbound) = engine.list_dependencies("proj/a").unwrap();
    assert_eq!(inbound, vec!["proj/b"]);
}

#[test]
fn remove_edge_clears_both_directions() {
    let (engine, _root) = engine();
    project(&engine, "proj");
    engine
        .create_tasks(&[task_spec("proj/a", &[]), task_spec("proj/b", &[])])
        .unwrap();
    engine.add_dependency(&edge("proj/b", "proj/a")).unwrap();
    engine.remove_dependency("proj/b", "proj/a").unwrap();

    let (outgoing, _) = engine.list_dependencies("proj/b").unwrap();
    assert!(outgoing.is_empty());
    let (_, inbound) = engine.list_dependencies("proj/a").unwrap();
    assert!(inbound.is_empty());
    // The task body agrees with the index
    let task = engine.get_task("proj/b").unwrap().unwrap();
    assert!(task.dependencies.is_empty());
}

#[test]
fn duplicate_edge_rejected() {
    let (engine, _root) = engine();
    project(&engine, "proj");
    engine
        .create_tasks(&[task_spec("proj/a", &[]), task_spec("proj/b", &[])])
        .unwrap();
    engine.add_dependency(&edge("proj/b", "proj/a")).unwrap();
    let err = engine.add_dependency(&edge("proj/b", "proj/a")).unwrap_err();
    assert_eq!(err.code.as_str(), "DUPLICATE");
}
