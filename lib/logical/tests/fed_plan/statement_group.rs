use crate::test_utils::{iri, statement};
use rdf_federation_common::FederationResult;
use rdf_federation_logical::join::StatementGroupOptimizer;
use rdf_federation_logical::FedNode;
use rdf_federation_model::{GraphPattern, NamedNodePattern};
use std::sync::Arc;

#[test]
fn test_group_statements_of_same_source() -> FederationResult<()> {
    let plan = FedNode::join([
        statement("p1", "o1", &["a"]),
        statement("p2", "o2", &["b"]),
        statement("p3", "o3", &["a"]),
        statement("p4", "o4", &["a", "b"]),
    ]);

    let optimized = StatementGroupOptimizer::default().optimize(plan)?;

    insta::assert_snapshot!(optimized, @r"
    Join
      ExclusiveGroup @a
        (?s <http://ex.org/p1> ?o1)
        (?s <http://ex.org/p3> ?o3)
      ExclusiveStatement (?s <http://ex.org/p2> ?o2) @b
      Statement (?s <http://ex.org/p4> ?o4) @[a, b]
    ");
    Ok(())
}

#[test]
fn test_groups_never_share_a_source() -> FederationResult<()> {
    let plan = FedNode::join([
        statement("p1", "o1", &["a"]),
        statement("p2", "o2", &["b"]),
        statement("p3", "o3", &["b"]),
        statement("p4", "o4", &["a"]),
        statement("p5", "o5", &["a"]),
    ]);

    let FedNode::Join(args) = StatementGroupOptimizer::default().optimize(plan)? else {
        panic!("Expected a join");
    };

    let mut owners = args
        .iter()
        .map(|arg| match arg.as_ref() {
            FedNode::ExclusiveGroup(group) => (group.owner().to_string(), group.statements().len()),
            other => panic!("Expected only exclusive groups, got {other}"),
        })
        .collect::<Vec<_>>();
    owners.sort();
    assert_eq!(owners, vec![("a".to_owned(), 3), ("b".to_owned(), 2)]);
    Ok(())
}

#[test]
fn test_single_exclusive_statement_is_not_wrapped() -> FederationResult<()> {
    let plan = FedNode::join([
        statement("p1", "o1", &["a"]),
        statement("p2", "o2", &["b"]),
    ]);

    let optimized = StatementGroupOptimizer::default().optimize(plan)?;

    insta::assert_snapshot!(optimized, @r"
    Join
      ExclusiveStatement (?s <http://ex.org/p1> ?o1) @a
      ExclusiveStatement (?s <http://ex.org/p2> ?o2) @b
    ");
    Ok(())
}

#[test]
fn test_empty_argument_collapses_join() -> FederationResult<()> {
    let optimizer = StatementGroupOptimizer::default();

    let empty_first = FedNode::join([
        FedNode::Empty,
        statement("p1", "o1", &["a"]),
        statement("p2", "o2", &["a"]),
    ]);
    let empty_last = FedNode::join([
        statement("p1", "o1", &["a"]),
        statement("p2", "o2", &["a", "b"]),
        FedNode::Empty,
    ]);

    assert_eq!(optimizer.optimize(empty_first)?, FedNode::Empty);
    assert_eq!(optimizer.optimize(empty_last)?, FedNode::Empty);
    Ok(())
}

#[test]
fn test_single_remaining_argument_replaces_join() -> FederationResult<()> {
    let optimizer = StatementGroupOptimizer::default();
    let remaining = statement("p1", "o1", &["a", "b"]);

    let optimized = optimizer.optimize(FedNode::join([FedNode::True, remaining.clone()]))?;

    assert_eq!(optimized, remaining);
    Ok(())
}

#[test]
fn test_no_remaining_argument_yields_true() -> FederationResult<()> {
    let optimizer = StatementGroupOptimizer::default();

    let optimized = optimizer.optimize(FedNode::join([FedNode::True, FedNode::True]))?;

    assert_eq!(optimized, FedNode::True);
    Ok(())
}

#[test]
fn test_optimizes_nested_joins_but_not_services() -> FederationResult<()> {
    let service_pattern = GraphPattern::Join {
        left: Box::new(GraphPattern::Bgp { patterns: vec![] }),
        right: Box::new(GraphPattern::Bgp { patterns: vec![] }),
    };
    let service = FedNode::Service {
        name: NamedNodePattern::NamedNode(iri("service")),
        pattern: service_pattern,
        silent: false,
    };
    let plan = FedNode::Distinct(Arc::new(FedNode::union([
        FedNode::join([statement("p1", "o1", &["a"]), statement("p2", "o2", &["a"])]),
        FedNode::join([FedNode::True, service.clone()]),
    ])));

    let FedNode::Distinct(inner) = StatementGroupOptimizer::default().optimize(plan)? else {
        panic!("Expected distinct");
    };
    let FedNode::Union(branches) = inner.as_ref() else {
        panic!("Expected union");
    };

    assert!(matches!(branches[0].as_ref(), FedNode::ExclusiveGroup(group) if group.statements().len() == 2));
    assert_eq!(branches[1].as_ref(), &service);
    Ok(())
}
