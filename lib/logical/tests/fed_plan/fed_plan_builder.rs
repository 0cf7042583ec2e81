use crate::test_utils::{iri, source, triple, var};
use rdf_federation_common::{FederationError, FederationResult};
use rdf_federation_logical::{
    FedNode, FedPlanBuilder, SourceSelection, SourceSelector, StaticSourceSelector,
};
use rdf_federation_model::{
    BlankNode, Expression, GraphPattern, Literal, Query, TermPattern, TriplePattern,
    Variable,
};
use std::sync::Arc;

fn builder() -> FedPlanBuilder {
    let selector = StaticSourceSelector::new(vec![source("a"), source("b")])
        .with_predicate(iri("name"), vec![source("a")])
        .with_predicate(iri("age"), vec![source("a")])
        .with_predicate(iri("knows"), vec![source("b")])
        .with_predicate(iri("unknown"), vec![]);
    FedPlanBuilder::new(Arc::new(selector))
}

/// Returns the graph pattern of `query` without a top-level projection.
fn where_clause(query: &str) -> GraphPattern {
    let (Query::Select { pattern, .. } | Query::Ask { pattern, .. }) = parse(query) else {
        panic!("Expected a SELECT or ASK query");
    };
    match pattern {
        GraphPattern::Project { inner, .. } => *inner,
        pattern => pattern,
    }
}

fn parse(query: &str) -> Query {
    Query::parse(&format!("PREFIX ex: <http://ex.org/>\n{query}"), None).unwrap()
}

#[test]
fn test_bgp_is_annotated_with_sources() -> FederationResult<()> {
    let query = parse("SELECT ?s ?n ?f WHERE { ?s ex:name ?n . ?s ex:knows ?f . ?s ?p ?f }");

    let plan = builder().build_query(&query)?;

    insta::assert_snapshot!(plan, @r"
    Project: ?s, ?n, ?f
      Join
        ExclusiveStatement (?s <http://ex.org/name> ?n) @a
        ExclusiveStatement (?s <http://ex.org/knows> ?f) @b
        Statement (?s ?p ?f) @[a, b]
    ");
    Ok(())
}

#[test]
fn test_pattern_without_source_is_empty() -> FederationResult<()> {
    let pattern = GraphPattern::Bgp {
        patterns: vec![triple(var("s"), "unknown", var("o"))],
    };

    assert_eq!(builder().build(&pattern)?, FedNode::Empty);
    Ok(())
}

#[test]
fn test_satisfied_pattern_is_true() -> FederationResult<()> {
    let selector = |pattern: &TriplePattern| {
        if matches!(pattern.subject, TermPattern::NamedNode(_)) {
            SourceSelection::satisfied(vec![source("a")])
        } else {
            SourceSelection::new(vec![source("a")])
        }
    };
    let builder = FedPlanBuilder::new(Arc::new(selector) as Arc<dyn SourceSelector>);
    let pattern = GraphPattern::Bgp {
        patterns: vec![
            triple(iri("alice").into(), "name", Literal::from("Alice").into()),
            triple(var("s"), "name", var("n")),
        ],
    };

    insta::assert_snapshot!(builder.build(&pattern)?, @r"
    Join
      True
      ExclusiveStatement (?s <http://ex.org/name> ?n) @a
    ");
    Ok(())
}

#[test]
fn test_blank_nodes_become_variables() -> FederationResult<()> {
    let pattern = GraphPattern::Bgp {
        patterns: vec![triple(
            BlankNode::new_unchecked("b0").into(),
            "name",
            var("n"),
        )],
    };

    insta::assert_snapshot!(builder().build(&pattern)?, @"ExclusiveStatement (?_b0 <http://ex.org/name> ?n) @a");
    Ok(())
}

#[test]
fn test_filter_is_pushed_into_binding_statement() -> FederationResult<()> {
    let pattern = where_clause(
        r#"SELECT * WHERE { ?s ex:name ?n . ?s ex:knows ?f FILTER(?n = "Alice" && ?f != ?s) }"#,
    );

    let FedNode::Join(args) = builder().build(&pattern)? else {
        panic!("Expected a join");
    };

    let filters = args
        .iter()
        .map(|arg| match arg.as_ref() {
            FedNode::Statement(statement) => statement.statement().filter().cloned(),
            other => panic!("Expected a statement, got {other}"),
        })
        .collect::<Vec<_>>();
    assert_eq!(
        filters,
        vec![
            Some(Expression::Equal(
                Box::new(Expression::Variable(Variable::new_unchecked("n"))),
                Box::new(Expression::Literal(Literal::from("Alice"))),
            )),
            Some(Expression::Not(Box::new(Expression::Equal(
                Box::new(Expression::Variable(Variable::new_unchecked("f"))),
                Box::new(Expression::Variable(Variable::new_unchecked("s"))),
            )))),
        ]
    );
    Ok(())
}

#[test]
fn test_filter_spanning_statements_stays_residual() -> FederationResult<()> {
    let pattern = where_clause("ASK { ?s ex:name ?n . ?s ex:knows ?f FILTER(?n = ?f) }");

    let plan = builder().build(&pattern)?;

    let FedNode::Filter { inner, .. } = plan else {
        panic!("Expected a residual filter, got {plan}");
    };
    assert!(matches!(inner.as_ref(), FedNode::Join(args) if args.len() == 2));
    Ok(())
}

#[test]
fn test_unions_are_flattened() -> FederationResult<()> {
    let pattern =
        where_clause("ASK { { ?s ex:name ?n } UNION { ?s ex:age ?n } UNION { ?s ex:knows ?n } }");

    let plan = builder().build(&pattern)?;

    assert!(matches!(&plan, FedNode::Union(args) if args.len() == 3), "{plan}");
    Ok(())
}

#[test]
fn test_optional_is_not_implemented() {
    let query = parse("ASK { ?s ex:name ?n OPTIONAL { ?s ex:age ?a } }");

    let result = builder().build_query(&query);

    assert!(matches!(result, Err(FederationError::NotImplemented(_))));
}
