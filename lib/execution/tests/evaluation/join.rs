use crate::mock_source::{iri, pattern, statement, var, Call, MockSource, TestFederation};
use futures::StreamExt;
use rdf_federation_common::FederationError;
use rdf_federation_execution::FederationConfig;
use rdf_federation_logical::FedNode;
use rdf_federation_model::{BindingSet, Literal, SourceCapability};
use std::sync::Arc;
use std::time::Duration;

fn names() -> MockSource {
    MockSource::new()
        .with_triple("alice", "name", Literal::from("Alice"))
        .with_triple("bob", "name", Literal::from("Bob"))
        .with_triple("carol", "name", Literal::from("Carol"))
}

fn knows() -> MockSource {
    MockSource::new().with_triple("alice", "knows", iri("bob"))
}

/// `(?s name ?n) @a JOIN (?s knows ?f) @b`
fn name_knows_join(federation: &TestFederation) -> FedNode {
    FedNode::join([
        statement(
            pattern(var("s").into(), "name", var("n").into()),
            &[federation.source_ref(0)],
        ),
        statement(
            pattern(var("s").into(), "knows", var("f").into()),
            &[federation.source_ref(1)],
        ),
    ])
}

#[tokio::test]
async fn test_join_binds_right_side_with_left_results() {
    let federation = TestFederation::new(
        FederationConfig::new(),
        vec![
            ("a", SourceCapability::Lookup, names()),
            ("b", SourceCapability::Lookup, knows()),
        ],
    );

    let results = federation.evaluate(name_knows_join(&federation)).await;

    let expected = BindingSet::new()
        .with(var("s"), iri("alice"))
        .with(var("n"), Literal::from("Alice"))
        .with(var("f"), iri("bob"));
    assert_eq!(
        results.into_iter().collect::<Result<Vec<_>, _>>().unwrap(),
        vec![expected]
    );

    let mut lookups = federation
        .source(1)
        .calls()
        .into_iter()
        .map(|call| match call {
            Call::Lookup(pattern) => pattern,
            call => panic!("Unexpected call {call:?}"),
        })
        .collect::<Vec<_>>();
    lookups.sort();
    assert_eq!(
        lookups,
        vec![
            "(<http://ex.org/alice> <http://ex.org/knows> ?f)",
            "(<http://ex.org/bob> <http://ex.org/knows> ?f)",
            "(<http://ex.org/carol> <http://ex.org/knows> ?f)",
        ]
    );
}

#[tokio::test]
async fn test_join_with_empty_left_side_schedules_nothing() {
    let federation = TestFederation::new(
        FederationConfig::new(),
        vec![
            ("a", SourceCapability::Lookup, MockSource::new()),
            ("b", SourceCapability::Lookup, knows()),
        ],
    );

    let results = federation.evaluate(name_knows_join(&federation)).await;

    assert!(results.is_empty());
    assert!(federation.source(1).calls().is_empty());
    assert!(federation.context.join_scheduler().is_idle());
}

#[tokio::test]
async fn test_join_fails_if_right_side_fails() {
    let federation = TestFederation::new(
        FederationConfig::new(),
        vec![
            ("a", SourceCapability::Lookup, names()),
            ("b", SourceCapability::Lookup, MockSource::new().failing()),
        ],
    );

    let results = federation.evaluate(name_knows_join(&federation)).await;

    assert_eq!(results.len(), 1);
    assert!(matches!(results[0], Err(FederationError::Source { .. })));
}

#[tokio::test]
async fn test_join_times_out_if_tasks_do_not_report() {
    let federation = TestFederation::new(
        FederationConfig::new().with_join_completion_timeout(Duration::from_millis(50)),
        vec![
            ("a", SourceCapability::Lookup, names()),
            (
                "b",
                SourceCapability::Lookup,
                knows().with_delay(Duration::from_millis(500)),
            ),
        ],
    );

    let results = federation.evaluate(name_knows_join(&federation)).await;

    assert_eq!(results.len(), 1);
    let Err(FederationError::JoinTimeout {
        pending, timeout, ..
    }) = &results[0]
    else {
        panic!("Expected a join timeout, got {:?}", results[0]);
    };
    assert_eq!(*pending, 3);
    assert_eq!(*timeout, Duration::from_millis(50));
}

#[tokio::test]
async fn test_n_ary_join_is_evaluated_left_deep() {
    let federation = TestFederation::new(
        FederationConfig::new(),
        vec![
            ("a", SourceCapability::Lookup, names()),
            ("b", SourceCapability::Lookup, knows()),
        ],
    );
    let node = FedNode::join([
        statement(
            pattern(var("s").into(), "name", var("n").into()),
            &[federation.source_ref(0)],
        ),
        statement(
            pattern(var("s").into(), "knows", var("f").into()),
            &[federation.source_ref(1)],
        ),
        statement(
            pattern(var("f").into(), "name", var("fn").into()),
            &[federation.source_ref(0)],
        ),
    ]);

    let results = federation.evaluate(node).await;

    let expected = BindingSet::new()
        .with(var("s"), iri("alice"))
        .with(var("n"), Literal::from("Alice"))
        .with(var("f"), iri("bob"))
        .with(var("fn"), Literal::from("Bob"));
    assert_eq!(
        results.into_iter().collect::<Result<Vec<_>, _>>().unwrap(),
        vec![expected]
    );
}

#[tokio::test]
async fn test_dropping_join_stream_skips_remaining_tasks() {
    let federation = TestFederation::new(
        FederationConfig::new().with_join_worker_threads(1),
        vec![
            ("a", SourceCapability::Lookup, names()),
            (
                "b",
                SourceCapability::Lookup,
                knows().with_delay(Duration::from_millis(200)),
            ),
        ],
    );
    let node = Arc::new(name_knows_join(&federation));

    let mut results = federation.evaluator().evaluate(&node, BindingSet::new());
    let first = tokio::time::timeout(Duration::from_millis(50), results.next()).await;
    assert!(first.is_err(), "The first task is still waiting for the source");
    drop(results);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(federation.source(1).calls().len(), 1);
    assert!(federation.context.join_scheduler().is_idle());
}

#[tokio::test]
async fn test_sub_select_on_right_side_does_not_see_left_bindings() {
    let federation = TestFederation::new(
        FederationConfig::new(),
        vec![
            ("a", SourceCapability::Lookup, names()),
            ("b", SourceCapability::Lookup, knows()),
        ],
    );
    let sub_select = FedNode::Project {
        inner: Arc::new(statement(
            pattern(var("s").into(), "knows", var("f").into()),
            &[federation.source_ref(1)],
        )),
        variables: vec![var("f")],
    };
    let node = FedNode::join([
        statement(
            pattern(var("s").into(), "name", var("n").into()),
            &[federation.source_ref(0)],
        ),
        sub_select,
    ]);

    let mut results = federation
        .evaluate(node)
        .await
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    results.sort_by_key(ToString::to_string);

    // ?s of the sub-select is not projected, so every left binding joins with ?f.
    let mut expected = [("alice", "Alice"), ("bob", "Bob"), ("carol", "Carol")]
        .into_iter()
        .map(|(person, name)| {
            BindingSet::new()
                .with(var("s"), iri(person))
                .with(var("n"), Literal::from(name))
                .with(var("f"), iri("bob"))
        })
        .collect::<Vec<_>>();
    expected.sort_by_key(ToString::to_string);
    assert_eq!(results, expected);
    assert_eq!(
        federation.source(1).calls(),
        vec![Call::Lookup("(?s <http://ex.org/knows> ?f)".to_owned()); 3]
    );
}

#[tokio::test]
async fn test_slice_on_right_side_applies_to_all_results() {
    let federation = TestFederation::new(
        FederationConfig::new(),
        vec![("a", SourceCapability::Lookup, names())],
    );
    let limited = FedNode::Slice {
        inner: Arc::new(statement(
            pattern(var("s").into(), "name", var("m").into()),
            &[federation.source_ref(0)],
        )),
        start: 0,
        length: Some(1),
    };
    let node = FedNode::join([
        statement(
            pattern(var("s").into(), "name", var("n").into()),
            &[federation.source_ref(0)],
        ),
        limited,
    ]);

    let results = federation.evaluate(node).await;

    let expected = BindingSet::new()
        .with(var("s"), iri("alice"))
        .with(var("n"), Literal::from("Alice"))
        .with(var("m"), Literal::from("Alice"));
    assert_eq!(
        results.into_iter().collect::<Result<Vec<_>, _>>().unwrap(),
        vec![expected]
    );
}

/// `(?s name ?n) JOIN ((?s knows ?f) JOIN (?f name ?m))`, optionally within a union.
fn nested_join(federation: &TestFederation, within_union: bool) -> FedNode {
    let inner = FedNode::join([
        statement(
            pattern(var("s").into(), "knows", var("f").into()),
            &[federation.source_ref(1)],
        ),
        statement(
            pattern(var("f").into(), "name", var("m").into()),
            &[federation.source_ref(0)],
        ),
    ]);
    let right = if within_union {
        FedNode::union([
            inner,
            statement(
                pattern(var("s").into(), "age", var("a").into()),
                &[federation.source_ref(0)],
            ),
        ])
    } else {
        inner
    };
    FedNode::join([
        statement(
            pattern(var("s").into(), "name", var("n").into()),
            &[federation.source_ref(0)],
        ),
        right,
    ])
}

#[tokio::test]
async fn test_nested_joins_on_right_side_do_not_wait_for_join_workers() {
    for within_union in [false, true] {
        let federation = TestFederation::new(
            FederationConfig::new()
                .with_join_worker_threads(1)
                .with_join_completion_timeout(Duration::from_secs(2)),
            vec![
                ("a", SourceCapability::Lookup, names()),
                ("b", SourceCapability::Lookup, knows()),
            ],
        );

        let results = federation
            .evaluate(nested_join(&federation, within_union))
            .await;

        let expected = BindingSet::new()
            .with(var("s"), iri("alice"))
            .with(var("n"), Literal::from("Alice"))
            .with(var("f"), iri("bob"))
            .with(var("m"), Literal::from("Bob"));
        assert_eq!(
            results.into_iter().collect::<Result<Vec<_>, _>>().unwrap(),
            vec![expected]
        );
        assert_eq!(federation.source(1).calls().len(), 3);
        assert!(federation.context.join_scheduler().is_idle());
    }
}

#[tokio::test]
async fn test_slow_consumer_does_not_trigger_join_timeout() {
    let federation = TestFederation::new(
        FederationConfig::new().with_join_completion_timeout(Duration::from_millis(100)),
        vec![("a", SourceCapability::Lookup, names())],
    );
    // A cross product of all names.
    let node = Arc::new(FedNode::join([
        statement(
            pattern(var("s").into(), "name", var("n").into()),
            &[federation.source_ref(0)],
        ),
        statement(
            pattern(var("x").into(), "name", var("m").into()),
            &[federation.source_ref(0)],
        ),
    ]));

    let mut results = federation.evaluator().evaluate(&node, BindingSet::new());
    let first = results.next().await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    let rest = results.collect::<Vec<_>>().await;

    assert!(matches!(first, Some(Ok(_))));
    assert_eq!(rest.len(), 8);
    assert!(rest.iter().all(Result::is_ok));
}
