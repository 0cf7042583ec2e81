use crate::mock_source::{pattern, statement, var, MockSource, TestFederation};
use futures::StreamExt;
use rdf_federation_common::FederationError;
use rdf_federation_execution::FederationConfig;
use rdf_federation_logical::FedNode;
use rdf_federation_model::{BindingSet, Literal, SourceCapability};
use std::sync::Arc;
use std::time::Duration;

fn federation(config: FederationConfig, right_delay: Duration) -> TestFederation {
    let names = MockSource::new()
        .with_triple("alice", "name", Literal::from("Alice"))
        .with_triple("bob", "name", Literal::from("Bob"))
        .with_triple("carol", "name", Literal::from("Carol"));
    let ages = MockSource::new()
        .with_triple("alice", "age", Literal::from(42))
        .with_delay(right_delay);
    TestFederation::new(
        config,
        vec![
            ("a", SourceCapability::Lookup, names),
            ("b", SourceCapability::Lookup, ages),
        ],
    )
}

fn name_age_join(federation: &TestFederation) -> Arc<FedNode> {
    Arc::new(FedNode::join([
        statement(
            pattern(var("s").into(), "name", var("n").into()),
            &[federation.source_ref(0)],
        ),
        statement(
            pattern(var("s").into(), "age", var("age").into()),
            &[federation.source_ref(1)],
        ),
    ]))
}

#[tokio::test]
async fn test_abort_stops_running_join() {
    let federation = federation(
        FederationConfig::new().with_join_worker_threads(1),
        Duration::from_millis(200),
    );
    let evaluator = federation.evaluator();
    let query = Arc::clone(evaluator.query());
    let results = evaluator.evaluate(&name_age_join(&federation), BindingSet::new());
    let results = tokio::spawn(results.collect::<Vec<_>>());

    tokio::time::sleep(Duration::from_millis(50)).await;
    federation.context.query_manager().abort(&query);
    let results = results.await.unwrap();

    assert!(query.is_aborted());
    assert!(!federation.context.query_manager().is_running(&query));
    assert!(matches!(
        results.last(),
        Some(Err(FederationError::QueryAborted(id))) if *id == query.id()
    ));
    assert!(results.iter().all(Result::is_err));

    // The queued tasks of the aborted query are never started.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(federation.source(1).calls().len(), 1);
    assert!(federation.context.join_scheduler().is_idle());
}

#[tokio::test]
async fn test_aborted_query_does_not_contact_sources() {
    let federation = federation(FederationConfig::new(), Duration::ZERO);
    let evaluator = federation.evaluator();
    federation.context.query_manager().abort(evaluator.query());

    let results = evaluator
        .evaluate(&name_age_join(&federation), BindingSet::new())
        .collect::<Vec<_>>()
        .await;

    assert_eq!(results.len(), 1);
    assert!(matches!(results[0], Err(FederationError::QueryAborted(_))));
    assert!(federation.source(0).calls().is_empty());
    assert!(federation.source(1).calls().is_empty());
}

#[tokio::test]
async fn test_abort_only_affects_the_aborted_query() {
    let federation = federation(FederationConfig::new(), Duration::ZERO);
    let aborted = federation.evaluator();
    let running = federation.evaluator();
    federation.context.query_manager().abort(aborted.query());

    let results = running
        .evaluate(&name_age_join(&federation), BindingSet::new())
        .collect::<Vec<_>>()
        .await;

    assert_eq!(results.len(), 1);
    assert!(results[0].is_ok());
    assert!(federation.context.query_manager().is_running(running.query()));
    assert_eq!(federation.context.query_manager().running_count(), 1);
}

#[tokio::test]
async fn test_shutdown_aborts_running_queries() {
    let federation = federation(FederationConfig::new(), Duration::ZERO);
    let first = federation.evaluator();
    let second = federation.evaluator();

    federation.context.shutdown();

    assert!(first.query().is_aborted());
    assert!(second.query().is_aborted());
    assert_eq!(federation.context.query_manager().running_count(), 0);
    assert!(federation.context.join_scheduler().is_shut_down());
    assert!(federation.context.union_scheduler().is_shut_down());
}
