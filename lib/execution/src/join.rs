use crate::evaluator::FederationEvaluator;
use crate::scheduler::Task;
use crate::union::stop_after_error;
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::{future, stream, StreamExt};
use rdf_federation_common::{BindingSetStream, FederationError, FederationResult, QueryInfo};
use rdf_federation_logical::FedNode;
use rdf_federation_model::BindingSet;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, instrument};

/// A nested-loop join that evaluates the right side concurrently for each left binding.
///
/// For every binding of the left input, one task is scheduled on the join scheduler. The task
/// evaluates the right node with that binding and forwards the results to the output of the join.
/// Results of different left bindings may interleave, while the results of a single left binding
/// keep their order.
///
/// Once the left input is exhausted, the join waits until every scheduled task has reported its
/// outcome. A failed task fails the join. If not all tasks report within the configured completion
/// timeout, the join fails with [FederationError::JoinTimeout]. Results are buffered without bound
/// between the tasks and the consumer, so a slow consumer never holds up a task.
///
/// Joins on the right side are evaluated within the join task and do not occupy further join
/// workers.
pub struct ControlledWorkerJoin {
    id: u64,
    evaluator: FederationEvaluator,
    left: BindingSetStream,
    right: Arc<FedNode>,
}

/// The outcome of a join task.
#[derive(Debug)]
enum TaskReport {
    Done,
    Failed(FederationError),
    Cancelled,
}

impl ControlledWorkerJoin {
    /// Creates a new [ControlledWorkerJoin].
    pub fn new(evaluator: FederationEvaluator, left: BindingSetStream, right: Arc<FedNode>) -> Self {
        Self {
            id: evaluator.context().next_join_id(),
            evaluator,
            left,
            right,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the results of the join.
    ///
    /// The left input is consumed while the results are polled. Dropping the stream stops all
    /// tasks of this join that are still running.
    pub fn into_stream(self) -> BindingSetStream {
        let (output, results) = mpsc::unbounded();

        let driver = stream::once(self.drive(output))
            .filter_map(|result| future::ready(result.err().map(Err)));
        let results = results.map(Ok);

        stop_after_error(stream::select(results, driver).boxed())
    }

    #[instrument(skip_all, fields(join_id = self.id, query = %self.evaluator.query().id()))]
    async fn drive(self, output: mpsc::UnboundedSender<BindingSet>) -> FederationResult<()> {
        let Self {
            id,
            evaluator,
            mut left,
            right,
        } = self;
        let query = Arc::clone(evaluator.query());
        let context = Arc::clone(evaluator.context());

        let (reports, mut report_receiver) = mpsc::unbounded();
        let mut producer = context.join_scheduler().producer(Arc::clone(&query));
        while let Some(bindings) = left.next().await {
            let bindings = bindings?;
            if query.is_aborted() {
                return Err(FederationError::QueryAborted(query.id()));
            }
            if output.is_closed() {
                return Ok(());
            }

            producer.schedule(Box::new(JoinTask {
                query: Arc::clone(&query),
                evaluator: evaluator.for_join_task(),
                right: Arc::clone(&right),
                bindings,
                output: output.clone(),
                reporter: Reporter {
                    reports: Some(reports.clone()),
                },
            }));
        }
        producer.inform_finish();
        drop(reports);
        drop(output);

        let total = producer.submitted();
        debug!("JoinStats: left input of join #{id} had {total} results.");

        let timeout = context.config().join_completion_timeout;
        let deadline = Instant::now() + timeout;
        let mut pending = total;
        while pending > 0 {
            let report = tokio::time::timeout_at(deadline, report_receiver.next())
                .await
                .map_err(|_| FederationError::JoinTimeout {
                    join_id: id,
                    pending,
                    timeout,
                })?;
            match report {
                Some(TaskReport::Done) => pending -= 1,
                Some(TaskReport::Failed(error)) => return Err(error),
                Some(TaskReport::Cancelled) => {
                    return Err(FederationError::QueryAborted(query.id()))
                }
                None => {
                    return Err(FederationError::SchedulerShutdown(
                        context.join_scheduler().name().to_owned(),
                    ))
                }
            }
            if query.is_aborted() {
                return Err(FederationError::QueryAborted(query.id()));
            }
        }
        Ok(())
    }
}

/// Sends exactly one report per task. A task that is dropped without reporting, e.g., because it
/// panicked, is reported as failed.
struct Reporter {
    reports: Option<mpsc::UnboundedSender<TaskReport>>,
}

impl Reporter {
    fn report(mut self, report: TaskReport) {
        if let Some(reports) = self.reports.take() {
            reports.unbounded_send(report).ok();
        }
    }
}

impl Drop for Reporter {
    fn drop(&mut self) {
        if let Some(reports) = self.reports.take() {
            let error = FederationError::Internal("A join task ended without a report".to_owned());
            reports.unbounded_send(TaskReport::Failed(error)).ok();
        }
    }
}

/// Evaluates the right side of a join for a single left binding.
struct JoinTask {
    query: Arc<QueryInfo>,
    evaluator: FederationEvaluator,
    right: Arc<FedNode>,
    bindings: BindingSet,
    output: mpsc::UnboundedSender<BindingSet>,
    reporter: Reporter,
}

#[async_trait]
impl Task for JoinTask {
    fn query(&self) -> &Arc<QueryInfo> {
        &self.query
    }

    async fn run(self: Box<Self>) {
        let JoinTask {
            query,
            evaluator,
            right,
            bindings,
            output,
            reporter,
        } = *self;

        // The consumer of the join is gone.
        if output.is_closed() {
            reporter.report(TaskReport::Done);
            return;
        }

        let mut results = evaluator.evaluate(&right, bindings);
        while let Some(result) = results.next().await {
            if query.is_aborted() {
                reporter.report(TaskReport::Cancelled);
                return;
            }
            match result {
                Ok(result) => {
                    if output.unbounded_send(result).is_err() {
                        break;
                    }
                }
                Err(error) => {
                    reporter.report(TaskReport::Failed(error));
                    return;
                }
            }
        }
        reporter.report(TaskReport::Done);
    }

    fn cancel(self: Box<Self>) {
        self.reporter.report(TaskReport::Cancelled);
    }
}
