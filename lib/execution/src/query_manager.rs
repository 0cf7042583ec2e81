use crate::scheduler::ControlledWorkerScheduler;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use itertools::Itertools;
use rdf_federation_common::{QueryId, QueryInfo};
use rdf_federation_model::QueryKind;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, PoisonError, RwLock};
use tracing::info;

#[allow(clippy::expect_used, reason = "The pattern is a valid regex")]
static PREFIX_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)PREFIX[ ]*(\w*):[ ]*<(\S*)>").expect("Valid prefix declaration pattern")
});

#[allow(clippy::expect_used, reason = "The pattern is a valid regex")]
static PREFIX_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)PREFIX").expect("Valid prefix keyword pattern"));

/// Keeps track of the queries that are currently evaluated in a federation.
///
/// The query manager is the only authority for cancelling queries. Aborting a query marks it as
/// aborted and removes its queued tasks from the join and union schedulers.
///
/// In addition, the query manager holds the prefix declarations that are added to every incoming
/// query.
#[derive(Debug)]
pub struct QueryManager {
    active: DashMap<QueryId, Arc<QueryInfo>>,
    next_query_id: AtomicU64,
    prefixes: RwLock<BTreeMap<String, String>>,
    join_scheduler: Arc<ControlledWorkerScheduler>,
    union_scheduler: Arc<ControlledWorkerScheduler>,
}

impl QueryManager {
    /// Creates a new [QueryManager] that cancels tasks on the given schedulers.
    pub fn new(
        join_scheduler: Arc<ControlledWorkerScheduler>,
        union_scheduler: Arc<ControlledWorkerScheduler>,
    ) -> Self {
        Self {
            active: DashMap::new(),
            next_query_id: AtomicU64::new(1),
            prefixes: RwLock::new(BTreeMap::new()),
            join_scheduler,
            union_scheduler,
        }
    }

    /// Creates the [QueryInfo] for a new query with the next query id.
    pub fn create_query_info(&self, query: impl Into<String>, kind: QueryKind) -> Arc<QueryInfo> {
        let id = QueryId::new(self.next_query_id.fetch_add(1, Ordering::Relaxed));
        Arc::new(QueryInfo::new(id, query, kind))
    }

    /// Registers `query` as running.
    ///
    /// # Panics
    ///
    /// If a query with the same id is already running.
    pub fn register(&self, query: Arc<QueryInfo>) {
        let id = query.id();
        let newly_registered = match self.active.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(query);
                true
            }
        };
        assert!(newly_registered, "Query {id} has already been registered.");
    }

    /// Aborts `query` if it is running.
    ///
    /// The query is marked as aborted, its queued tasks are cancelled, and it is removed from the
    /// running queries. All of this happens while the entry of the query is locked.
    pub fn abort(&self, query: &QueryInfo) {
        if let Entry::Occupied(entry) = self.active.entry(query.id()) {
            info!("Aborting query {}.", query.id());
            entry.get().mark_aborted();
            let join_tasks = self.join_scheduler.abort(query.id());
            let union_tasks = self.union_scheduler.abort(query.id());
            entry.remove();
            info!(
                "Aborted query {} ({join_tasks} join tasks and {union_tasks} union tasks cancelled).",
                query.id()
            );
        }
    }

    /// Removes `query` from the running queries. Does nothing if it is not running.
    pub fn finish(&self, query: &QueryInfo) {
        self.active.remove(&query.id());
    }

    /// Returns `true` if `query` is running.
    pub fn is_running(&self, query: &QueryInfo) -> bool {
        self.active.contains_key(&query.id())
    }

    /// The number of running queries.
    pub fn running_count(&self) -> usize {
        self.active.len()
    }

    /// Returns the running queries ordered by id.
    pub fn snapshot(&self) -> Vec<Arc<QueryInfo>> {
        self.active
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .sorted_by_key(|query| query.id())
            .collect()
    }

    /// Adds a prefix declaration that is prepended to incoming queries.
    ///
    /// Passing [None] or an empty namespace removes the declaration of `prefix`.
    pub fn add_prefix_declaration(&self, prefix: impl Into<String>, namespace: Option<&str>) {
        let prefix = prefix.into();
        let mut prefixes = self
            .prefixes
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match namespace {
            Some(namespace) if !namespace.is_empty() => {
                prefixes.insert(prefix, namespace.to_owned());
            }
            _ => {
                prefixes.remove(&prefix);
            }
        }
    }

    /// Returns the registered prefix declarations ordered by prefix.
    pub fn prefix_declarations(&self) -> Vec<(String, String)> {
        self.prefixes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(prefix, namespace)| (prefix.clone(), namespace.clone()))
            .collect()
    }

    /// Prepends the registered prefix declarations that `query` does not declare itself.
    pub fn rewrite_prefixes(&self, query: &str) -> String {
        let prefixes = self.prefixes.read().unwrap_or_else(PoisonError::into_inner);
        if prefixes.is_empty() {
            return query.to_owned();
        }

        let declared: HashSet<&str> = if PREFIX_KEYWORD.is_match(query) {
            query
                .lines()
                .flat_map(|line| PREFIX_DECLARATION.captures_iter(line))
                .filter_map(|captures| captures.get(1))
                .map(|name| name.as_str())
                .collect()
        } else {
            HashSet::new()
        };

        let header = prefixes
            .iter()
            .filter(|(prefix, _)| !declared.contains(prefix.as_str()))
            .map(|(prefix, namespace)| format!("PREFIX {prefix}: <{namespace}>\n"))
            .collect::<String>();
        header + query
    }
}
