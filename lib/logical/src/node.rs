use rdf_federation_common::{FederationError, FederationResult};
use rdf_federation_model::{
    Expression, GraphPattern, NamedNodePattern, SourceRef, StatementPattern, Variable,
};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// A node of a federated query plan.
///
/// Plans are immutable. Optimizers build new plans bottom-up instead of mutating nodes in place,
/// and children are reference counted so that sub-plans can be shared with concurrently running
/// tasks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FedNode {
    /// Produces no results. Any join containing this node produces no results either.
    Empty,
    /// Produces exactly the input bindings. Can be removed from any join.
    True,
    /// A leaf pattern together with its candidate sources.
    Statement(StatementNode),
    /// Several patterns that are exclusive to the same source, evaluated as one sub-query.
    ExclusiveGroup(ExclusiveGroup),
    /// An n-ary inner join.
    Join(Vec<Arc<FedNode>>),
    /// An n-ary bag union.
    Union(Vec<Arc<FedNode>>),
    /// A filter that could not be pushed into a statement.
    Filter {
        inner: Arc<FedNode>,
        expression: Expression,
    },
    Project {
        inner: Arc<FedNode>,
        variables: Vec<Variable>,
    },
    Distinct(Arc<FedNode>),
    Slice {
        inner: Arc<FedNode>,
        start: usize,
        length: Option<usize>,
    },
    /// An explicit `SERVICE` call. Optimizers do not descend into it.
    Service {
        name: NamedNodePattern,
        pattern: GraphPattern,
        silent: bool,
    },
}

impl FedNode {
    /// Creates a join node from `args`.
    pub fn join(args: impl IntoIterator<Item = FedNode>) -> Self {
        FedNode::Join(args.into_iter().map(Arc::new).collect())
    }

    /// Creates a union node from `args`.
    pub fn union(args: impl IntoIterator<Item = FedNode>) -> Self {
        FedNode::Union(args.into_iter().map(Arc::new).collect())
    }

    /// Returns the statement if this node is a statement with exactly one candidate source.
    pub fn as_exclusive_statement(&self) -> Option<&StatementNode> {
        match self {
            FedNode::Statement(statement) if statement.is_exclusive() => Some(statement),
            _ => None,
        }
    }

    /// Returns the variables that may be bound by this node.
    pub fn variables(&self) -> Vec<Variable> {
        let mut result = Vec::new();
        self.collect_variables(&mut result);
        result
    }

    fn collect_variables(&self, result: &mut Vec<Variable>) {
        let add = |variable: &Variable| {
            if !result.contains(variable) {
                result.push(variable.clone());
            }
        };
        match self {
            FedNode::Empty | FedNode::True => {}
            FedNode::Statement(statement) => {
                statement.statement().variables().iter().for_each(add);
            }
            FedNode::ExclusiveGroup(group) => group.variables().iter().for_each(add),
            FedNode::Join(args) | FedNode::Union(args) => {
                for arg in args {
                    arg.collect_variables(result);
                }
            }
            FedNode::Filter { inner, .. }
            | FedNode::Distinct(inner)
            | FedNode::Slice { inner, .. } => inner.collect_variables(result),
            FedNode::Project { variables, .. } => variables.iter().for_each(add),
            FedNode::Service { pattern, .. } => pattern.on_in_scope_variable(add),
        }
    }

    fn fmt_indented(&self, f: &mut Formatter<'_>, indent: usize) -> fmt::Result {
        write!(f, "{:indent$}", "", indent = indent)?;
        match self {
            FedNode::Empty => writeln!(f, "Empty"),
            FedNode::True => writeln!(f, "True"),
            FedNode::Statement(statement) => writeln!(f, "{statement}"),
            FedNode::ExclusiveGroup(group) => {
                writeln!(f, "ExclusiveGroup @{}", group.owner())?;
                for statement in group.statements() {
                    writeln!(f, "{:indent$}{statement}", "", indent = indent + 2)?;
                }
                Ok(())
            }
            FedNode::Join(args) => {
                writeln!(f, "Join")?;
                fmt_children(f, args, indent)
            }
            FedNode::Union(args) => {
                writeln!(f, "Union")?;
                fmt_children(f, args, indent)
            }
            FedNode::Filter { inner, expression } => {
                writeln!(f, "Filter: {expression}")?;
                inner.fmt_indented(f, indent + 2)
            }
            FedNode::Project { inner, variables } => {
                let variables = variables
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(f, "Project: {variables}")?;
                inner.fmt_indented(f, indent + 2)
            }
            FedNode::Distinct(inner) => {
                writeln!(f, "Distinct")?;
                inner.fmt_indented(f, indent + 2)
            }
            FedNode::Slice {
                inner,
                start,
                length,
            } => {
                match length {
                    None => writeln!(f, "Slice: start={start}")?,
                    Some(length) => writeln!(f, "Slice: start={start}, length={length}")?,
                }
                inner.fmt_indented(f, indent + 2)
            }
            FedNode::Service {
                name,
                pattern,
                silent,
            } => {
                let silent = if *silent { " SILENT" } else { "" };
                writeln!(f, "Service{silent} {name} {{ {pattern} }}")
            }
        }
    }
}

fn fmt_children(f: &mut Formatter<'_>, args: &[Arc<FedNode>], indent: usize) -> fmt::Result {
    for arg in args {
        arg.fmt_indented(f, indent + 2)?;
    }
    Ok(())
}

/// Renders the plan as an indented tree. This is the "query plan" that is used for debugging.
impl Display for FedNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

/// A leaf pattern that is annotated with its candidate sources.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatementNode {
    statement: StatementPattern,
    sources: Arc<[SourceRef]>,
}

impl StatementNode {
    /// Creates a new [StatementNode].
    pub fn new(statement: StatementPattern, sources: Vec<SourceRef>) -> Self {
        Self {
            statement,
            sources: sources.into(),
        }
    }

    pub fn statement(&self) -> &StatementPattern {
        &self.statement
    }

    pub fn sources(&self) -> &[SourceRef] {
        &self.sources
    }

    /// Returns `true` if the statement has exactly one candidate source.
    pub fn is_exclusive(&self) -> bool {
        self.sources.len() == 1
    }

    /// Returns the single candidate source of an exclusive statement.
    pub fn owner(&self) -> Option<&SourceRef> {
        match self.sources.as_ref() {
            [owner] => Some(owner),
            _ => None,
        }
    }
}

impl Display for StatementNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.owner() {
            Some(owner) => write!(f, "ExclusiveStatement {} @{owner}", self.statement),
            None => {
                let sources = self
                    .sources
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "Statement {} @[{sources}]", self.statement)
            }
        }
    }
}

/// A group of patterns that can only be answered by a single source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExclusiveGroup {
    owner: SourceRef,
    statements: Vec<StatementPattern>,
}

impl ExclusiveGroup {
    /// Creates a new [ExclusiveGroup] from exclusive statements.
    ///
    /// # Errors
    ///
    /// If `statements` is empty or not all statements are exclusive to the same source.
    pub fn try_new(statements: Vec<StatementNode>) -> FederationResult<Self> {
        let Some(owner) = statements.first().and_then(StatementNode::owner).cloned() else {
            return FederationError::internal("An exclusive group needs an exclusive statement.");
        };

        let mut patterns = Vec::with_capacity(statements.len());
        for statement in statements {
            if !statement.owner().is_some_and(|o| o.same_source(&owner)) {
                return FederationError::internal(format!(
                    "Statement {statement} is not exclusive to {owner}."
                ));
            }
            patterns.push(statement.statement);
        }

        Ok(Self {
            owner,
            statements: patterns,
        })
    }

    pub fn owner(&self) -> &SourceRef {
        &self.owner
    }

    pub fn statements(&self) -> &[StatementPattern] {
        &self.statements
    }

    /// The variables of all statements in the group in order of appearance.
    pub fn variables(&self) -> Vec<Variable> {
        let mut result: Vec<Variable> = Vec::new();
        for variable in self.statements.iter().flat_map(StatementPattern::variables) {
            if !result.contains(&variable) {
                result.push(variable);
            }
        }
        result
    }
}
