use oxrdf::{Term, Variable};
use std::fmt;
use std::fmt::{Display, Formatter};

/// An immutable mapping from query variables to RDF terms.
///
/// The bindings are kept sorted by variable name. As a result, two binding sets that bind the same
/// variables to the same terms are equal and hash equally, independent of the order in which the
/// bindings have been added.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BindingSet {
    bindings: Vec<(Variable, Term)>,
}

impl BindingSet {
    /// Creates an empty [BindingSet].
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new binding set that additionally binds `variable` to `term`.
    ///
    /// An existing binding of `variable` is replaced.
    #[must_use]
    pub fn with(mut self, variable: Variable, term: impl Into<Term>) -> Self {
        let term = term.into();
        match self.position(&variable) {
            Ok(idx) => self.bindings[idx].1 = term,
            Err(idx) => self.bindings.insert(idx, (variable, term)),
        }
        self
    }

    /// Returns the term bound to `variable`, if any.
    pub fn get(&self, variable: &Variable) -> Option<&Term> {
        self.position(variable)
            .ok()
            .map(|idx| &self.bindings[idx].1)
    }

    /// Returns whether `variable` is bound.
    pub fn contains(&self, variable: &Variable) -> bool {
        self.position(variable).is_ok()
    }

    /// The number of bound variables.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` if no variable is bound.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Iterates over the bindings, ordered by variable name.
    pub fn iter(&self) -> impl Iterator<Item = (&Variable, &Term)> {
        self.bindings.iter().map(|(v, t)| (v, t))
    }

    /// Iterates over the bound variables, ordered by variable name.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.bindings.iter().map(|(v, _)| v)
    }

    /// Merges two compatible binding sets.
    ///
    /// Returns [None] if both sets bind a shared variable to different terms.
    pub fn merge(&self, other: &BindingSet) -> Option<BindingSet> {
        let mut result = self.clone();
        for (variable, term) in &other.bindings {
            match result.get(variable) {
                Some(existing) if existing != term => return None,
                Some(_) => {}
                None => result = result.with(variable.clone(), term.clone()),
            }
        }
        Some(result)
    }

    /// Restricts the binding set to the given `variables`.
    #[must_use]
    pub fn project(&self, variables: &[Variable]) -> BindingSet {
        let bindings = self
            .bindings
            .iter()
            .filter(|(v, _)| variables.contains(v))
            .cloned()
            .collect();
        Self { bindings }
    }

    fn position(&self, variable: &Variable) -> Result<usize, usize> {
        self.bindings
            .binary_search_by(|(v, _)| v.as_str().cmp(variable.as_str()))
    }
}

impl FromIterator<(Variable, Term)> for BindingSet {
    fn from_iter<T: IntoIterator<Item = (Variable, Term)>>(iter: T) -> Self {
        iter.into_iter()
            .fold(BindingSet::new(), |acc, (v, t)| acc.with(v, t))
    }
}

impl Display for BindingSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, (variable, term)) in self.bindings.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{}={term}", variable.as_str())?;
        }
        f.write_str("]")
    }
}
