use crate::error::{Error, Result};
use smallvec::SmallVec;
use sorted_iter::assume::AssumeSortedByItemExt;
use sorted_iter::sorted_iterator::SortedByItem;
use sorted_iter::SortedIterator;
use std::collections::HashMap;
use std::iter;

/// Whether a variable takes real values or one of a fixed list of categories.
#[derive(Clone, Debug, PartialEq)]
pub enum VariableKind {
    /// A real-valued variable.
    Continuous,
    /// A categorical variable. Data cells hold the index of a category in this list.
    Discrete {
        /// The category labels, in order.
        categories: Vec<String>,
    },
}

/// A named variable.
///
/// Two variables with the same name are the same variable as far as every test in this crate is
/// concerned, so a query can be built from a clone of a variable taken from any source sharing
/// the same universe of names.
#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    name: String,
    kind: VariableKind,
}

impl Variable {
    /// Creates a continuous variable.
    pub fn continuous(name: impl Into<String>) -> Self {
        Variable {
            name: name.into(),
            kind: VariableKind::Continuous,
        }
    }

    /// Creates a discrete variable with the given category labels.
    ///
    /// ```
    /// use indtest::Variable;
    ///
    /// let v = Variable::discrete("weather", &["sun", "rain"]);
    /// assert_eq!(v.num_categories(), 2);
    /// assert_eq!(v.category(1), Some("rain"));
    /// ```
    pub fn discrete<S: AsRef<str>>(name: impl Into<String>, categories: &[S]) -> Self {
        Variable {
            name: name.into(),
            kind: VariableKind::Discrete {
                categories: categories.iter().map(|c| c.as_ref().to_owned()).collect(),
            },
        }
    }

    /// The variable's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is a continuous or a discrete variable.
    pub fn kind(&self) -> &VariableKind {
        &self.kind
    }

    /// Returns `true` for continuous variables.
    pub fn is_continuous(&self) -> bool {
        self.kind == VariableKind::Continuous
    }

    /// Returns `true` for discrete variables.
    pub fn is_discrete(&self) -> bool {
        !self.is_continuous()
    }

    /// Number of categories of a discrete variable, or 0 for a continuous one.
    pub fn num_categories(&self) -> usize {
        match &self.kind {
            VariableKind::Continuous => 0,
            VariableKind::Discrete { categories } => categories.len(),
        }
    }

    /// Label of the category with the given index.
    pub fn category(&self, index: usize) -> Option<&str> {
        match &self.kind {
            VariableKind::Continuous => None,
            VariableKind::Discrete { categories } => categories.get(index).map(String::as_str),
        }
    }

    /// Replaces the category list, turning this into a discrete variable if it wasn't one.
    pub fn set_categories<S: AsRef<str>>(&mut self, categories: &[S]) {
        self.kind = VariableKind::Discrete {
            categories: categories.iter().map(|c| c.as_ref().to_owned()).collect(),
        };
    }
}

impl std::fmt::Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// An ordered list of uniquely-named variables with constant-time lookup by name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Variables {
    list: Vec<Variable>,
    index: HashMap<String, usize>,
}

impl Variables {
    /// Builds the lookup table, rejecting duplicate names.
    pub fn new(list: Vec<Variable>) -> Result<Self> {
        let mut index = HashMap::with_capacity(list.len());
        for (i, variable) in list.iter().enumerate() {
            if index.insert(variable.name.clone(), i).is_some() {
                return Err(Error::DuplicateVariable(variable.name.clone()));
            }
        }
        Ok(Variables { list, index })
    }

    /// Appends a variable, returning its index.
    pub fn push(&mut self, variable: Variable) -> Result<usize> {
        let i = self.list.len();
        if self.index.contains_key(&variable.name) {
            return Err(Error::DuplicateVariable(variable.name));
        }
        self.index.insert(variable.name.clone(), i);
        self.list.push(variable);
        Ok(i)
    }

    /// All variables, in column order.
    pub fn as_slice(&self) -> &[Variable] {
        &self.list
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Returns `true` if there are no variables.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Looks a variable up by name.
    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.index.get(name).map(|&i| &self.list[i])
    }

    /// Finds the column index of a variable.
    pub fn index_of(&self, variable: &Variable) -> Result<usize> {
        self.index_of_name(variable.name())
    }

    /// Finds the column index of a variable by name.
    pub fn index_of_name(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownVariable(name.to_owned()))
    }

    /// Resolves a list of variables to column indices, preserving order.
    ///
    /// Fails if the list is empty or names a variable outside this universe.
    pub fn indices_of(&self, variables: &[Variable]) -> Result<Vec<usize>> {
        if variables.is_empty() {
            return Err(Error::EmptyVariableList);
        }
        variables.iter().map(|v| self.index_of(v)).collect()
    }

    /// Resolves an independence query to column indices.
    pub fn resolve(
        &self,
        x: &Variable,
        y: &Variable,
        z: &[Variable],
    ) -> Result<(usize, usize, ConditioningSet)> {
        let x = self.index_of(x)?;
        let y = self.index_of(y)?;
        let z = z
            .iter()
            .map(|v| self.index_of(v))
            .collect::<Result<ConditioningSet>>()?;
        Ok((x, y, z))
    }
}

/// A set of column indices to condition on.
///
/// Like any set, it's okay to construct one from a list with duplicates; they're dropped. The
/// indices are kept sorted, which doesn't change any statistic since every test here is invariant
/// to the order of its conditioning variables, but lets two sets be compared in linear time.
///
/// Conditioning sets are almost always tiny, so this avoids heap allocations for sets of up to
/// four variables.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ConditioningSet(SmallVec<[usize; 4]>);

impl ConditioningSet {
    /// Creates a conditioning set containing the specified indices.
    pub fn new(indices: &[usize]) -> Self {
        indices.iter().copied().collect()
    }

    /// The number of variables in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the set is empty, meaning the query is about marginal independence.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns an iterator over the indices in this set, in ascending order.
    ///
    /// ```
    /// use indtest::ConditioningSet;
    ///
    /// let z = ConditioningSet::new(&[4, 2, 4]);
    /// assert_eq!(z.iter().collect::<Vec<_>>(), vec![2, 4]);
    /// ```
    pub fn iter(&self) -> impl Iterator<Item = usize> + SortedByItem + Clone + '_ {
        self.0.iter().copied().assume_sorted_by_item()
    }

    /// Returns `true` if the index is in this set.
    pub fn contains(&self, index: usize) -> bool {
        self.0.binary_search(&index).is_ok()
    }

    /// Returns `true` if no index appears in both sets.
    ///
    /// ```
    /// use indtest::ConditioningSet;
    ///
    /// let a = ConditioningSet::new(&[1, 3]);
    /// assert!(a.is_disjoint(&ConditioningSet::new(&[0, 2])));
    /// assert!(!a.is_disjoint(&ConditioningSet::new(&[3])));
    /// ```
    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.iter().intersection(other.iter()).next().is_none()
    }

    /// Returns the union of two sets.
    pub fn union(&self, other: &Self) -> Self {
        self.iter().union(other.iter()).collect()
    }

    /// The indices of a query, laid out the way every covariance-based test wants its submatrix:
    /// `x` first, `y` second, then the conditioning set.
    pub fn with_pair(&self, x: usize, y: usize) -> SmallVec<[usize; 6]> {
        let mut all = SmallVec::with_capacity(self.len() + 2);
        all.push(x);
        all.push(y);
        all.extend(self.iter());
        all
    }
}

impl iter::FromIterator<usize> for ConditioningSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut v = SmallVec::from_iter(iter);
        v.sort_unstable();
        v.dedup();
        ConditioningSet(v)
    }
}
