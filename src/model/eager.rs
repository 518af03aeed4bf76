use indexmap::IndexMap;

use crate::diagnostic::Diagnostic;
use crate::trap::{Aborted, ErrorSink};

use super::{ModelValue, Pair, Pairs, ResultModel};

/// Eager result model filled by direct assignment.
///
/// Keys keep their first insertion position; assigning an existing key
/// overwrites the value in place.
///
/// # Examples
///
/// ```
/// use api_render::{ApiModel, ModelValue, ResultModel};
///
/// let mut model = ApiModel::new();
/// model.set("test", 23);
/// model.add_array([("other", ModelValue::from(55)), ("my", ModelValue::from("Hello"))]);
///
/// let keys: Vec<String> = model.pairs().map(|p| p.unwrap().0).collect();
/// assert_eq!(keys, ["test", "other", "my"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ApiModel {
    values: IndexMap<String, ModelValue>,
    errors: Vec<Diagnostic>,
}

impl ApiModel {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns a value to a key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ModelValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Bulk-merges pairs, overwriting on key collision.
    pub fn add_array<K, I>(&mut self, pairs: I)
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, ModelValue)>,
    {
        for (key, value) in pairs {
            self.values.insert(key.into(), value);
        }
    }

    /// Returns the value for a key.
    pub fn get(&self, key: &str) -> Option<&ModelValue> {
        self.values.get(key)
    }

    /// Returns a mutable reference to the value for a key.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut ModelValue> {
        self.values.get_mut(key)
    }

    /// Returns `true` if the key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the model holds no pairs.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ErrorSink for ApiModel {
    fn record(&mut self, diagnostic: Diagnostic) {
        self.errors.push(diagnostic);
    }
}

impl ResultModel for ApiModel {
    fn insert(&mut self, key: String, value: ModelValue) {
        self.values.insert(key, value);
    }

    fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    fn pairs(&mut self) -> Pairs<'_> {
        let values = std::mem::take(&mut self.values);
        Box::new(values.into_iter().map(Ok::<Pair, Aborted>))
    }
}
