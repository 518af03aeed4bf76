use std::fmt;

use indexmap::IndexMap;

use crate::diagnostic::{Diagnostic, Failure, Raised, ReportMask};
use crate::trap::{Aborted, DiagnosticTrap, ErrorSink};

use super::{ModelValue, Pair, Pairs, ResultModel};

/// One step of lazy production.
#[derive(Debug, Clone)]
pub enum Produced {
    /// A key/value pair for the model.
    Pair(String, ModelValue),
    /// A diagnostic raised while producing.
    Diagnostic(Raised),
    /// A failure that ends production.
    Failure(Failure),
}

impl Produced {
    /// Shorthand for [`Produced::Pair`].
    pub fn pair(key: impl Into<String>, value: impl Into<ModelValue>) -> Self {
        Produced::Pair(key.into(), value.into())
    }
}

impl From<Raised> for Produced {
    fn from(raised: Raised) -> Self {
        Produced::Diagnostic(raised)
    }
}

impl From<Failure> for Produced {
    fn from(failure: Failure) -> Self {
        Produced::Failure(failure)
    }
}

type Source = Box<dyn Iterator<Item = Produced>>;
type Producer = Box<dyn FnOnce() -> Source>;

/// Result model whose pairs come from a producer run during consumption.
///
/// The producer is not called until the first pair is pulled. While it
/// runs, a diagnostic trap records what it raises:
///
/// - diagnostics up to `Warning` are recorded and production continues;
/// - anything above `Warning` is recorded and the sequence yields one
///   `Err(Aborted)`, then ends;
/// - a [`Produced::Failure`] is recorded as an `Exception` error and
///   quietly ends the sequence.
///
/// Pairs inserted directly with [`ResultModel::insert`] come before the
/// produced ones.
///
/// # Examples
///
/// ```
/// use api_render::{LazyModel, Produced, Raised, ResultModel};
///
/// let mut model = LazyModel::new(|| {
///     vec![
///         Produced::pair("a", 1),
///         Raised::warning("slow path").into(),
///         Produced::pair("b", 2),
///     ]
/// });
///
/// let pairs: Vec<_> = model.pairs().collect();
/// assert_eq!(pairs.len(), 2);
/// assert_eq!(model.errors().len(), 1);
/// ```
pub struct LazyModel {
    producer: Option<Producer>,
    inserted: IndexMap<String, ModelValue>,
    errors: Vec<Diagnostic>,
    mask: ReportMask,
}

impl LazyModel {
    /// Wraps a producer.
    pub fn new<F, I>(producer: F) -> Self
    where
        F: FnOnce() -> I + 'static,
        I: IntoIterator<Item = Produced>,
        I::IntoIter: 'static,
    {
        Self {
            producer: Some(Box::new(move || Box::new(producer().into_iter()) as Source)),
            inserted: IndexMap::new(),
            errors: Vec::new(),
            mask: ReportMask::ALL,
        }
    }

    /// Restricts which severity codes the trap reports.
    pub fn with_report_mask(mut self, mask: ReportMask) -> Self {
        self.mask = mask;
        self
    }
}

impl fmt::Debug for LazyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyModel")
            .field("pending", &self.producer.is_some())
            .field("inserted", &self.inserted.len())
            .field("errors", &self.errors.len())
            .finish()
    }
}

impl ErrorSink for LazyModel {
    fn record(&mut self, diagnostic: Diagnostic) {
        self.errors.push(diagnostic);
    }
}

impl ResultModel for LazyModel {
    fn insert(&mut self, key: String, value: ModelValue) {
        self.inserted.insert(key, value);
    }

    fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    fn set_report_mask(&mut self, mask: ReportMask) {
        self.mask = mask;
    }

    fn pairs(&mut self) -> Pairs<'_> {
        let inserted = std::mem::take(&mut self.inserted).into_iter();
        let producer = self.producer.take();
        Box::new(Production {
            inserted,
            producer,
            source: None,
            finished: false,
            trap: DiagnosticTrap::install(&mut self.errors, self.mask, "lazy-model"),
        })
    }
}

/// Pull-based production sequence. Owns the trap for its whole life.
struct Production<'a> {
    inserted: indexmap::map::IntoIter<String, ModelValue>,
    producer: Option<Producer>,
    source: Option<Source>,
    finished: bool,
    trap: DiagnosticTrap<'a, Vec<Diagnostic>>,
}

impl Production<'_> {
    fn finish(&mut self) {
        self.finished = true;
        self.producer = None;
        self.source = None;
    }
}

impl Iterator for Production<'_> {
    type Item = Result<Pair, Aborted>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(pair) = self.inserted.next() {
            return Some(Ok(pair));
        }
        if self.finished {
            return None;
        }
        if let Some(start) = self.producer.take() {
            self.source = Some(start());
        }

        loop {
            let step = match self.source.as_mut() {
                Some(source) => source.next(),
                None => None,
            };

            match step {
                Some(Produced::Pair(key, value)) => return Some(Ok((key, value))),
                Some(Produced::Diagnostic(raised)) => {
                    if let Err(aborted) = self.trap.raise(raised) {
                        self.finish();
                        return Some(Err(aborted));
                    }
                }
                Some(Produced::Failure(failure)) => {
                    self.trap.absorb(failure);
                    self.finish();
                    return None;
                }
                None => {
                    self.finish();
                    return None;
                }
            }
        }
    }
}
