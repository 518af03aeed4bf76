//! Result models.
//!
//! A result model is the per-request container an action fills and a
//! renderer consumes: ordered key/value pairs plus the diagnostics that
//! accumulated while producing them.
//!
//! - [`ApiModel`]: eager container, filled by direct assignment.
//! - [`LazyModel`]: wraps a producer that yields pairs on demand and traps
//!   the diagnostics it raises while doing so.
//! - [`HtmlModelAdapter`]: convenience view for HTML fragment actions.

mod eager;
mod html;
mod lazy;

pub use eager::ApiModel;
pub use html::{HtmlModelAdapter, AUTOLOAD_MARKER};
pub use lazy::{LazyModel, Produced};

use serde_json::Value;

use crate::diagnostic::{Diagnostic, ReportMask};
use crate::render::XmlNode;
use crate::trap::{Aborted, ErrorSink};

/// A value stored in a result model.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelValue {
    /// Plain data: scalars, arrays and objects.
    Data(Value),
    /// Prebuilt markup that the XML renderer attaches verbatim.
    Markup(XmlNode),
}

impl ModelValue {
    /// Converts the value into JSON.
    ///
    /// Markup is serialized to its XML text.
    pub fn into_json(self) -> Value {
        match self {
            ModelValue::Data(value) => value,
            ModelValue::Markup(node) => Value::String(node.to_xml_string()),
        }
    }

    /// Returns the plain data, if this is not markup.
    pub fn as_data(&self) -> Option<&Value> {
        match self {
            ModelValue::Data(value) => Some(value),
            ModelValue::Markup(_) => None,
        }
    }
}

impl From<Value> for ModelValue {
    fn from(value: Value) -> Self {
        ModelValue::Data(value)
    }
}

impl From<XmlNode> for ModelValue {
    fn from(node: XmlNode) -> Self {
        ModelValue::Markup(node)
    }
}

macro_rules! data_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for ModelValue {
                fn from(value: $t) -> Self {
                    ModelValue::Data(Value::from(value))
                }
            }
        )*
    };
}

data_from!(&str, String, bool, i32, i64, u32, u64, f64);

/// A key/value pair produced by a model.
pub type Pair = (String, ModelValue);

/// The consuming pair sequence of a model.
///
/// An `Err` item means production was aborted; nothing follows it.
pub type Pairs<'a> = Box<dyn Iterator<Item = Result<Pair, Aborted>> + 'a>;

/// Capabilities shared by every result model.
pub trait ResultModel: ErrorSink {
    /// Appends a pair, overwriting an existing key in place.
    fn insert(&mut self, key: String, value: ModelValue);

    /// Merges pairs in order, overwriting on key collision.
    fn merge(&mut self, pairs: Vec<Pair>) {
        for (key, value) in pairs {
            self.insert(key, value);
        }
    }

    /// Records a diagnostic error.
    fn add_error(&mut self, error: Diagnostic) {
        self.record(error);
    }

    /// Errors recorded so far, in insertion order.
    fn errors(&self) -> &[Diagnostic];

    /// Restricts which severity codes are recorded while pairs are produced.
    ///
    /// Models that produce nothing lazily ignore it.
    fn set_report_mask(&mut self, _mask: ReportMask) {}

    /// Consumes the model's pairs.
    ///
    /// The sequence can be taken once; later calls yield nothing.
    fn pairs(&mut self) -> Pairs<'_>;
}

/// Returns `true` if the key reads as a number.
///
/// Such keys cannot be XML element names.
pub(crate) fn is_numeric_key(key: &str) -> bool {
    let trimmed = key.trim_matches(|c: char| c.is_ascii_whitespace() || c == '\x0b');
    trimmed.bytes().any(|b| b.is_ascii_digit())
        && !trimmed.bytes().any(|b| b.is_ascii_alphabetic() && b != b'e' && b != b'E')
        && trimmed.parse::<f64>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_keys() {
        assert!(is_numeric_key("0"));
        assert!(is_numeric_key("42"));
        assert!(is_numeric_key("-1.5"));
        assert!(is_numeric_key("1e3"));
        assert!(!is_numeric_key("item1"));
        assert!(!is_numeric_key("inf"));
        assert!(!is_numeric_key(""));
        assert!(!is_numeric_key("e"));
    }

    #[test]
    fn numeric_keys_allow_surrounding_whitespace() {
        assert!(is_numeric_key("1 "));
        assert!(is_numeric_key(" 2\t"));
        assert!(is_numeric_key("\n3.5\n"));
        assert!(!is_numeric_key(" "));
        assert!(!is_numeric_key("1 2"));
    }

    #[test]
    fn markup_becomes_xml_text_in_json() {
        let mut el = crate::render::XmlElement::new("b");
        el.set_text("bold");
        let value = ModelValue::from(XmlNode::Element(el));
        assert_eq!(value.into_json(), Value::String("<b>bold</b>".to_string()));
    }
}
