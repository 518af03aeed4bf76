use std::io;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::ser::{Formatter, PrettyFormatter};
use serde_json::{json, Value};

use crate::diagnostic::ErrorKind;
use crate::error::Error;
use crate::model::ResultModel;

use super::{OutputRender, ResponseSlot};

/// Renders the model as a pretty-printed JSON object.
///
/// The object holds the model pairs in order, then `errors` and `success`.
/// Those two keys are always last and replace model keys of the same
/// name. `success` turns `false` only for `Fatal` errors; `Exception`
/// errors leave it `true`.
///
/// # Examples
///
/// ```
/// use api_render::{ApiModel, JsonRender, ModelValue, OutputRender, ResponseSlot};
///
/// let mut model = ApiModel::new();
/// model.set("test", 23);
/// model.add_array([("other", ModelValue::from(55)), ("my", ModelValue::from("Hello"))]);
///
/// let mut slot = ResponseSlot::default();
/// JsonRender::new().render(&mut model, &mut slot).unwrap();
///
/// let body = String::from_utf8(slot.into_response().body().to_vec()).unwrap();
/// assert_eq!(
///     body,
///     "{\n    \"test\": 23,\n    \"other\": 55,\n    \"my\": \"Hello\",\n    \"errors\": [],\n    \"success\": true\n}"
/// );
/// ```
#[derive(Debug, Clone, Copy)]
pub struct JsonRender {
    escape_unicode: bool,
}

impl JsonRender {
    /// Registered render name.
    pub const NAME: &'static str = "json-render";

    /// Creates a renderer that escapes non-ASCII characters.
    pub fn new() -> Self {
        Self {
            escape_unicode: true,
        }
    }

    /// Chooses whether non-ASCII characters are written as `\uXXXX`.
    pub fn escape_unicode(mut self, escape: bool) -> Self {
        self.escape_unicode = escape;
        self
    }

    /// Encodes an ordered document with this renderer's formatting.
    fn encode<T: Serialize>(&self, document: &T) -> Result<Vec<u8>, serde_json::Error> {
        let mut buf = Vec::new();
        let formatter = WireFormatter::new(self.escape_unicode);
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        document.serialize(&mut serializer)?;
        Ok(buf)
    }
}

impl Default for JsonRender {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputRender for JsonRender {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn render_model(
        &self,
        model: &mut dyn ResultModel,
        slot: &mut ResponseSlot,
    ) -> Result<(), Error> {
        let mut data: IndexMap<String, Value> = IndexMap::new();
        for item in model.pairs() {
            match item {
                Ok((key, value)) => {
                    data.insert(key, value.into_json());
                }
                Err(aborted) => {
                    tracing::warn!(render = Self::NAME, "model production aborted: {}", aborted);
                    break;
                }
            }
        }

        data.shift_remove("errors");
        data.shift_remove("success");

        let mut success = true;
        let mut errors = Vec::with_capacity(model.errors().len());
        for error in model.errors() {
            errors.push(json!({
                "level": error.kind().level(),
                "code": error.code(),
                "message": error.message(),
                "file": error.file(),
                "line": error.line(),
            }));
            if error.kind() == ErrorKind::Fatal {
                success = false;
            }
        }
        data.insert("errors".to_string(), Value::Array(errors));
        data.insert("success".to_string(), Value::Bool(success));

        let payload = self.encode(&data)?;
        slot.get_or_insert().set_body(payload);
        Ok(())
    }
}

/// Four-space pretty printing with optional `\uXXXX` escaping.
///
/// Forward slashes are never escaped.
struct WireFormatter {
    pretty: PrettyFormatter<'static>,
    escape_unicode: bool,
}

impl WireFormatter {
    fn new(escape_unicode: bool) -> Self {
        Self {
            pretty: PrettyFormatter::with_indent(b"    "),
            escape_unicode,
        }
    }
}

impl Formatter for WireFormatter {
    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_array(writer)
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.pretty.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_object(writer)
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.pretty.begin_object_key(writer, first)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_object_value(writer)
    }

    fn write_string_fragment<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        if !self.escape_unicode || fragment.is_ascii() {
            return writer.write_all(fragment.as_bytes());
        }

        let mut units = [0u16; 2];
        for c in fragment.chars() {
            if c.is_ascii() {
                writer.write_all(&[c as u8])?;
            } else {
                for unit in c.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}
