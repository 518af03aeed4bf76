use serde_json::Value;

use crate::diagnostic::{Diagnostic, Raised};
use crate::error::Error;
use crate::model::{is_numeric_key, ModelValue, ResultModel};

use super::markup::{is_valid_name, strip_illegal_chars, XmlDocument, XmlElement, XmlNode};
use super::{OutputRender, ResponseSlot};

/// Tag used in place of numeric keys, which are not valid element names.
pub const NUMBER_TAG_NAME: &str = "ITEM";

/// Renders the model as an XML document rooted at `<response>`.
///
/// The root carries `success="YES"` and the response status `code`. When
/// the model has errors, an `<errors>` element becomes the first child,
/// holding one element per error named after its kind (`WARNING`,
/// `FATAL`, ...).
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlRender;

impl XmlRender {
    /// Registered render name.
    pub const NAME: &'static str = "xml-render";

    /// Creates the renderer.
    pub fn new() -> Self {
        Self
    }
}

impl OutputRender for XmlRender {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn content_type(&self) -> &'static str {
        "text/xml; charset=utf-8"
    }

    fn render_model(
        &self,
        model: &mut dyn ResultModel,
        slot: &mut ResponseSlot,
    ) -> Result<(), Error> {
        let mut root = XmlElement::new("response");
        root.set_attribute("success", "YES");

        let mut skipped = Vec::new();
        for item in model.pairs() {
            match item {
                Ok((key, value)) => insert_value(&mut root, &key, value, &mut skipped),
                Err(aborted) => {
                    tracing::warn!(render = Self::NAME, "model production aborted: {}", aborted);
                    break;
                }
            }
        }
        for diagnostic in skipped {
            model.add_error(diagnostic);
        }

        let response = slot.get_or_insert();
        let errors = model.errors();
        if !errors.is_empty() {
            let mut list = XmlElement::new("errors");
            for error in errors {
                let mut entry = XmlElement::new(error.kind().tag());
                entry.set_attribute("code", error.code().to_string());
                entry.set_attribute("file", error.file());
                entry.set_attribute("line", error.line().to_string());
                entry.set_text(error.message());
                list.append(entry);
            }
            root.prepend(list);
        }
        root.set_attribute("code", response.status().as_u16().to_string());

        response.set_body(XmlDocument::new(root).to_xml_string().into_bytes());
        Ok(())
    }
}

fn insert_value(parent: &mut XmlElement, key: &str, value: ModelValue, skipped: &mut Vec<Diagnostic>) {
    match value {
        ModelValue::Markup(node) => parent.append(node),
        ModelValue::Data(data) => insert_data(parent, key, data, skipped),
    }
}

fn insert_data(parent: &mut XmlElement, key: &str, data: Value, skipped: &mut Vec<Diagnostic>) {
    let name = if is_numeric_key(key) {
        NUMBER_TAG_NAME
    } else {
        key
    };
    if !is_valid_name(name) {
        skip(key, skipped);
        return;
    }

    let mut element = XmlElement::new(name);
    match data {
        Value::Null => {
            skip(key, skipped);
            return;
        }
        Value::Bool(b) => element.set_text(if b { "1" } else { "" }),
        Value::Number(n) => element.set_text(n.to_string()),
        Value::String(s) => match strip_illegal_chars(&s) {
            Some(clean) => {
                tracing::warn!(render = XmlRender::NAME, key, "illegal characters dropped");
                skipped.push(Diagnostic::from_raised(Raised::warning(format!(
                    "Dropped characters not allowed in xml from value for key {}",
                    key
                ))));
                element.set_text(clean);
            }
            None => element.set_text(s),
        },
        Value::Array(items) => {
            for (index, item) in items.into_iter().enumerate() {
                insert_data(&mut element, &index.to_string(), item, skipped);
            }
        }
        Value::Object(map) => {
            for (k, v) in map {
                insert_data(&mut element, &k, v, skipped);
            }
        }
    }
    parent.append(XmlNode::Element(element));
}

fn skip(key: &str, skipped: &mut Vec<Diagnostic>) {
    tracing::warn!(render = XmlRender::NAME, key, "value skipped");
    skipped.push(Diagnostic::from_raised(Raised::warning(format!(
        "Can not render value for key {} into xml response",
        key
    ))));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{ErrorKind, Failure};
    use crate::model::{ApiModel, LazyModel, Produced};
    use crate::response::Response;
    use http::StatusCode;
    use serde_json::json;

    fn render(model: &mut dyn ResultModel, slot: &mut ResponseSlot) -> String {
        XmlRender::new().render(model, slot).unwrap();
        let body = slot.response().unwrap().body().to_vec();
        String::from_utf8(body).unwrap()
    }

    #[test]
    fn renders_scalars_and_nested_values() {
        let mut model = ApiModel::new();
        model.set("name", "Alice");
        model.set("tags", json!(["a", "b"]));
        model.set("meta", json!({"age": 30, "admin": true}));

        let xml = render(&mut model, &mut ResponseSlot::default());
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <response success=\"YES\" code=\"200\">\n  \
             <name>Alice</name>\n  \
             <tags>\n    <ITEM>a</ITEM>\n    <ITEM>b</ITEM>\n  </tags>\n  \
             <meta>\n    <age>30</age>\n    <admin>1</admin>\n  </meta>\n\
             </response>\n"
        );
    }

    #[test]
    fn errors_element_is_first_child() {
        let mut model = ApiModel::new();
        model.set("first", 1);
        model.add_error(Diagnostic::from(
            Raised::warning("watch out").at(crate::diagnostic::Location::new("a.rs", 4)),
        ));
        model.add_error(Diagnostic::from(
            Failure::new("crashed").with_code(9).at(crate::diagnostic::Location::new("b.rs", 8)),
        ));

        let mut slot = ResponseSlot::default();
        render(&mut model, &mut slot);
        let body = String::from_utf8(slot.response().unwrap().body().to_vec()).unwrap();
        assert!(body.contains(
            "<response success=\"YES\" code=\"200\">\n  <errors>\n    \
             <WARNING code=\"512\" file=\"a.rs\" line=\"4\">watch out</WARNING>\n    \
             <EXCEPTION code=\"9\" file=\"b.rs\" line=\"8\">crashed</EXCEPTION>\n  \
             </errors>\n  <first>1</first>"
        ));
    }

    #[test]
    fn control_characters_are_dropped_with_a_warning() {
        let mut model = ApiModel::new();
        model.set("note", "a\u{1}b");
        model.set("plain", "tab\there");

        let xml = render(&mut model, &mut ResponseSlot::default());
        assert!(xml.contains("<note>ab</note>"));
        assert!(xml.contains("<plain>tab\there</plain>"));
        assert!(!xml.contains('\u{1}'));
        assert_eq!(model.errors().len(), 1);
        assert_eq!(model.errors()[0].kind(), ErrorKind::Warning);
        assert_eq!(
            model.errors()[0].message(),
            "Dropped characters not allowed in xml from value for key note"
        );
    }

    #[test]
    fn numeric_top_level_key_becomes_item() {
        let mut model = ApiModel::new();
        model.set("7", "seven");
        let xml = render(&mut model, &mut ResponseSlot::default());
        assert!(xml.contains("<ITEM>seven</ITEM>"));
        assert!(!xml.contains("<7>"));
    }

    #[test]
    fn markup_values_are_attached_verbatim() {
        let mut custom = XmlElement::new("custom");
        custom.set_attribute("kind", "raw");
        let mut model = ApiModel::new();
        model.set("ignored-key", XmlNode::Element(custom));

        let xml = render(&mut model, &mut ResponseSlot::default());
        assert!(xml.contains("<custom kind=\"raw\"/>"));
        assert!(!xml.contains("ignored-key"));
    }

    #[test]
    fn null_values_are_skipped_with_warning() {
        let mut model = ApiModel::new();
        model.set("nothing", Value::Null);
        model.set("bad name", 1);

        let xml = render(&mut model, &mut ResponseSlot::default());
        assert!(!xml.contains("<nothing"));
        assert_eq!(model.errors().len(), 2);
        assert!(model.errors().iter().all(|e| e.kind() == ErrorKind::Warning));
        assert!(xml.contains("Can not render value for key nothing into xml response"));
    }

    #[test]
    fn code_attribute_reflects_response_status() {
        let mut slot = ResponseSlot::new(Some(Response::with_status(StatusCode::ACCEPTED)));
        let xml = render(&mut ApiModel::new(), &mut slot);
        assert!(xml.contains("<response success=\"YES\" code=\"202\"/>"));
    }

    #[test]
    fn success_attribute_is_constant_even_on_fatal() {
        let mut model = LazyModel::new(|| vec![Raised::error("boom").into(), Produced::pair("x", 1)]);
        let xml = render(&mut model, &mut ResponseSlot::default());
        assert!(xml.contains("success=\"YES\""));
        assert!(xml.contains("<FATAL"));
        assert!(!xml.contains("<x>"));
    }
}
