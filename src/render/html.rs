use serde_json::Value;

use crate::error::Error;
use crate::model::{ModelValue, ResultModel};

use super::{OutputRender, ResponseSlot};

/// Renders an HTML fragment.
///
/// Only two model keys are read: `content` becomes the body verbatim and
/// `headers` is merged into the response headers. Errors are not rendered;
/// the fragment is expected to present its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRender;

impl HtmlRender {
    /// Registered render name.
    pub const NAME: &'static str = "html-part-render";

    /// Creates the renderer.
    pub fn new() -> Self {
        Self
    }
}

impl OutputRender for HtmlRender {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn content_type(&self) -> &'static str {
        "text/html; charset=UTF-8"
    }

    fn render_model(
        &self,
        model: &mut dyn ResultModel,
        slot: &mut ResponseSlot,
    ) -> Result<(), Error> {
        let response = slot.get_or_insert();

        for item in model.pairs() {
            let (key, value) = match item {
                Ok(pair) => pair,
                Err(aborted) => {
                    tracing::warn!(render = Self::NAME, "model production aborted: {}", aborted);
                    break;
                }
            };

            match (key.as_str(), value) {
                ("content", ModelValue::Markup(node)) => {
                    response.set_body(node.to_xml_string().into_bytes());
                }
                ("content", ModelValue::Data(data)) => match scalar_text(data) {
                    Some(text) => response.set_body(text.into_bytes()),
                    None => tracing::warn!(render = Self::NAME, "content is not a scalar"),
                },
                ("headers", ModelValue::Data(Value::Object(headers))) => {
                    for (name, value) in headers {
                        let Some(text) = scalar_text(value) else {
                            continue;
                        };
                        if !response.set_header(&name, &text) {
                            tracing::warn!(render = Self::NAME, header = %name, "invalid header skipped");
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if b { "1" } else { "" }.to_string()),
        Value::Null => Some(String::new()),
        Value::Array(_) | Value::Object(_) => None,
    }
}
