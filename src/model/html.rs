use std::fmt;

use serde_json::{Map, Value};

use super::{ApiModel, ModelValue};

/// Content placeholder that asks the page to auto-include the fragment.
pub const AUTOLOAD_MARKER: &str = "## SKY_AUTOLOAD ##";

/// View over an [`ApiModel`] for actions that answer with an HTML fragment.
///
/// Writes go to the two keys the HTML renderer reads: `content` and
/// `headers`. Implements [`fmt::Write`], so `write!` captures formatted
/// output straight into the content.
///
/// # Examples
///
/// ```
/// use std::fmt::Write;
/// use api_render::{ApiModel, HtmlModelAdapter};
///
/// let mut model = ApiModel::new();
/// let mut html = HtmlModelAdapter::new(&mut model);
/// html.set_content("<ul>");
/// write!(html, "<li>{}</li>", 1).unwrap();
/// html.add_content("</ul>");
/// html.add_header("X-Fragment", "list");
///
/// assert_eq!(html.content(), Some("<ul><li>1</li></ul>"));
/// ```
#[derive(Debug)]
pub struct HtmlModelAdapter<'a> {
    model: &'a mut ApiModel,
}

impl<'a> HtmlModelAdapter<'a> {
    /// Wraps a model.
    pub fn new(model: &'a mut ApiModel) -> Self {
        Self { model }
    }

    /// The wrapped model.
    pub fn model(&mut self) -> &mut ApiModel {
        self.model
    }

    /// The current content, if it is a string.
    pub fn content(&self) -> Option<&str> {
        self.model
            .get("content")
            .and_then(ModelValue::as_data)
            .and_then(Value::as_str)
    }

    /// Appends HTML to the content.
    pub fn add_content(&mut self, html: &str) -> &mut Self {
        let mut content = self.content().unwrap_or_default().to_string();
        content.push_str(html);
        self.model.set("content", content);
        self
    }

    /// Replaces the content.
    pub fn set_content(&mut self, html: impl Into<String>) -> &mut Self {
        self.model.set("content", html.into());
        self
    }

    /// Sets a response header, replacing one with the same name.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let mut headers = match self.model.get("headers").and_then(ModelValue::as_data) {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        headers.insert(name.into(), Value::String(value.into()));
        self.model.set("headers", Value::Object(headers));
        self
    }

    /// Replaces the content with the auto-include marker.
    pub fn make_auto_include_header(&mut self) {
        self.set_content(AUTOLOAD_MARKER);
    }
}

impl fmt::Write for HtmlModelAdapter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.add_content(s);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn headers_accumulate_and_overwrite() {
        let mut model = ApiModel::new();
        {
            let mut html = HtmlModelAdapter::new(&mut model);
            html.add_header("X-A", "1").add_header("X-B", "2").add_header("X-A", "3");
        }
        assert_eq!(
            model.get("headers"),
            Some(&ModelValue::Data(json!({"X-A": "3", "X-B": "2"})))
        );
    }

    #[test]
    fn auto_include_replaces_content() {
        let mut model = ApiModel::new();
        let mut html = HtmlModelAdapter::new(&mut model);
        html.set_content("<p>old</p>");
        html.make_auto_include_header();
        assert_eq!(html.content(), Some(AUTOLOAD_MARKER));
    }

    #[test]
    fn add_content_starts_from_empty() {
        let mut model = ApiModel::new();
        HtmlModelAdapter::new(&mut model).add_content("<b>hi</b>");
        assert_eq!(
            model.get("content"),
            Some(&ModelValue::Data(json!("<b>hi</b>")))
        );
    }
}
