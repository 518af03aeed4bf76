//! Format renderers.
//!
//! Every renderer consumes a [`ResultModel`] exactly once and writes the
//! payload into the single response of the request cycle: the one already
//! held by the [`ResponseSlot`], or a fresh one if the slot is empty.

mod html;
mod json;
mod markup;
mod xml;

pub use html::HtmlRender;
pub use json::JsonRender;
pub use markup::{is_valid_name, XmlDocument, XmlElement, XmlNode};
pub use xml::{XmlRender, NUMBER_TAG_NAME};

use std::fmt;

use http::header::CONTENT_TYPE;
use http::HeaderValue;
use serde::Deserialize;

use crate::config::ApiConfig;
use crate::error::Error;
use crate::model::ResultModel;
use crate::response::Response;

/// Holds the outbound response of one request cycle.
#[derive(Debug, Default)]
pub struct ResponseSlot {
    response: Option<Response>,
}

impl ResponseSlot {
    /// Creates a slot, optionally around an already attached response.
    pub fn new(response: Option<Response>) -> Self {
        Self { response }
    }

    /// The attached response, if any.
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// Returns the attached response, attaching a fresh one if absent.
    pub fn get_or_insert(&mut self) -> &mut Response {
        self.response.get_or_insert_with(Response::new)
    }

    /// Takes the response out, creating one if none was attached.
    pub fn into_response(self) -> Response {
        self.response.unwrap_or_default()
    }
}

/// A renderer turning a result model into a wire payload.
pub trait OutputRender {
    /// Registered render name.
    fn name(&self) -> &'static str;

    /// Content type of the produced payload.
    fn content_type(&self) -> &'static str;

    /// Writes the model into the slot's response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if the payload cannot be encoded.
    fn render_model(&self, model: &mut dyn ResultModel, slot: &mut ResponseSlot)
        -> Result<(), Error>;

    /// Renders the model and labels the response with the renderer's
    /// content type, replacing any type set before.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`render_model`](Self::render_model).
    fn render(&self, model: &mut dyn ResultModel, slot: &mut ResponseSlot) -> Result<(), Error> {
        tracing::debug!(render = self.name(), "rendering model");
        self.render_model(model, slot)?;
        slot.get_or_insert()
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(self.content_type()));
        Ok(())
    }
}

/// The available renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum RenderKind {
    /// JSON document
    #[default]
    #[serde(rename = "json-render")]
    Json,
    /// XML document
    #[serde(rename = "xml-render")]
    Xml,
    /// HTML fragment
    #[serde(rename = "html-part-render")]
    Html,
}

impl RenderKind {
    /// The registered render name.
    pub fn name(self) -> &'static str {
        match self {
            RenderKind::Json => JsonRender::NAME,
            RenderKind::Xml => XmlRender::NAME,
            RenderKind::Html => HtmlRender::NAME,
        }
    }

    /// Looks a renderer up by its registered name.
    pub fn from_name(name: &str) -> Option<Self> {
        [RenderKind::Json, RenderKind::Xml, RenderKind::Html]
            .into_iter()
            .find(|kind| kind.name() == name)
    }

    /// Builds the renderer, configured from `config`.
    pub fn renderer(self, config: &ApiConfig) -> Box<dyn OutputRender> {
        match self {
            RenderKind::Json => Box::new(JsonRender::new().escape_unicode(config.escape_unicode)),
            RenderKind::Xml => Box::new(XmlRender::new()),
            RenderKind::Html => Box::new(HtmlRender::new()),
        }
    }
}

impl fmt::Display for RenderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
