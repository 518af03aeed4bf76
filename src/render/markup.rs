//! Minimal XML node tree used by the XML renderer.
//!
//! Output follows the usual formatted-DOM layout: two-space indentation,
//! elements holding text are written on one line, empty elements are
//! self-closed.

use std::fmt::Write as _;

/// A node of an XML tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    /// An element.
    Element(XmlElement),
    /// Character data.
    Text(String),
    /// A document fragment; its children are attached in its place.
    Fragment(Vec<XmlNode>),
}

impl XmlNode {
    /// Serializes the node without a prolog.
    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        write_node(&mut out, self, 0, false);
        out
    }
}

impl From<XmlElement> for XmlNode {
    fn from(element: XmlElement) -> Self {
        XmlNode::Element(element)
    }
}

/// An XML element with ordered attributes and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl XmlElement {
    /// Creates an empty element.
    ///
    /// The name is not validated; see [`is_valid_name`].
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Element name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets an attribute, replacing an existing one in place.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Returns an attribute value.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Replaces all children with a single text node.
    ///
    /// Empty text leaves the element empty.
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.children.clear();
        if !text.is_empty() {
            self.children.push(XmlNode::Text(text));
        }
    }

    /// Appends a child.
    pub fn append(&mut self, node: impl Into<XmlNode>) {
        self.children.push(node.into());
    }

    /// Inserts a child before all existing children.
    pub fn prepend(&mut self, node: impl Into<XmlNode>) {
        self.children.insert(0, node.into());
    }

    /// Children in document order.
    pub fn children(&self) -> &[XmlNode] {
        &self.children
    }

    /// Child elements, looking through fragments.
    pub fn child_elements(&self) -> Vec<&XmlElement> {
        let mut out = Vec::new();
        collect_elements(&self.children, &mut out);
        out
    }

    /// Concatenated text of all descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

/// A document with a single root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    root: XmlElement,
}

impl XmlDocument {
    /// Creates a document around its root element.
    pub fn new(root: XmlElement) -> Self {
        Self { root }
    }

    /// The root element.
    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    /// Serializes with the UTF-8 prolog and a trailing newline.
    pub fn to_xml_string(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        write_element(&mut out, &self.root, 0, true);
        out.push('\n');
        out
    }
}

/// Returns `true` if `name` is usable as an element name.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_' || first == ':')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.'))
}

fn collect_elements<'a>(nodes: &'a [XmlNode], out: &mut Vec<&'a XmlElement>) {
    for node in nodes {
        match node {
            XmlNode::Element(el) => out.push(el),
            XmlNode::Fragment(children) => collect_elements(children, out),
            XmlNode::Text(_) => {}
        }
    }
}

fn collect_text(nodes: &[XmlNode], out: &mut String) {
    for node in nodes {
        match node {
            XmlNode::Text(t) => out.push_str(t),
            XmlNode::Element(el) => collect_text(&el.children, out),
            XmlNode::Fragment(children) => collect_text(children, out),
        }
    }
}

fn has_text(nodes: &[XmlNode]) -> bool {
    nodes.iter().any(|n| match n {
        XmlNode::Text(_) => true,
        XmlNode::Fragment(children) => has_text(children),
        XmlNode::Element(_) => false,
    })
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn write_node(out: &mut String, node: &XmlNode, depth: usize, pretty: bool) {
    match node {
        XmlNode::Element(el) => write_element(out, el, depth, pretty),
        XmlNode::Text(text) => escape_text(out, text),
        XmlNode::Fragment(children) => {
            for (i, child) in children.iter().enumerate() {
                if pretty && i > 0 {
                    out.push('\n');
                }
                write_node(out, child, depth, pretty);
            }
        }
    }
}

fn write_element(out: &mut String, el: &XmlElement, depth: usize, pretty: bool) {
    if pretty {
        indent(out, depth);
    }
    out.push('<');
    out.push_str(&el.name);
    for (name, value) in &el.attributes {
        let _ = write!(out, " {}=\"", name);
        escape_attribute(out, value);
        out.push('"');
    }

    if el.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');

    // Mixed content is written as-is so no whitespace leaks into the text.
    if !pretty || has_text(&el.children) {
        for child in &el.children {
            write_node(out, child, 0, false);
        }
    } else {
        for child in &el.children {
            out.push('\n');
            write_node(out, child, depth + 1, true);
        }
        out.push('\n');
        indent(out, depth);
    }

    out.push_str("</");
    out.push_str(&el.name);
    out.push('>');
}

/// Returns `true` if XML 1.0 allows `c` in character data.
pub(crate) fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n'
            | '\r'
            | '\u{20}'..='\u{D7FF}'
            | '\u{E000}'..='\u{FFFD}'
            | '\u{10000}'..='\u{10FFFF}'
    )
}

/// Removes characters XML 1.0 cannot carry. Returns `None` if none were found.
pub(crate) fn strip_illegal_chars(text: &str) -> Option<String> {
    if text.chars().all(is_xml_char) {
        return None;
    }
    Some(text.chars().filter(|c| is_xml_char(*c)).collect())
}

fn escape_text(out: &mut String, text: &str) {
    for c in text.chars().filter(|c| is_xml_char(*c)) {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#13;"),
            c => out.push(c),
        }
    }
}

fn escape_attribute(out: &mut String, value: &str) {
    for c in value.chars().filter(|c| is_xml_char(*c)) {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            c => out.push(c),
        }
    }
}
