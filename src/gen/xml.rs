//! A small DOM over quick-xml's event reader.
//!
//! The schema documents are tiny, so they are materialized into an element
//! tree up front; the generator then navigates attributes, ordered child
//! instructions, and text content at will.

use quick_xml::events::Event;
use quick_xml::Reader;

use super::GenError;

const INSTRUCTION_NAMES: &[&str] = &[
    "field", "array", "length", "dummy", "switch", "chunked", "break",
];

/// An XML element: a name, its attributes, and its child nodes in document
/// order.
#[derive(Clone, Debug)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

/// A child node of an [`Element`].
#[derive(Clone, Debug)]
pub enum Node {
    /// A nested element
    Element(Element),
    /// A run of character data
    Text(String),
}

impl Element {
    /// Parses an XML document and returns its root element.
    pub fn parse(text: &str) -> Result<Element, String> {
        let mut reader = Reader::from_str(text);
        reader.trim_text(true);

        let mut stack: Vec<Element> = Vec::new();

        loop {
            match reader.read_event().map_err(|e| e.to_string())? {
                Event::Start(start) => {
                    stack.push(Self::from_start(&start)?);
                }
                Event::Empty(start) => {
                    let element = Self::from_start(&start)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Element(element)),
                        None => return Ok(element),
                    }
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| "unmatched end tag".to_owned())?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Element(element)),
                        None => return Ok(element),
                    }
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(|e| e.to_string())?;
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::Text(text.into_owned()));
                    }
                }
                Event::CData(data) => {
                    let text = String::from_utf8_lossy(&data).into_owned();
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::Text(text));
                    }
                }
                Event::Eof => return Err("missing root element".to_owned()),
                _ => {}
            }
        }
    }

    fn from_start(start: &quick_xml::events::BytesStart) -> Result<Element, String> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Vec::new();

        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| e.to_string())?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute
                .unescape_value()
                .map_err(|e| e.to_string())?
                .into_owned();
            attributes.push((key, value));
        }

        Ok(Element {
            name,
            attributes,
            children: Vec::new(),
        })
    }

    /// Returns the element's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the element's child elements, in document order.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// Returns the child elements with the given name, in document order.
    pub fn find_all(&self, name: &str) -> Vec<&Element> {
        self.child_elements()
            .filter(|element| element.name == name)
            .collect()
    }

    /// Returns the child elements that are protocol instructions.
    pub fn instructions(&self) -> Vec<&Element> {
        self.child_elements()
            .filter(|element| INSTRUCTION_NAMES.contains(&element.name.as_str()))
            .collect()
    }

    /// Returns the text of the element's `<comment>` child, if present.
    pub fn comment(&self) -> Option<String> {
        self.child_elements()
            .find(|element| element.name == "comment")
            .and_then(|element| element.text().ok().flatten())
    }

    /// Returns the element's trimmed text content, or `None` if there is
    /// none.
    ///
    /// Fails if text appears in more than one place among the children.
    pub fn text(&self) -> Result<Option<String>, GenError> {
        let mut result: Option<String> = None;

        for node in &self.children {
            if let Node::Text(text) = node {
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                if result.is_some() {
                    return Err(GenError::UnexpectedText(text.to_owned()));
                }
                result = Some(text.to_owned());
            }
        }

        Ok(result)
    }

    /// Returns the value of the named attribute, if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns the value of the named attribute, or an error if it is
    /// missing.
    pub fn required_attr(&self, name: &str) -> Result<&str, GenError> {
        self.attr(name).ok_or_else(|| GenError::MissingAttribute {
            element: self.name.clone(),
            attribute: name.to_owned(),
        })
    }

    /// Returns the named attribute interpreted as an integer, or
    /// `default_value` if it is absent.
    pub fn int_attr(&self, name: &str, default_value: i32) -> Result<i32, GenError> {
        match self.attr(name) {
            Some(value) => value.trim().parse().map_err(|_| GenError::InvalidAttribute {
                attribute: name.to_owned(),
                value: value.to_owned(),
            }),
            None => Ok(default_value),
        }
    }

    /// Returns the named attribute interpreted as a boolean.
    ///
    /// Any value other than `true` (case-insensitive) is false; an absent
    /// attribute yields `default_value`.
    pub fn bool_attr(&self, name: &str, default_value: bool) -> bool {
        match self.attr(name) {
            Some(value) => value.eq_ignore_ascii_case("true"),
            None => default_value,
        }
    }
}

/// Parses the value as an integer, yielding `None` for anything that is not
/// a numeric literal.
pub(crate) fn try_parse_int(value: &str) -> Option<u32> {
    value.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_document() {
        let root = Element::parse(
            r#"<protocol>
                <enum name="AdminLevel" type="char">
                    <value name="Player">0</value>
                </enum>
                <struct name="Coords">
                    <field name="x" type="char"/>
                    <field name="y" type="char"/>
                </struct>
            </protocol>"#,
        )
        .unwrap();

        assert_eq!(root.name(), "protocol");
        assert_eq!(root.find_all("enum").len(), 1);
        assert_eq!(root.find_all("struct").len(), 1);

        let protocol_enum = root.find_all("enum")[0];
        assert_eq!(protocol_enum.required_attr("name").unwrap(), "AdminLevel");
        assert_eq!(
            protocol_enum.find_all("value")[0].text().unwrap().as_deref(),
            Some("0")
        );

        let protocol_struct = root.find_all("struct")[0];
        assert_eq!(protocol_struct.instructions().len(), 2);
    }

    #[test]
    fn parse_unescapes_entities() {
        let root = Element::parse(r#"<field name="q">&lt;&amp;&gt;</field>"#).unwrap();
        assert_eq!(root.text().unwrap().as_deref(), Some("<&>"));
    }

    #[test]
    fn parse_rejects_malformed_document() {
        assert!(Element::parse("<protocol><enum></protocol>").is_err());
        assert!(Element::parse("").is_err());
    }

    #[test]
    fn text_around_children() {
        let root = Element::parse("<dummy>0<comment>ignored</comment></dummy>").unwrap();
        assert_eq!(root.text().unwrap().as_deref(), Some("0"));
        assert_eq!(root.comment().as_deref(), Some("ignored"));
    }

    #[test]
    fn text_in_multiple_places_is_rejected() {
        let root = Element::parse("<dummy>0<comment>c</comment>1</dummy>").unwrap();
        assert!(root.text().is_err());
    }

    #[test]
    fn instructions_filters_unknown_elements() {
        let root = Element::parse(
            "<struct><comment>c</comment><field type=\"char\">1</field><break/></struct>",
        )
        .unwrap();
        let instructions = root.instructions();
        assert_eq!(instructions.len(), 2);
        assert_eq!(instructions[0].name(), "field");
        assert_eq!(instructions[1].name(), "break");
    }

    #[test]
    fn attributes() {
        let root =
            Element::parse("<array name=\"items\" length=\"4\" delimited=\"TRUE\"/>").unwrap();
        assert_eq!(root.attr("name"), Some("items"));
        assert_eq!(root.int_attr("length", 0).unwrap(), 4);
        assert_eq!(root.int_attr("offset", 0).unwrap(), 0);
        assert!(root.bool_attr("delimited", false));
        assert!(!root.bool_attr("optional", false));
        assert!(root.required_attr("type").is_err());
        assert!(root.int_attr("name", 0).is_err());
    }
}
