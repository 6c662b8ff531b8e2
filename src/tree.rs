//! Parsed job tree: the ordered nested-mapping shape a Jenkins `config.xml`
//! is converted into before template resolution.
//!
//! Every node is either a scalar leaf or an ordered mapping of child tags to
//! nodes. Attributes become scalar entries alongside child elements; element
//! text next to attributes or children is kept under the `#text` key. Repeated
//! sibling tags keep the last occurrence.

use hashlink::LinkedHashMap;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("malformed XML")]
    Syntax(#[from] quick_xml::Error),
    #[error("malformed attribute")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("text is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("document has no root element")]
    NoRoot,
    #[error("content after the root element")]
    MultipleRoots,
}

/// A single node of the parsed tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JobNode {
    Scalar(String),
    Map(LinkedHashMap<String, JobNode>),
}

impl JobNode {
    pub fn is_map(&self) -> bool {
        matches!(self, JobNode::Map(_))
    }
}

/// One parsed job: the root tag name and its node.
#[derive(Debug, Clone, PartialEq)]
pub struct JobTree {
    pub root_tag: String,
    pub root: JobNode,
}

struct Frame {
    name: String,
    children: LinkedHashMap<String, JobNode>,
    text: String,
}

impl Frame {
    fn close(self) -> (String, JobNode) {
        let text = self.text.trim();
        let node = if self.children.is_empty() {
            if text.is_empty() {
                JobNode::Map(LinkedHashMap::new())
            } else {
                JobNode::Scalar(text.to_string())
            }
        } else {
            let mut children = self.children;
            if !text.is_empty() {
                children.insert("#text".to_string(), JobNode::Scalar(text.to_string()));
            }
            JobNode::Map(children)
        };
        (self.name, node)
    }
}

/// Parses XML text into a [`JobTree`], preserving document order of sibling
/// tags. The document must contain exactly one root element.
pub fn parse_tree(xml: &str) -> Result<JobTree, XmlError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<(String, JobNode)> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                if root.is_some() && stack.is_empty() {
                    return Err(XmlError::MultipleRoots);
                }
                stack.push(open_frame(&start)?);
            }
            Event::Empty(start) => {
                if root.is_some() && stack.is_empty() {
                    return Err(XmlError::MultipleRoots);
                }
                let (name, node) = open_frame(&start)?.close();
                attach(&mut stack, &mut root, name, node);
            }
            Event::End(_) => {
                // Reader checks that end tags match, so the stack is non-empty here.
                if let Some(frame) = stack.pop() {
                    let (name, node) = frame.close();
                    attach(&mut stack, &mut root, name, node);
                }
            }
            Event::Text(text) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(cdata) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(std::str::from_utf8(&cdata)?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let (root_tag, root) = root.ok_or(XmlError::NoRoot)?;
    Ok(JobTree { root_tag, root })
}

fn open_frame(start: &quick_xml::events::BytesStart<'_>) -> Result<Frame, XmlError> {
    let name = std::str::from_utf8(start.name().as_ref())?.to_string();
    let mut children = LinkedHashMap::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
        let value = attr.unescape_value()?.into_owned();
        children.insert(key, JobNode::Scalar(value));
    }
    Ok(Frame {
        name,
        children,
        text: String::new(),
    })
}

fn attach(
    stack: &mut Vec<Frame>,
    root: &mut Option<(String, JobNode)>,
    name: String,
    node: JobNode,
) {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.insert(name, node);
        }
        None => *root = Some((name, node)),
    }
}
