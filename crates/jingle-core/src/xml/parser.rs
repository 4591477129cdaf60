use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::Element;
use crate::errors::{JingleError, Result};

/// Prefix → namespace declarations visible at one nesting level
type Scope = HashMap<String, String>;

pub(super) fn parse(xml: &str) -> Result<Element> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut scopes: Vec<Scope> = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let (element, scope) = open_element(&start, &scopes)?;
                scopes.push(scope);
                stack.push(element);
            }
            Event::Empty(start) => {
                let (element, _) = open_element(&start, &scopes)?;
                attach(element, &mut stack, &mut root)?;
            }
            Event::End(_) => {
                scopes.pop();
                let element = stack
                    .pop()
                    .ok_or_else(|| JingleError::xml("unbalanced end tag"))?;
                attach(element, &mut stack, &mut root)?;
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    let text = text.unescape()?;
                    append_text(current, &text);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    let raw = data.into_inner();
                    append_text(current, &String::from_utf8_lossy(&raw));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(JingleError::xml("unexpected end of document"));
    }
    root.ok_or_else(|| JingleError::xml("document has no root element"))
}

fn open_element(start: &BytesStart<'_>, scopes: &[Scope]) -> Result<(Element, Scope)> {
    let qname = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| JingleError::xml(e.to_string()))?
        .to_owned();

    let mut scope = Scope::new();
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| JingleError::xml(e.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| JingleError::xml(e.to_string()))?
            .to_owned();
        let value = attr.unescape_value()?.into_owned();

        if key == "xmlns" {
            scope.insert(String::new(), value);
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            scope.insert(prefix.to_owned(), value);
        } else {
            attrs.push((key, value));
        }
    }

    let (prefix, local) = match qname.split_once(':') {
        Some((prefix, local)) => (prefix.to_owned(), local.to_owned()),
        None => (String::new(), qname),
    };

    let ns = scope
        .get(&prefix)
        .cloned()
        .or_else(|| scopes.iter().rev().find_map(|s| s.get(&prefix).cloned()));

    if ns.is_none() && !prefix.is_empty() {
        return Err(JingleError::xml(format!("undeclared namespace prefix '{}'", prefix)));
    }

    let mut element = match ns {
        Some(ns) => Element::with_ns(local, ns),
        None => Element::new(local),
    };
    for (key, value) in attrs {
        element.set_attr(key, value);
    }
    Ok((element, scope))
}

fn attach(element: Element, stack: &mut [Element], root: &mut Option<Element>) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(JingleError::xml("multiple root elements")),
    }
}

fn append_text(element: &mut Element, text: &str) {
    match element.text.as_mut() {
        Some(existing) => existing.push_str(text),
        None => element.text = Some(text.to_owned()),
    }
}
