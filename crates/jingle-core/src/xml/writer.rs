use std::io::Cursor;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::Element;

pub(super) fn write(element: &Element) -> String {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    write_element(&mut writer, element, None);
    String::from_utf8_lossy(&writer.into_inner().into_inner()).into_owned()
}

// Writing into an in-memory cursor cannot fail, so io results are dropped.
fn write_element(writer: &mut Writer<Cursor<Vec<u8>>>, element: &Element, parent_ns: Option<&str>) {
    let mut start = BytesStart::new(element.name.as_str());
    if let Some(ns) = element.ns.as_deref() {
        if parent_ns != Some(ns) {
            start.push_attribute(("xmlns", ns));
        }
    }
    for (key, value) in &element.attrs {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() && element.text.is_none() {
        let _ = writer.write_event(Event::Empty(start));
        return;
    }

    let _ = writer.write_event(Event::Start(start));
    if let Some(text) = element.text.as_deref() {
        let _ = writer.write_event(Event::Text(BytesText::new(text)));
    }
    for child in &element.children {
        write_element(writer, child, element.ns.as_deref());
    }
    let _ = writer.write_event(Event::End(BytesEnd::new(element.name.as_str())));
}
