use quick_xml::events::Event;
use quick_xml::Reader;

use crate::local_name;
use crate::package::OpcError;

/// One `<Relationship>` entry from a `.rels` part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub type_uri: String,
    pub target: String,
    pub target_mode: Option<String>,
}

impl Relationship {
    pub fn is_external(&self) -> bool {
        self.target_mode
            .as_deref()
            .is_some_and(|mode| mode.eq_ignore_ascii_case("External"))
    }

    /// `true` when the relationship type ends with `/{kind}` (e.g. `worksheet`, `header`).
    pub fn has_kind(&self, kind: &str) -> bool {
        self.type_uri
            .rsplit('/')
            .next()
            .is_some_and(|last| last.eq_ignore_ascii_case(kind))
    }
}

pub fn parse_relationships(xml: &[u8]) -> Result<Vec<Relationship>, OpcError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut relationships = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) | Event::Empty(start)
                if local_name(start.name().as_ref()).eq_ignore_ascii_case(b"Relationship") =>
            {
                let mut id = None;
                let mut target = None;
                let mut type_uri = None;
                let mut target_mode = None;
                for attr in start.attributes() {
                    let attr = attr?;
                    let value = attr.unescape_value()?.into_owned();
                    match local_name(attr.key.as_ref()) {
                        b"Id" => id = Some(value),
                        b"Target" => target = Some(value),
                        b"Type" => type_uri = Some(value),
                        b"TargetMode" => target_mode = Some(value),
                        _ => {}
                    }
                }
                if let (Some(id), Some(target), Some(type_uri)) = (id, target, type_uri) {
                    relationships.push(Relationship {
                        id,
                        type_uri,
                        target,
                        target_mode,
                    });
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(relationships)
}
