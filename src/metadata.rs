//! Lossless XML metadata documents and the streaming-optimization flag.
//!
//! Package descriptors and `ComicInfo.xml` files are kept as the exact
//! sequence of parser events they were read from, plus the encoding they
//! were decoded from. Writing the events back reproduces the input byte for
//! byte (minus a leading BOM), so every element and attribute this crate does
//! not model survives a rewrite untouched. The only edit ever made is
//! [`XmlDocument::mark_optimized_for_streaming`].
//!
//! UTF-16 documents are the exception: they are written as UTF-8 and their
//! declaration says so.

use quick_xml::Reader;
use quick_xml::Writer;
use encoding_rs::Encoding;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};

use crate::error::{Error, Result};
use crate::util::{decode_document_with_encoding, local_name};

/// Namespace of the `ArchiveFileInfo` element.
pub const ARCHIVE_FILE_INFO_NS: &str = "http://www.codedread.com/sop";

/// Element carrying the streaming flag.
pub const ARCHIVE_FILE_INFO: &str = "ArchiveFileInfo";

/// Attribute set to `"true"` once a book has been reordered.
pub const OPTIMIZED_FOR_STREAMING: &str = "optimizedForStreaming";

/// Where a newly created `ArchiveFileInfo` element goes inside the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagPlacement {
    FirstChild,
    LastChild,
}

/// An XML document held as its raw event stream.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    events: Vec<Event<'static>>,
    encoding: &'static Encoding,
}

impl XmlDocument {
    /// Parse a document without trimming or normalizing anything.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let (content, encoding) = decode_document_with_encoding(bytes);
        let mut reader = Reader::from_str(&content);

        let mut events = Vec::new();
        loop {
            match reader.read_event() {
                Ok(Event::Eof) => break,
                Ok(event) => events.push(event.into_owned()),
                Err(e) => return Err(Error::Xml(e)),
            }
        }

        let doc = Self { events, encoding };
        if doc.root_index().is_none() {
            return Err(Error::Structural("XML document has no root element".into()));
        }
        Ok(doc)
    }

    /// An empty document consisting of `<name></name>`.
    pub fn with_root(name: &str) -> Self {
        Self {
            events: vec![
                Event::Start(BytesStart::new(name.to_string())),
                Event::End(BytesEnd::new(name.to_string())),
            ],
            encoding: encoding_rs::UTF_8,
        }
    }

    pub fn events(&self) -> &[Event<'static>] {
        &self.events
    }

    /// Local name of the root element.
    pub fn root_name(&self) -> Option<&[u8]> {
        let idx = self.root_index()?;
        match &self.events[idx] {
            Event::Start(e) | Event::Empty(e) => Some(local_name(e.name().into_inner())),
            _ => None,
        }
    }

    /// Encoding the document was read as.
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Serialize the events back to bytes in the document's own encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let output = self.encoding.output_encoding();
        let transcoded = output != self.encoding;

        let mut writer = Writer::new(Vec::new());
        for event in &self.events {
            match event {
                Event::Decl(decl) if transcoded => {
                    writer.write_event(Event::Decl(utf8_decl(decl)))?
                }
                _ => writer.write_event(event.clone())?,
            }
        }

        let bytes = writer.into_inner();
        if output == encoding_rs::UTF_8 {
            return Ok(bytes);
        }
        let text = String::from_utf8_lossy(&bytes);
        let (encoded, _, _) = output.encode(&text);
        Ok(encoded.into_owned())
    }

    /// Whether the root carries `ArchiveFileInfo optimizedForStreaming="true"`.
    pub fn is_optimized_for_streaming(&self) -> bool {
        self.archive_file_info_index()
            .and_then(|idx| match &self.events[idx] {
                Event::Start(e) | Event::Empty(e) => e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.as_ref() == OPTIMIZED_FOR_STREAMING.as_bytes())
                    .map(|a| a.value.as_ref() == b"true"),
                _ => None,
            })
            .unwrap_or(false)
    }

    /// Set the streaming flag, creating `ArchiveFileInfo` if needed.
    ///
    /// An existing `ArchiveFileInfo` child of the root keeps its position,
    /// children and other attributes; only `optimizedForStreaming` changes.
    pub fn mark_optimized_for_streaming(&mut self, placement: FlagPlacement) {
        if let Some(idx) = self.archive_file_info_index() {
            let updated = match &self.events[idx] {
                Event::Start(e) => Event::Start(with_streaming_attr(e)),
                Event::Empty(e) => Event::Empty(with_streaming_attr(e)),
                _ => return,
            };
            self.events[idx] = updated;
            return;
        }

        let Some(root) = self.root_index() else {
            return;
        };

        // <root/> has nowhere to put a child; expand it to <root></root>.
        if let Event::Empty(e) = &self.events[root] {
            let name = String::from_utf8_lossy(e.name().into_inner()).into_owned();
            let start = e.clone().into_owned();
            self.events[root] = Event::Start(start);
            self.events.insert(root + 1, Event::End(BytesEnd::new(name)));
        }

        let mut flag = BytesStart::new(ARCHIVE_FILE_INFO);
        flag.push_attribute(("xmlns", ARCHIVE_FILE_INFO_NS));
        flag.push_attribute((OPTIMIZED_FOR_STREAMING, "true"));
        let flag = Event::Empty(flag);

        let at = match placement {
            FlagPlacement::FirstChild => root + 1,
            FlagPlacement::LastChild => self.root_end_index(root).unwrap_or(root + 1),
        };
        self.events.insert(at, flag);
    }

    fn root_index(&self) -> Option<usize> {
        self.events
            .iter()
            .position(|e| matches!(e, Event::Start(_) | Event::Empty(_)))
    }

    /// Index of the `End` event closing the root element.
    fn root_end_index(&self, root: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (idx, event) in self.events.iter().enumerate().skip(root) {
            match event {
                Event::Start(_) => depth += 1,
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Some(idx);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Index of an `ArchiveFileInfo` element directly under the root.
    fn archive_file_info_index(&self) -> Option<usize> {
        let root = self.root_index()?;
        let mut depth = 0usize;
        for (idx, event) in self.events.iter().enumerate().skip(root) {
            match event {
                Event::Start(e) => {
                    if depth == 1 && is_archive_file_info(e) {
                        return Some(idx);
                    }
                    depth += 1;
                }
                Event::Empty(e) if depth == 1 && is_archive_file_info(e) => return Some(idx),
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
        }
        None
    }
}

/// `decl` with its `encoding` pseudo-attribute set to UTF-8.
fn utf8_decl(decl: &BytesDecl<'_>) -> BytesDecl<'static> {
    let version = decl
        .version()
        .map(|v| String::from_utf8_lossy(&v).into_owned())
        .unwrap_or_else(|_| "1.0".to_string());
    let standalone = decl
        .standalone()
        .and_then(|s| s.ok())
        .map(|s| String::from_utf8_lossy(&s).into_owned());
    BytesDecl::new(&version, Some("UTF-8"), standalone.as_deref())
}

fn is_archive_file_info(e: &BytesStart<'_>) -> bool {
    local_name(e.name().into_inner()) == ARCHIVE_FILE_INFO.as_bytes()
}

/// Copy of `e` with `optimizedForStreaming="true"`, other attributes in order.
fn with_streaming_attr(e: &BytesStart<'_>) -> BytesStart<'static> {
    let name = String::from_utf8_lossy(e.name().into_inner()).into_owned();
    let mut updated = BytesStart::new(name);
    let mut replaced = false;
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == OPTIMIZED_FOR_STREAMING.as_bytes() {
            updated.push_attribute((OPTIMIZED_FOR_STREAMING, "true"));
            replaced = true;
        } else {
            updated.push_attribute(attr);
        }
    }
    if !replaced {
        updated.push_attribute((OPTIMIZED_FOR_STREAMING, "true"));
    }
    updated
}
