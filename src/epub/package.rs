//! EPUB package model: `META-INF/container.xml` and the OPF package document.

use std::collections::HashMap;

use log::warn;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Error, Result};
use crate::metadata::{FlagPlacement, XmlDocument};
use crate::util::{decode_document, local_name, parent_dir};

/// A `<rootfile>` declaration from container.xml.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootFile {
    pub full_path: String,
    pub media_type: String,
}

/// Parsed container.xml, reduced to the single package it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerPointer {
    pub root_file: RootFile,
}

impl ContainerPointer {
    /// Archive-relative path of the package document.
    pub fn package_path(&self) -> &str {
        &self.root_file.full_path
    }
}

/// Parse META-INF/container.xml.
///
/// Exactly one `<rootfile>` must be declared; zero or several is a
/// structural error rather than a guess.
pub fn parse_container(bytes: &[u8]) -> Result<ContainerPointer> {
    let content = decode_document(bytes);
    let mut reader = Reader::from_str(&content);
    reader.config_mut().trim_text(true);

    let mut root_files = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if local_name(e.name().as_ref()) == b"rootfile" =>
            {
                root_files.push(RootFile {
                    full_path: attr_value(&e, b"full-path")?.unwrap_or_default(),
                    media_type: attr_value(&e, b"media-type")?.unwrap_or_default(),
                });
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    if root_files.len() != 1 {
        return Err(Error::Structural(format!(
            "container.xml declares {} <rootfile> elements, expected exactly 1",
            root_files.len()
        )));
    }

    let root_file = root_files.remove(0);
    if root_file.full_path.is_empty() {
        return Err(Error::Structural(
            "container.xml <rootfile> has no full-path".into(),
        ));
    }

    Ok(ContainerPointer { root_file })
}

/// A manifest `<item>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
    pub properties: Option<String>,
}

impl ManifestItem {
    /// XHTML or HTML content documents, which get scanned for resources.
    pub fn is_markup(&self) -> bool {
        let media_type = self
            .media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim();
        media_type.eq_ignore_ascii_case("application/xhtml+xml")
            || media_type.eq_ignore_ascii_case("text/html")
    }
}

/// Manifest items in document order, addressable by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    items: Vec<ManifestItem>,
    by_id: HashMap<String, usize>,
}

impl Manifest {
    /// Add an item. The first declaration of an id wins.
    pub fn insert(&mut self, item: ManifestItem) -> bool {
        if self.by_id.contains_key(&item.id) {
            return false;
        }
        self.by_id.insert(item.id.clone(), self.items.len());
        self.items.push(item);
        true
    }

    pub fn get(&self, id: &str) -> Option<&ManifestItem> {
        self.by_id.get(id).map(|&idx| &self.items[idx])
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A spine `<itemref>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineItem {
    pub idref: String,
    /// False for `linear="no"`.
    pub linear: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Spine {
    /// NCX manifest id from `<spine toc="...">`.
    pub toc: Option<String>,
    pub items: Vec<SpineItem>,
}

/// A parsed OPF package document.
///
/// The typed manifest and spine are read from the same event stream that is
/// kept in `document`, so writing the package back only changes what
/// [`Package::mark_optimized_for_streaming`] changes.
#[derive(Debug, Clone)]
pub struct Package {
    /// Archive-relative path of the OPF file.
    pub path: String,
    pub version: Option<String>,
    pub manifest: Manifest,
    pub spine: Spine,
    document: XmlDocument,
}

impl Package {
    /// Directory that manifest hrefs are relative to.
    pub fn base_dir(&self) -> &str {
        parent_dir(&self.path)
    }

    pub fn document(&self) -> &XmlDocument {
        &self.document
    }

    pub fn mark_optimized_for_streaming(&mut self) {
        self.document
            .mark_optimized_for_streaming(FlagPlacement::LastChild);
    }

    pub fn is_optimized_for_streaming(&self) -> bool {
        self.document.is_optimized_for_streaming()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.document.to_bytes()
    }
}

/// Parse an OPF package document located at `path` inside the archive.
pub fn parse_package(bytes: &[u8], path: &str) -> Result<Package> {
    let document = XmlDocument::parse(bytes)?;
    if document.root_name() != Some(&b"package"[..]) {
        return Err(Error::Structural(format!(
            "{path} root element is not <package>"
        )));
    }

    let mut version = None;
    let mut manifest = Manifest::default();
    let mut spine = Spine::default();
    let mut seen_manifest = false;
    let mut seen_spine = false;
    let mut in_manifest = false;
    let mut in_spine = false;

    for event in document.events() {
        match event {
            Event::Start(e) | Event::Empty(e) => {
                let is_start = matches!(event, Event::Start(_));
                match local_name(e.name().as_ref()) {
                    b"package" => version = attr_value(e, b"version")?,
                    b"manifest" => {
                        seen_manifest = true;
                        in_manifest = is_start;
                    }
                    b"spine" => {
                        seen_spine = true;
                        in_spine = is_start;
                        spine.toc = attr_value(e, b"toc")?;
                    }
                    b"item" if in_manifest => {
                        let Some(id) = attr_value(e, b"id")? else {
                            warn!("{path}: manifest <item> without id ignored");
                            continue;
                        };
                        let item = ManifestItem {
                            id,
                            href: attr_value(e, b"href")?.unwrap_or_default(),
                            media_type: attr_value(e, b"media-type")?.unwrap_or_default(),
                            properties: attr_value(e, b"properties")?,
                        };
                        let id = item.id.clone();
                        if !manifest.insert(item) {
                            warn!("{path}: duplicate manifest id '{id}', keeping the first");
                        }
                    }
                    b"itemref" if in_spine => {
                        let Some(idref) = attr_value(e, b"idref")? else {
                            warn!("{path}: spine <itemref> without idref ignored");
                            continue;
                        };
                        let linear = attr_value(e, b"linear")?.is_none_or(|v| v.trim() != "no");
                        spine.items.push(SpineItem { idref, linear });
                    }
                    _ => {}
                }
            }
            Event::End(e) => match local_name(e.name().as_ref()) {
                b"manifest" => in_manifest = false,
                b"spine" => in_spine = false,
                _ => {}
            },
            _ => {}
        }
    }

    if !seen_manifest {
        return Err(Error::Structural(format!("{path} has no <manifest>")));
    }
    if !seen_spine {
        return Err(Error::Structural(format!("{path} has no <spine>")));
    }
    if manifest.is_empty() {
        warn!("{path}: <manifest> lists no items");
    }

    Ok(Package {
        path: path.to_string(),
        version,
        manifest,
        spine,
        document,
    })
}

/// Unescaped value of an attribute, if present.
fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == key {
            let raw = String::from_utf8_lossy(&attr.value);
            let value = quick_xml::escape::unescape(&raw)
                .map_err(|e| Error::Xml(quick_xml::Error::Escape(e)))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}
