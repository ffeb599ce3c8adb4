//! XML bodies and multistatus parsing for CardDAV.
//!
//! Servers disagree on namespace prefixes (`d:`, `D:`, none at all), so
//! every match below is on the local element name.

use std::io::Cursor;

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::error::{ProviderError, ProviderResult};

/// DAV namespace.
pub const DAV_NS: &str = "DAV:";
/// CardDAV namespace.
pub const CARDDAV_NS: &str = "urn:ietf:params:xml:ns:carddav";

/// One `<response>` of a multistatus body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DavEntry {
    /// The href as sent by the server (often path-only).
    pub href: String,
    /// Local names of the `resourcetype` children.
    pub resource_types: Vec<String>,
    /// `displayname`, if present.
    pub display_name: Option<String>,
}

impl DavEntry {
    /// Returns true if the resource is an addressbook collection.
    pub fn is_addressbook(&self) -> bool {
        self.resource_types.iter().any(|t| t == "addressbook")
    }
}

type XmlWriter = Writer<Cursor<Vec<u8>>>;

fn write_error(e: impl std::fmt::Display) -> ProviderError {
    ProviderError::internal(format!("Failed to build XML body: {}", e))
}

/// Writes `<root xmlns:d xmlns:card><d:prop>…</d:prop></root>`.
fn prop_request(root: &str, props: &[&str]) -> ProviderResult<String> {
    let mut writer: XmlWriter = Writer::new(Cursor::new(Vec::new()));

    let mut start = BytesStart::new(root);
    start.push_attribute(("xmlns:d", DAV_NS));
    start.push_attribute(("xmlns:card", CARDDAV_NS));
    writer.write_event(Event::Start(start)).map_err(write_error)?;
    writer
        .write_event(Event::Start(BytesStart::new("d:prop")))
        .map_err(write_error)?;
    for prop in props {
        writer
            .write_event(Event::Empty(BytesStart::new(*prop)))
            .map_err(write_error)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("d:prop")))
        .map_err(write_error)?;
    writer
        .write_event(Event::End(BytesEnd::new(root)))
        .map_err(write_error)?;

    String::from_utf8(writer.into_inner().into_inner()).map_err(write_error)
}

/// PROPFIND body asking for the principal and the addressbook home.
pub fn propfind_discovery_body() -> ProviderResult<String> {
    prop_request(
        "d:propfind",
        &["d:current-user-principal", "card:addressbook-home-set"],
    )
}

/// PROPFIND body for listing collections under the home.
pub fn propfind_collections_body() -> ProviderResult<String> {
    prop_request("d:propfind", &["d:resourcetype", "d:displayname"])
}

/// REPORT body returning every vCard in full.
///
/// No filter and no per-property `address-data` selection: iCloud answers
/// filtered queries with an error.
pub fn addressbook_query_body() -> ProviderResult<String> {
    prop_request("card:addressbook-query", &["d:getetag", "card:address-data"])
}

/// Returns the first `<href>` nested inside an element named `parent`.
///
/// Stops at the first malformed token; whatever was found before counts.
pub fn find_href_in(xml: &str, parent: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut parent_depth = 0usize;
    let mut in_href = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let local = e.local_name();
                if local.as_ref() == parent.as_bytes() {
                    parent_depth += 1;
                } else if parent_depth > 0 && local.as_ref() == b"href" {
                    in_href = true;
                }
            }
            Ok(Event::End(e)) => {
                let local = e.local_name();
                if local.as_ref() == parent.as_bytes() {
                    parent_depth = parent_depth.saturating_sub(1);
                } else if local.as_ref() == b"href" {
                    in_href = false;
                }
            }
            Ok(Event::Text(t)) if in_href => {
                let text = t.unescape().ok()?.trim().to_string();
                if !text.is_empty() {
                    return Some(text);
                }
            }
            Ok(Event::CData(c)) if in_href => {
                let text = String::from_utf8_lossy(&c).trim().to_string();
                if !text.is_empty() {
                    return Some(text);
                }
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

/// Parses a multistatus body into its `<response>` entries.
///
/// # Errors
///
/// Returns an invalid-response error if the body is not well-formed XML.
pub fn parse_multistatus(xml: &str) -> ProviderResult<Vec<DavEntry>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    #[derive(PartialEq)]
    enum Field {
        None,
        Href,
        DisplayName,
    }

    let mut entries = Vec::new();
    let mut current: Option<DavEntry> = None;
    let mut in_resourcetype = false;
    let mut field = Field::None;

    loop {
        let event = reader.read_event().map_err(|e| {
            ProviderError::invalid_response(format!(
                "Malformed multistatus at byte {}: {}",
                reader.buffer_position(),
                e
            ))
        })?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let has_content = matches!(event, Event::Start(_));
                let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match local.as_str() {
                    "response" => current = Some(DavEntry::default()),
                    "resourcetype" => in_resourcetype = has_content,
                    "href" if has_content && current.is_some() && !in_resourcetype => {
                        field = Field::Href
                    }
                    "displayname" if has_content => field = Field::DisplayName,
                    _ if in_resourcetype => {
                        if let Some(ref mut entry) = current {
                            entry.resource_types.push(local.clone());
                        }
                    }
                    _ => {}
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"response" => {
                    if let Some(entry) = current.take().filter(|e| !e.href.is_empty()) {
                        entries.push(entry);
                    }
                }
                b"resourcetype" => in_resourcetype = false,
                _ => field = Field::None,
            },
            Event::Text(t) if field != Field::None => {
                let text = t
                    .unescape()
                    .map_err(|e| ProviderError::invalid_response(e.to_string()))?
                    .trim()
                    .to_string();
                if let Some(ref mut entry) = current {
                    match field {
                        Field::Href if entry.href.is_empty() => entry.href = text,
                        Field::DisplayName => entry.display_name = Some(text),
                        _ => {}
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_body() {
        let body = propfind_discovery_body().unwrap();
        assert!(body.starts_with("<d:propfind"));
        assert!(body.contains(r#"xmlns:card="urn:ietf:params:xml:ns:carddav""#));
        assert!(body.contains("<d:current-user-principal/>"));
        assert!(body.contains("<card:addressbook-home-set/>"));
    }

    #[test]
    fn query_body_has_no_filter() {
        let body = addressbook_query_body().unwrap();
        assert!(body.starts_with("<card:addressbook-query"));
        assert!(body.contains("<d:getetag/>"));
        assert!(body.contains("<card:address-data/>"));
        assert!(!body.contains("filter"));
    }

    #[test]
    fn href_ignores_prefixes() {
        let prefixed = r#"<d:multistatus xmlns:d="DAV:"><d:response><d:href>/</d:href>
            <d:propstat><d:prop><d:current-user-principal><d:href>/123/principal/</d:href>
            </d:current-user-principal></d:prop></d:propstat></d:response></d:multistatus>"#;
        let bare = r#"<multistatus xmlns="DAV:"><response><href>/</href><propstat><prop>
            <current-user-principal><href>/123/principal/</href></current-user-principal>
            </prop></propstat></response></multistatus>"#;

        for xml in [prefixed, bare] {
            assert_eq!(
                find_href_in(xml, "current-user-principal").as_deref(),
                Some("/123/principal/")
            );
        }
    }

    #[test]
    fn href_outside_parent_is_ignored() {
        let xml = r#"<D:multistatus xmlns:D="DAV:"><D:response><D:href>/</D:href>
            <D:propstat><D:prop><D:current-user-principal/></D:prop>
            <D:status>HTTP/1.1 404 Not Found</D:status></D:propstat></D:response></D:multistatus>"#;
        assert_eq!(find_href_in(xml, "current-user-principal"), None);
    }

    #[test]
    fn home_set_with_other_namespace_prefix() {
        let xml = r#"<multistatus xmlns="DAV:" xmlns:C="urn:ietf:params:xml:ns:carddav">
            <response><href>/123/principal/</href><propstat><prop>
            <C:addressbook-home-set><href xmlns="DAV:">https://p42-contacts.icloud.com:443/123/carddavhome/</href>
            </C:addressbook-home-set></prop></propstat></response></multistatus>"#;
        assert_eq!(
            find_href_in(xml, "addressbook-home-set").as_deref(),
            Some("https://p42-contacts.icloud.com:443/123/carddavhome/")
        );
    }

    #[test]
    fn garbage_has_no_href() {
        assert_eq!(find_href_in("<html><body>oops", "current-user-principal"), None);
        assert_eq!(find_href_in("", "addressbook-home-set"), None);
    }

    #[test]
    fn multistatus_collections() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:" xmlns:card="urn:ietf:params:xml:ns:carddav">
  <d:response>
    <d:href>/dav/home/</d:href>
    <d:propstat><d:prop><d:resourcetype><d:collection/></d:resourcetype></d:prop></d:propstat>
  </d:response>
  <d:response>
    <d:href>/dav/home/contacts/</d:href>
    <d:propstat><d:prop>
      <d:resourcetype><d:collection/><card:addressbook/></d:resourcetype>
      <d:displayname>Contacts &amp; Friends</d:displayname>
    </d:prop></d:propstat>
  </d:response>
</d:multistatus>"#;

        let entries = parse_multistatus(xml).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(!entries[0].is_addressbook());
        assert_eq!(entries[1].href, "/dav/home/contacts/");
        assert!(entries[1].is_addressbook());
        assert_eq!(entries[1].display_name.as_deref(), Some("Contacts & Friends"));
        assert_eq!(entries[1].resource_types, vec!["collection", "addressbook"]);
    }

    #[test]
    fn multistatus_malformed() {
        let err = parse_multistatus("<d:multistatus><d:response></d:multi>").unwrap_err();
        assert_eq!(err.code(), crate::error::ProviderErrorCode::InvalidResponse);
    }
}
