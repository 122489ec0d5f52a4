//! Turning raw SSDP replies into header maps and description locations.
//!
//! The header parsing is deliberately loose: a line is classified by a short
//! case-insensitive prefix, not by a proper `name: value` split. Replies from
//! consumer devices are too irregular for anything stricter.

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use log::trace;

/// Canonical header names recognized in a search reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HeaderKey {
    Http,
    CacheControl,
    Date,
    Ext,
    Location,
    Server,
    St,
    Usn,
    ContentLength,
}

impl HeaderKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            HeaderKey::Http => "http",
            HeaderKey::CacheControl => "cache-control",
            HeaderKey::Date => "date",
            HeaderKey::Ext => "ext",
            HeaderKey::Location => "location",
            HeaderKey::Server => "server",
            HeaderKey::St => "st",
            HeaderKey::Usn => "usn",
            HeaderKey::ContentLength => "content-length",
        }
    }
}

impl fmt::Display for HeaderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line prefixes in match order. The first hit wins.
const PREFIXES: [(&str, HeaderKey); 9] = [
    ("http", HeaderKey::Http),
    ("cach", HeaderKey::CacheControl),
    ("date", HeaderKey::Date),
    ("ext", HeaderKey::Ext),
    ("loca", HeaderKey::Location),
    ("serv", HeaderKey::Server),
    ("st:", HeaderKey::St),
    ("usn:", HeaderKey::Usn),
    ("cont", HeaderKey::ContentLength),
];

/// Headers of one search reply, keyed by canonical name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedHeader {
    fields: IndexMap<HeaderKey, String>,
}

impl ParsedHeader {
    pub fn get(&self, key: HeaderKey) -> Option<&str> {
        self.fields.get(&key).map(String::as_str)
    }

    pub fn location(&self) -> Option<&str> {
        self.get(HeaderKey::Location)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (HeaderKey, &str)> {
        self.fields.iter().map(|(key, value)| (*key, value.as_str()))
    }
}

fn starts_with_ignore_case(line: &str, prefix: &str) -> bool {
    line.len() >= prefix.len()
        && line.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

fn classify(line: &str) -> Option<HeaderKey> {
    PREFIXES
        .iter()
        .find(|(prefix, _)| starts_with_ignore_case(line, prefix))
        .map(|(_, key)| *key)
}

/// Strip a leading `"<key>: "`. Lines that only matched the short prefix
/// (`EXT:` with no space, `Content-Type: ...`) keep their full text.
fn header_value(line: &str, key: HeaderKey) -> &str {
    let name = key.as_str();
    let literal_len = name.len() + 2;
    if line.len() >= literal_len
        && starts_with_ignore_case(line, name)
        && &line.as_bytes()[name.len()..literal_len] == b": "
    {
        &line[literal_len..]
    } else {
        line
    }
}

/// Parse one raw reply. Unknown lines are dropped and a repeated key keeps
/// the value of its last line.
pub fn parse_response(raw: &[u8]) -> ParsedHeader {
    let text = String::from_utf8_lossy(raw);
    let mut parsed = ParsedHeader::default();

    for line in text.split("\r\n") {
        match classify(line) {
            Some(key) => {
                parsed.fields.insert(key, header_value(line, key).to_string());
            }
            None if !line.is_empty() => {
                trace!("Dropping unrecognized SSDP line: {}", line);
            }
            None => {}
        }
    }

    parsed
}

/// Unique description locations in first-seen order. Replies without a
/// location, or with an empty one, are skipped.
pub fn collect_locations<'a, I>(headers: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a ParsedHeader>,
{
    let locations: IndexSet<&str> = headers
        .into_iter()
        .filter_map(ParsedHeader::location)
        .filter(|location| !location.is_empty())
        .collect();

    locations.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROUTER_REPLY: &str = "HTTP/1.1 200 OK\r\n\
        CACHE-CONTROL: max-age=1800\r\n\
        DATE: Sat, 17 Oct 2026 10:00:00 GMT\r\n\
        EXT:\r\n\
        LOCATION: http://192.168.1.1:1900/igd.xml\r\n\
        SERVER: Linux/2.6 UPnP/1.0 Router/1.0\r\n\
        ST: upnp:rootdevice\r\n\
        USN: uuid:12345678-1234-1234-1234-123456789012::upnp:rootdevice\r\n\
        Content-Length: 0\r\n\
        \r\n";

    fn header_with_location(location: &str) -> ParsedHeader {
        parse_response(format!("HTTP/1.1 200 OK\r\nLOCATION: {}\r\n\r\n", location).as_bytes())
    }

    #[test]
    fn test_parse_response_full_reply() {
        let parsed = parse_response(ROUTER_REPLY.as_bytes());

        assert_eq!(parsed.get(HeaderKey::Http), Some("HTTP/1.1 200 OK"));
        assert_eq!(parsed.get(HeaderKey::CacheControl), Some("max-age=1800"));
        assert_eq!(parsed.get(HeaderKey::Date), Some("Sat, 17 Oct 2026 10:00:00 GMT"));
        assert_eq!(parsed.get(HeaderKey::Ext), Some("EXT:"));
        assert_eq!(parsed.location(), Some("http://192.168.1.1:1900/igd.xml"));
        assert_eq!(parsed.get(HeaderKey::Server), Some("Linux/2.6 UPnP/1.0 Router/1.0"));
        assert_eq!(parsed.get(HeaderKey::St), Some("upnp:rootdevice"));
        assert_eq!(
            parsed.get(HeaderKey::Usn),
            Some("uuid:12345678-1234-1234-1234-123456789012::upnp:rootdevice")
        );
        assert_eq!(parsed.get(HeaderKey::ContentLength), Some("0"));
        assert_eq!(parsed.len(), 9);
    }

    #[test]
    fn test_parse_response_is_case_insensitive() {
        let parsed = parse_response(b"http/1.1 200 ok\r\nlocation: http://10.0.0.5:8080/d.xml\r\nst: ssdp:all\r\n");

        assert_eq!(parsed.location(), Some("http://10.0.0.5:8080/d.xml"));
        assert_eq!(parsed.get(HeaderKey::St), Some("ssdp:all"));
    }

    #[test]
    fn test_parse_response_later_line_wins() {
        let parsed = parse_response(b"LOCATION: http://first/\r\nLOCATION: http://second/\r\n");
        assert_eq!(parsed.location(), Some("http://second/"));
    }

    #[test]
    fn test_parse_response_prefix_only_matches_are_lossy() {
        // "Content-Type" lands on the content-length key with its full text;
        // "STATUS" does not match "st:" and is dropped.
        let parsed = parse_response(b"Content-Length: 12\r\nContent-Type: text/xml\r\nSTATUS: ok\r\nX-User-Agent: foo\r\n");

        assert_eq!(parsed.get(HeaderKey::ContentLength), Some("Content-Type: text/xml"));
        assert_eq!(parsed.get(HeaderKey::St), None);
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn test_parse_response_missing_space_keeps_line() {
        let parsed = parse_response(b"LOCATION:http://nospace/\r\n");
        assert_eq!(parsed.location(), Some("LOCATION:http://nospace/"));
    }

    #[test]
    fn test_parse_response_is_deterministic() {
        assert_eq!(
            parse_response(ROUTER_REPLY.as_bytes()),
            parse_response(ROUTER_REPLY.as_bytes())
        );
    }

    #[test]
    fn test_parse_response_tolerates_invalid_utf8() {
        let mut raw = b"LOCATION: http://192.168.1.9/desc.xml\r\nSERVER: ".to_vec();
        raw.extend_from_slice(&[0xff, 0xfe]);

        let parsed = parse_response(&raw);
        assert_eq!(parsed.location(), Some("http://192.168.1.9/desc.xml"));
        assert!(parsed.get(HeaderKey::Server).is_some());
    }

    #[test]
    fn test_parse_response_garbage() {
        assert!(parse_response(b"\x00\x01 nothing here").is_empty());
        assert!(parse_response(b"").is_empty());
    }

    #[test]
    fn test_collect_locations_dedups_in_order() {
        let headers = vec![
            header_with_location("http://a/desc.xml"),
            header_with_location("http://b/desc.xml"),
            header_with_location("http://a/desc.xml"),
        ];

        assert_eq!(
            collect_locations(&headers),
            vec!["http://a/desc.xml".to_string(), "http://b/desc.xml".to_string()]
        );
    }

    #[test]
    fn test_collect_locations_skips_missing() {
        let headers = vec![
            parse_response(b"HTTP/1.1 200 OK\r\nST: ssdp:all\r\n"),
            header_with_location(""),
            header_with_location("http://c/desc.xml"),
        ];

        assert_eq!(collect_locations(&headers), vec!["http://c/desc.xml".to_string()]);
    }
}
