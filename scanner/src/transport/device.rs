use std::collections::BTreeMap;

use indexmap::IndexMap;
use log::{debug, info};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use url::Url;
use xmltree::{Element, XMLNode};

use crate::error::DescriptionError;
use crate::registry::DeviceRegistry;

pub const URL_BASE_ELEMENT: &str = "URLBase";
const DEVICE_ELEMENT: &str = "device";

/// A fetched device description document with a guaranteed `URLBase`
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceDescription {
  location: String,
  base_url: String,
  base_url_synthesized: bool,
  document: Element,
}

impl DeviceDescription {
  /// Parse a description body fetched from `location`, adding a `URLBase`
  /// element derived from the location when the document lacks one
  pub fn from_xml(location: &str, xml: &str) -> Result<Self, DescriptionError> {
    let mut document = Element::parse(xml.as_bytes())?;

    let existing = document
      .get_child(URL_BASE_ELEMENT)
      .and_then(|element| element.get_text())
      .map(|text| text.trim().to_string())
      .filter(|text| !text.is_empty());

    if let Some(base_url) = existing {
      return Ok(Self {
        location: location.to_string(),
        base_url,
        base_url_synthesized: false,
        document,
      });
    }

    let base_url = base_url_from_location(location)?;
    set_url_base(&mut document, &base_url);
    debug!("Synthesized URLBase {} for {}", base_url, location);

    Ok(Self {
      location: location.to_string(),
      base_url,
      base_url_synthesized: true,
      document,
    })
  }

  /// URL the description was fetched from
  pub fn location(&self) -> &str {
    &self.location
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  /// Whether `URLBase` was added from the location rather than read from the document
  pub fn base_url_synthesized(&self) -> bool {
    self.base_url_synthesized
  }

  pub fn document(&self) -> &Element {
    &self.document
  }

  pub fn device_type(&self) -> Option<String> {
    self.device_field("deviceType")
  }

  pub fn friendly_name(&self) -> Option<String> {
    self.device_field("friendlyName")
  }

  pub fn manufacturer(&self) -> Option<String> {
    self.device_field("manufacturer")
  }

  pub fn model_name(&self) -> Option<String> {
    self.device_field("modelName")
  }

  pub fn udn(&self) -> Option<String> {
    self.device_field("UDN")
  }

  /// Write the normalized document back out as XML
  pub fn to_xml(&self) -> Result<String, DescriptionError> {
    let mut out = Vec::new();
    self
      .document
      .write(&mut out)
      .map_err(|e| DescriptionError::Write(e.to_string()))?;
    Ok(String::from_utf8_lossy(&out).into_owned())
  }

  fn device_field(&self, name: &str) -> Option<String> {
    self
      .document
      .get_child(DEVICE_ELEMENT)?
      .get_child(name)?
      .get_text()
      .map(|text| text.trim().to_string())
  }
}

impl Serialize for DeviceDescription {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    ElementView(&self.document).serialize(serializer)
  }
}

/// `scheme://host:port/` for a description location. The port falls back
/// to the scheme's default.
pub fn base_url_from_location(location: &str) -> Result<String, DescriptionError> {
  let invalid = |reason: &str| DescriptionError::InvalidLocation {
    location: location.to_string(),
    reason: reason.to_string(),
  };

  let url = Url::parse(location).map_err(|e| invalid(&e.to_string()))?;
  let host = url.host_str().ok_or_else(|| invalid("no host"))?;
  let port = url.port_or_known_default().ok_or_else(|| invalid("no port"))?;

  Ok(format!("{}://{}:{}/", url.scheme(), host, port))
}

/// Fill an empty `URLBase` or append a new one
fn set_url_base(document: &mut Element, base_url: &str) {
  let text = XMLNode::Text(base_url.to_string());

  if let Some(existing) = document.get_mut_child(URL_BASE_ELEMENT) {
    existing.children = vec![text];
    return;
  }

  let mut url_base = Element::new(URL_BASE_ELEMENT);
  url_base.namespace = document.namespace.clone();
  url_base.children.push(text);
  document.children.push(XMLNode::Element(url_base));
}

/// Build the registry from fetched bodies, in map order. Empty bodies are
/// failed fetches and are skipped; bodies that do not parse are dropped.
pub fn normalize(bodies: &IndexMap<String, String>) -> DeviceRegistry {
  normalize_counted(bodies).0
}

/// Same as [`normalize`], also returning how many non-empty bodies were dropped
pub(crate) fn normalize_counted(bodies: &IndexMap<String, String>) -> (DeviceRegistry, usize) {
  let mut registry = DeviceRegistry::new();
  let mut dropped = 0;

  for (location, body) in bodies {
    if body.is_empty() {
      continue;
    }

    match DeviceDescription::from_xml(location, body) {
      Ok(device) => registry.push(device),
      Err(e) => {
        dropped += 1;
        debug!("Dropping description from {}: {}", location, e);
      }
    }
  }

  info!("Normalized {} device descriptions ({} dropped)", registry.total(), dropped);
  (registry, dropped)
}

/// Serializes an element as nested maps: text-only elements become strings,
/// repeated children become arrays, attributes sit under `@attributes`.
struct ElementView<'a>(&'a Element);

impl Serialize for ElementView<'_> {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let element = self.0;
    let text = element.get_text().unwrap_or_default();
    let text = text.trim();

    let mut groups: IndexMap<&str, Vec<&Element>> = IndexMap::new();
    for child in element.children.iter().filter_map(XMLNode::as_element) {
      groups.entry(child.name.as_str()).or_default().push(child);
    }

    if groups.is_empty() && element.attributes.is_empty() {
      return serializer.serialize_str(text);
    }

    let mut map = serializer.serialize_map(None)?;
    if !element.attributes.is_empty() {
      let attributes: BTreeMap<&str, &str> = element
        .attributes
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect();
      map.serialize_entry("@attributes", &attributes)?;
    }
    if !text.is_empty() {
      map.serialize_entry("#text", text)?;
    }
    for (name, children) in &groups {
      if let [only] = children.as_slice() {
        map.serialize_entry(name, &ElementView(*only))?;
      } else {
        let views: Vec<ElementView> = children.iter().map(|child| ElementView(*child)).collect();
        map.serialize_entry(name, &views)?;
      }
    }
    map.end()
  }
}
