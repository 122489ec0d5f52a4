use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::transport::device::DeviceDescription;

/// Ordered result of a discovery run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceRegistry {
    devices: Vec<DeviceDescription>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn devices(&self) -> &[DeviceDescription] {
        &self.devices
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DeviceDescription> {
        self.devices.iter()
    }

    pub fn push(&mut self, device: DeviceDescription) {
        self.devices.push(device);
    }

    pub fn contains_location(&self, location: &str) -> bool {
        self.devices.iter().any(|device| device.location() == location)
    }

    pub fn find_by_location(&self, location: &str) -> Option<&DeviceDescription> {
        self.devices.iter().find(|device| device.location() == location)
    }

    /// Append the devices of `other` whose location is not already present
    pub fn merge(&mut self, other: DeviceRegistry) {
        for device in other.devices {
            if !self.contains_location(device.location()) {
                self.devices.push(device);
            }
        }
    }
}

impl IntoIterator for DeviceRegistry {
    type Item = DeviceDescription;
    type IntoIter = std::vec::IntoIter<DeviceDescription>;

    fn into_iter(self) -> Self::IntoIter {
        self.devices.into_iter()
    }
}

impl<'a> IntoIterator for &'a DeviceRegistry {
    type Item = &'a DeviceDescription;
    type IntoIter = std::slice::Iter<'a, DeviceDescription>;

    fn into_iter(self) -> Self::IntoIter {
        self.devices.iter()
    }
}

impl Serialize for DeviceRegistry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("DeviceRegistry", 2)?;
        state.serialize_field("total", &self.total())?;
        state.serialize_field("devices", &self.devices)?;
        state.end()
    }
}
