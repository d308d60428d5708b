// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! An in-process data server simulating connected devices.
//!
//! Devices are created from a static node catalog per device kind when they
//! connect. Writes are type-checked against the node, read-only nodes reject
//! writes, and set paths may use `*` for any single path segment. A few nodes
//! behave like on hardware:
//!
//! - `awgs/N/enable` falls back to 0 after a configurable number of polls.
//! - `qas/0/result/data/N/wave` returns `qas/0/result/length` results of the
//!   last acquisition started with `qas/0/result/enable`.
//! - `awgs/N/waveform/waves/M` accepts waveform uploads.

mod awg_module;
mod catalog;

use indexmap::IndexMap;
use node_value::{NodeValue, NumericArray};
use serde_json::{Map, Value, json};
use toolkit_common::DeviceKind;

pub use awg_module::VirtualAwgModule;
use catalog::{VirtualNode, nodes_for};

use crate::config::ApiConfig;
use crate::connection::{AwgModule, DataServer};
use crate::{Error, Result};

const DEFAULT_ENABLE_POLLS: u32 = 3;

struct VirtualDevice {
    kind: DeviceKind,
    nodes: IndexMap<String, VirtualNode>,
    /// Remaining polls of running AWG cores, keyed by their enable node.
    running: IndexMap<String, u32>,
    acquisitions: u64,
}

impl VirtualDevice {
    fn new(kind: DeviceKind) -> Self {
        VirtualDevice {
            kind,
            nodes: nodes_for(kind),
            running: IndexMap::new(),
            acquisitions: 0,
        }
    }

    fn is_waveform_node(&self, segments: &[&str]) -> bool {
        match segments {
            ["awgs", core, "waveform", "waves", index] => {
                core.parse::<u16>()
                    .is_ok_and(|c| c < self.kind.traits().awg_cores)
                    && index.parse::<usize>().is_ok()
            }
            _ => false,
        }
    }

    /// Concrete node paths matching `pattern`.
    fn resolve(&self, pattern: &str) -> Vec<String> {
        let segments = pattern.split('/').collect::<Vec<_>>();
        if !pattern.contains('*') {
            if self.nodes.contains_key(pattern) || self.is_waveform_node(&segments) {
                return vec![pattern.to_string()];
            }
            return vec![];
        }
        self.nodes
            .keys()
            .filter(|path| {
                let parts = path.split('/').collect::<Vec<_>>();
                parts.len() == segments.len()
                    && parts
                        .iter()
                        .zip(&segments)
                        .all(|(part, seg)| *seg == "*" || part == seg)
            })
            .cloned()
            .collect()
    }

    fn coerce(&self, path: &str, value: &NodeValue) -> Result<NodeValue> {
        let Some(node) = self.nodes.get(path) else {
            return Ok(NodeValue::Vector(value.as_vector()?.clone()));
        };
        if !node.writable {
            return Err(Error::ReadOnly(path.to_string()));
        }
        let coerced = match &node.value {
            NodeValue::Integer(_) => NodeValue::Integer(value.as_i64()?),
            NodeValue::Double(_) => NodeValue::Double(value.as_f64()?),
            NodeValue::Complex(_) => NodeValue::Complex(value.as_complex()?),
            NodeValue::String(_) => NodeValue::String(value.as_str()?.to_string()),
            NodeValue::Vector(_) => NodeValue::Vector(value.as_vector()?.clone()),
        };
        Ok(coerced)
    }

    fn write(&mut self, path: String, value: NodeValue, enable_polls: u32) {
        {
            let segments = path.split('/').collect::<Vec<_>>();
            match segments.as_slice() {
                ["awgs", _, "enable"] => {
                    if value == NodeValue::Integer(0) {
                        self.running.shift_remove(&path);
                    } else {
                        self.running.insert(path.clone(), enable_polls);
                    }
                }
                ["qas", "0", "result", "enable"] if value != NodeValue::Integer(0) => {
                    self.acquisitions += 1;
                }
                _ => {}
            }
        }
        match self.nodes.get_mut(&path) {
            Some(node) => node.value = value,
            None => {
                self.nodes.insert(
                    path,
                    VirtualNode {
                        description: "Waveform data of the AWG core.",
                        unit: "None",
                        writable: true,
                        options: &[],
                        value,
                    },
                );
            }
        }
    }

    fn read(&mut self, path: &str) -> Option<NodeValue> {
        let segments = path.split('/').collect::<Vec<_>>();
        match segments.as_slice() {
            ["awgs", _, "enable"] => {
                if let Some(polls) = self.running.get_mut(path) {
                    if *polls == 0 {
                        self.running.shift_remove(path);
                        if let Some(node) = self.nodes.get_mut(path) {
                            node.value = NodeValue::Integer(0);
                        }
                    } else {
                        *polls -= 1;
                    }
                }
            }
            ["qas", "0", "result", "data", channel, "wave"] => {
                let channel = channel.parse::<u32>().ok()?;
                return Some(self.result_vector(channel));
            }
            _ => {}
        }
        self.nodes.get(path).map(|node| node.value.clone())
    }

    /// Results of the last acquisition. Every point of channel `c` after `a`
    /// acquisitions reads `cos(0.4 a + 0.5 c)`.
    fn result_vector(&self, channel: u32) -> NodeValue {
        let length = self
            .nodes
            .get("qas/0/result/length")
            .and_then(|node| node.value.as_i64().ok())
            .unwrap_or(0)
            .max(0) as usize;
        let value = (0.4 * self.acquisitions as f64 + 0.5 * f64::from(channel)).cos();
        NodeValue::Vector(NumericArray::Float64(vec![value; length]))
    }
}

/// Simulated data server holding any number of devices.
pub struct VirtualDataServer {
    connected: bool,
    enable_polls: u32,
    announced: IndexMap<String, DeviceKind>,
    devices: IndexMap<String, VirtualDevice>,
    awg_module: VirtualAwgModule,
}

impl Default for VirtualDataServer {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualDataServer {
    pub fn new() -> Self {
        VirtualDataServer {
            connected: false,
            enable_polls: DEFAULT_ENABLE_POLLS,
            announced: IndexMap::new(),
            devices: IndexMap::new(),
            awg_module: VirtualAwgModule::default(),
        }
    }

    /// Make a device of `kind` available under `serial`.
    pub fn with_device(mut self, serial: &str, kind: DeviceKind) -> Self {
        self.announce_device(serial, kind);
        self
    }

    /// Number of polls an enabled AWG core keeps reading as running.
    pub fn with_enable_polls(mut self, polls: u32) -> Self {
        self.enable_polls = polls;
        self
    }

    /// Let every ELF upload of the AWG module fail.
    pub fn with_failing_uploads(mut self) -> Self {
        self.awg_module.set_failing_uploads(true);
        self
    }

    /// Split an absolute path into serial and device-relative path.
    fn split_path(path: &str) -> Result<(&str, &str)> {
        path.trim_start_matches('/')
            .split_once('/')
            .ok_or_else(|| Error::NodeNotFound(path.to_string()))
    }

    fn device_mut(&mut self, serial: &str) -> Result<&mut VirtualDevice> {
        self.devices
            .get_mut(serial)
            .ok_or_else(|| Error::DeviceNotFound(serial.to_string()))
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(Error::NoServer)
        }
    }
}

impl DataServer for VirtualDataServer {
    fn connect(&mut self, api: &ApiConfig) -> Result<()> {
        toolkit_log::debug!(
            "Virtual data server answering for {}:{}",
            api.host,
            api.port
        );
        self.connected = true;
        Ok(())
    }

    fn announce_device(&mut self, serial: &str, kind: DeviceKind) {
        self.announced.insert(serial.to_lowercase(), kind);
    }

    fn connect_device(&mut self, serial: &str, _interface: &str) -> Result<()> {
        self.ensure_connected()?;
        let serial = serial.to_lowercase();
        let kind = *self
            .announced
            .get(&serial)
            .ok_or_else(|| Error::DeviceNotFound(serial.clone()))?;
        self.devices
            .entry(serial)
            .or_insert_with(|| VirtualDevice::new(kind));
        Ok(())
    }

    fn set(&mut self, settings: &[(String, NodeValue)]) -> Result<()> {
        self.ensure_connected()?;
        let mut writes = Vec::new();
        for (path, value) in settings {
            let (serial, relative) = Self::split_path(path)?;
            let device = self.device_mut(serial)?;
            let targets = device.resolve(relative);
            if targets.is_empty() {
                return Err(Error::NodeNotFound(path.clone()));
            }
            for target in targets {
                let coerced = device.coerce(&target, value)?;
                writes.push((serial.to_string(), target, coerced));
            }
        }
        let polls = self.enable_polls;
        for (serial, path, value) in writes {
            self.device_mut(&serial)?.write(path, value, polls);
        }
        Ok(())
    }

    fn get(&mut self, paths: &[String]) -> Result<IndexMap<String, NodeValue>> {
        self.ensure_connected()?;
        let mut values = IndexMap::new();
        for path in paths {
            let (serial, relative) = Self::split_path(path)?;
            let value = self
                .device_mut(serial)?
                .read(relative)
                .ok_or_else(|| Error::NodeNotFound(path.clone()))?;
            values.insert(path.clone(), value);
        }
        Ok(values)
    }

    fn list_nodes_json(&self, prefix: &str) -> Result<String> {
        self.ensure_connected()?;
        let prefix = prefix.trim_end_matches('*').trim_end_matches('/');
        let (serial, relative) = match prefix.trim_start_matches('/').split_once('/') {
            Some((serial, relative)) => (serial, relative),
            None => (prefix.trim_start_matches('/'), ""),
        };
        let device = self
            .devices
            .get(serial)
            .ok_or_else(|| Error::DeviceNotFound(serial.to_string()))?;
        let mut listing = Map::new();
        for (path, node) in device.nodes.iter().filter(|(p, _)| p.starts_with(relative)) {
            let absolute = format!("/{serial}/{path}").to_uppercase();
            let mut entry = json!({
                "Node": absolute,
                "Description": node.description,
                "Properties": node.properties(),
                "Type": node.type_label(),
                "Unit": node.unit,
            });
            if !node.options.is_empty()
                && let Some(fields) = entry.as_object_mut()
            {
                let options = node
                    .options
                    .iter()
                    .map(|(key, text)| (key.to_string(), Value::from(*text)))
                    .collect::<Map<_, _>>();
                fields.insert("Options".to_string(), Value::Object(options));
            }
            listing.insert(absolute, entry);
        }
        Ok(Value::Object(listing).to_string())
    }

    fn awg_module(&mut self) -> &mut dyn AwgModule {
        &mut self.awg_module
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> VirtualDataServer {
        let mut server = VirtualDataServer::new()
            .with_device("dev8000", DeviceKind::Hdawg)
            .with_device("dev2000", DeviceKind::Uhfqa)
            .with_enable_polls(2);
        server.connect(&ApiConfig::default()).unwrap();
        server.connect_device("dev8000", "1GbE").unwrap();
        server.connect_device("DEV2000", "1GbE").unwrap();
        server
    }

    fn get(server: &mut VirtualDataServer, path: &str) -> NodeValue {
        server
            .get(&[path.to_string()])
            .unwrap()
            .shift_remove(path)
            .unwrap()
    }

    #[test]
    fn test_unknown_device() {
        let mut server = server();
        assert!(matches!(
            server.connect_device("dev1234", "1GbE"),
            Err(Error::DeviceNotFound(_))
        ));
    }

    #[test]
    fn test_wildcard_set() {
        let mut server = server();
        server
            .set(&[("/dev8000/awgs/*/single".to_string(), 1.into())])
            .unwrap();
        for i in 0..4 {
            assert_eq!(
                get(&mut server, &format!("/dev8000/awgs/{i}/single")),
                NodeValue::Integer(1)
            );
        }
        assert!(matches!(
            server.set(&[("/dev8000/nothing/*".to_string(), 1.into())]),
            Err(Error::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_type_and_access_checks() {
        let mut server = server();
        assert!(matches!(
            server.set(&[("/dev8000/oscs/0/freq".to_string(), "fast".into())]),
            Err(Error::TypeMismatch(_))
        ));
        assert!(matches!(
            server.set(&[("/dev8000/features/options".to_string(), "".into())]),
            Err(Error::ReadOnly(_))
        ));
        // integers are accepted for double nodes
        server
            .set(&[("/dev8000/oscs/0/freq".to_string(), 5.into())])
            .unwrap();
        assert_eq!(get(&mut server, "/dev8000/oscs/0/freq"), NodeValue::Double(5.0));
    }

    #[test]
    fn test_batch_is_atomic() {
        let mut server = server();
        let result = server.set(&[
            ("/dev8000/sigouts/0/on".to_string(), 1.into()),
            ("/dev8000/sigouts/99/on".to_string(), 1.into()),
        ]);
        assert!(result.is_err());
        assert_eq!(get(&mut server, "/dev8000/sigouts/0/on"), NodeValue::Integer(0));
    }

    #[test]
    fn test_enable_falls_back() {
        let mut server = server();
        server
            .set(&[("/dev8000/awgs/1/enable".to_string(), 1.into())])
            .unwrap();
        let polls = (0..4)
            .map(|_| get(&mut server, "/dev8000/awgs/1/enable").as_i64().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(polls, vec![1, 1, 0, 0]);
    }

    #[test]
    fn test_result_vector() {
        let mut server = server();
        server
            .set(&[
                ("/dev2000/qas/0/result/length".to_string(), 4.into()),
                ("/dev2000/qas/0/result/enable".to_string(), 1.into()),
            ])
            .unwrap();
        let NodeValue::Vector(NumericArray::Float64(data)) =
            get(&mut server, "/dev2000/qas/0/result/data/1/wave")
        else {
            panic!("expected a double vector");
        };
        assert_eq!(data.len(), 4);
        assert!((data[0] - 0.9_f64.cos()).abs() < 1e-12);
    }

    #[test]
    fn test_waveform_upload() {
        let mut server = server();
        server
            .set(&[(
                "/dev8000/awgs/3/waveform/waves/0".to_string(),
                vec![0_i16; 64].into(),
            )])
            .unwrap();
        assert!(
            server
                .set(&[(
                    "/dev8000/awgs/4/waveform/waves/0".to_string(),
                    vec![0_i16; 64].into(),
                )])
                .is_err()
        );
    }

    #[test]
    fn test_list_nodes_json() {
        let server = server();
        let json = server.list_nodes_json("/dev2000/*").unwrap();
        let nodes: Value = serde_json::from_str(&json).unwrap();
        let mode = &nodes["/DEV2000/QAS/0/INTEGRATION/MODE"];
        assert_eq!(mode["Type"], "Integer (64 bit)");
        assert_eq!(mode["Options"]["1"], "\"spectroscopy\": Spectroscopy mode");
        assert_eq!(nodes["/DEV2000/FEATURES/DEVTYPE"]["Properties"], "Read");
    }
}
