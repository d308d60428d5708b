// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::anyhow;
use indexmap::IndexMap;
use node_value::NodeValue;
use serde::{Deserialize, Serialize};

use crate::connection::DeviceConnection;
use crate::parsers::Parser;
use crate::{Error, Result};

/// Description of a device node as returned by `listNodesJSON`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NodeInfo {
    #[serde(rename = "Node")]
    pub path: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub properties: String,
    #[serde(rename = "Type", default)]
    pub node_type: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<IndexMap<String, String>>,
}

impl NodeInfo {
    pub fn new(path: &str, node_type: &str, properties: &str, unit: &str, description: &str) -> Self {
        NodeInfo {
            path: path.to_string(),
            description: description.to_string(),
            properties: properties.to_string(),
            node_type: node_type.to_string(),
            unit: unit.to_string(),
            options: None,
        }
    }

    /// Integer keyed option names. `"\"standard\": Standard integration"`
    /// yields `standard`.
    fn option_names(&self) -> Option<IndexMap<i64, String>> {
        let options = self.options.as_ref()?;
        let mapping = options
            .iter()
            .filter_map(|(key, text)| {
                let key = key.parse::<i64>().ok()?;
                let name = match text.strip_prefix('"').and_then(|t| t.split_once('"')) {
                    Some((name, _)) => name.to_string(),
                    None => text.split(':').next().unwrap_or(text).trim().to_string(),
                };
                Some((key, name.to_lowercase()))
            })
            .collect::<IndexMap<_, _>>();
        (!mapping.is_empty()).then_some(mapping)
    }
}

/// A single device node with access checks, value parsers and a cache of
/// the last raw value seen. Clones share the cache.
#[derive(Clone)]
pub struct Parameter {
    info: NodeInfo,
    device: DeviceConnection,
    set_parser: Option<Parser>,
    get_parser: Option<Parser>,
    mapping: Option<IndexMap<i64, String>>,
    cached: Arc<Mutex<Option<NodeValue>>>,
}

impl std::fmt::Debug for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parameter")
            .field("path", &self.info.path)
            .field("cached", &self.cached())
            .finish()
    }
}

impl std::fmt::Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Node: {}", self.info.path)?;
        writeln!(f, "Description: {}", self.info.description)?;
        writeln!(f, "Type: {}", self.info.node_type)?;
        writeln!(f, "Properties: {}", self.info.properties)?;
        if let Some(mapping) = &self.mapping {
            let options = mapping
                .iter()
                .map(|(code, name)| format!("{code}: {name}"))
                .collect::<Vec<_>>();
            writeln!(f, "Options: {}", options.join(", "))?;
        }
        writeln!(f, "Unit: {}", self.info.unit)?;
        if let Some(value) = self.cached() {
            writeln!(f, "Value: {value}")?;
        }
        Ok(())
    }
}

impl Parameter {
    /// Parameter for a node. Enumerated nodes map their integer values to
    /// option names.
    pub fn new(info: NodeInfo, device: &DeviceConnection) -> Self {
        let mapping = info.option_names();
        Parameter {
            info,
            device: device.clone(),
            set_parser: None,
            get_parser: None,
            mapping,
            cached: Arc::default(),
        }
    }

    pub fn with_parsers(mut self, set_parser: Option<Parser>, get_parser: Option<Parser>) -> Self {
        self.set_parser = set_parser;
        self.get_parser = get_parser;
        self
    }

    pub fn path(&self) -> &str {
        &self.info.path
    }

    pub fn info(&self) -> &NodeInfo {
        &self.info
    }

    /// Last raw value read from or written to the device.
    pub fn cached(&self) -> Option<NodeValue> {
        self.cached.lock().ok().and_then(|cached| cached.clone())
    }

    fn cache(&self) -> Result<MutexGuard<'_, Option<NodeValue>>> {
        self.cached
            .lock()
            .map_err(|_| Error::from(anyhow!("Cache of {} poisoned", self.info.path)))
    }

    pub fn is_readable(&self) -> bool {
        self.info.properties.contains("Read")
    }

    pub fn is_writable(&self) -> bool {
        self.info.properties.contains("Write")
    }

    pub fn get(&mut self) -> Result<NodeValue> {
        if !self.is_readable() {
            return Err(Error::Access {
                path: self.info.path.clone(),
                access: "gettable",
            });
        }
        let raw = self.device.get(&self.info.path)?;
        *self.cache()? = Some(raw.clone());
        let value = self.map_to_name(raw);
        match self.get_parser {
            Some(parse) => parse(value),
            None => Ok(value),
        }
    }

    /// Write a value. The write is skipped if the parsed value equals the
    /// cached one.
    pub fn set(&mut self, value: impl Into<NodeValue>) -> Result<()> {
        if !self.is_writable() {
            return Err(Error::Access {
                path: self.info.path.clone(),
                access: "settable",
            });
        }
        let value = match self.set_parser {
            Some(parse) => parse(value.into())?,
            None => value.into(),
        };
        let raw = self.map_to_code(value)?;
        let mut cached = self.cache()?;
        if cached.as_ref() == Some(&raw) {
            return Ok(());
        }
        self.device.set(&self.info.path, raw.clone())?;
        *cached = Some(raw);
        Ok(())
    }

    /// Write a raw node value without the set parser.
    pub fn set_raw(&mut self, raw: impl Into<NodeValue>) -> Result<()> {
        let raw = raw.into();
        let mut cached = self.cache()?;
        self.device.set(&self.info.path, raw.clone())?;
        *cached = Some(raw);
        Ok(())
    }

    fn map_to_name(&self, raw: NodeValue) -> NodeValue {
        if let (Some(mapping), NodeValue::Integer(code)) = (&self.mapping, &raw)
            && let Some(name) = mapping.get(code)
        {
            return NodeValue::String(name.clone());
        }
        raw
    }

    fn map_to_code(&self, value: NodeValue) -> Result<NodeValue> {
        let (Some(mapping), NodeValue::String(name)) = (&self.mapping, &value) else {
            return Ok(value);
        };
        let name = name.to_lowercase();
        mapping
            .iter()
            .find(|(_, option)| **option == name)
            .map(|(code, _)| NodeValue::Integer(*code))
            .ok_or_else(|| {
                let allowed = mapping.values().cloned().collect::<Vec<_>>().join(", ");
                Error::invalid_value(
                    self.info.path.clone(),
                    format!("'{name}', must be one of {allowed}"),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use toolkit_common::DeviceKind;

    use super::*;
    use crate::config::ApiConfig;
    use crate::connection::ZiConnection;
    use crate::parsers;

    fn device() -> DeviceConnection {
        let device = DeviceConnection::new("qa", "dev2000", DeviceKind::Uhfqa, "1GbE");
        device
            .setup(ZiConnection::new_virtual(ApiConfig::default()))
            .unwrap();
        device.connect_device().unwrap();
        device
    }

    #[test]
    fn test_parsers_and_cache() {
        let device = device();
        let mut time = Parameter::new(
            NodeInfo::new("qas/0/integration/length", "Double", "Read, Write", "s", ""),
            &device,
        )
        .with_parsers(
            Some(parsers::qa_time2samples),
            Some(parsers::qa_samples2time),
        );
        time.set(1e-6).unwrap();
        assert_eq!(time.cached(), Some(NodeValue::Integer(1800)));
        assert_eq!(
            device.get("qas/0/integration/length").unwrap(),
            NodeValue::Integer(1800)
        );
        assert_eq!(time.get().unwrap(), NodeValue::Double(1e-6));
        assert!(time.set(-1.0).is_err());
    }

    #[test]
    fn test_clones_share_cache() {
        let device = device();
        let info = NodeInfo::new("qas/0/integration/length", "Double", "Read, Write", "s", "");
        let mut time = Parameter::new(info, &device).with_parsers(
            Some(parsers::qa_time2samples),
            Some(parsers::qa_samples2time),
        );
        let mut handle = time.clone();
        time.set(1e-6).unwrap();
        handle.set(2e-6).unwrap();
        assert_eq!(time.cached(), Some(NodeValue::Integer(3600)));
        time.set(1e-6).unwrap();
        assert_eq!(
            device.get("qas/0/integration/length").unwrap(),
            NodeValue::Integer(1800)
        );

        handle.set_raw(900).unwrap();
        assert_eq!(time.get().unwrap(), NodeValue::Double(0.5e-6));
        time.set(1e-6).unwrap();
        assert_eq!(
            device.get("qas/0/integration/length").unwrap(),
            NodeValue::Integer(1800)
        );
    }

    #[test]
    fn test_access() {
        let device = device();
        let mut result = Parameter::new(
            NodeInfo::new("qas/0/result/data/0/wave", "ZIVectorData", "Read", "None", ""),
            &device,
        );
        assert!(matches!(
            result.set(0),
            Err(Error::Access {
                access: "settable",
                ..
            })
        ));
        let mut write_only = Parameter::new(
            NodeInfo::new("qas/0/result/reset", "Integer", "Write", "None", ""),
            &device,
        );
        assert!(write_only.get().is_err());
        write_only.set(1).unwrap();
    }

    #[test]
    fn test_option_mapping() {
        let device = device();
        let mut info = NodeInfo::new("qas/0/integration/mode", "Integer", "Read, Write", "None", "");
        info.options = Some(IndexMap::from([
            ("0".to_string(), "\"standard\": Standard".to_string()),
            ("1".to_string(), "Spectroscopy: FFT mode".to_string()),
        ]));
        let mut mode = Parameter::new(info, &device);
        assert_eq!(mode.get().unwrap(), NodeValue::from("standard"));
        mode.set("Spectroscopy").unwrap();
        assert_eq!(
            device.get("qas/0/integration/mode").unwrap(),
            NodeValue::Integer(1)
        );
        mode.set(0).unwrap();
        assert!(mode.set("fast").is_err());
    }
}
