// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! The node hierarchy of a device.
//!
//! Built from the flat `listNodesJSON` listing: every path segment becomes a
//! [`Node`], enumerated levels (`sigouts/0`, `sigouts/1`, ...) become lists
//! and leaves become [`Parameter`]s. An enumerated level with a single entry
//! collapses into its singular name, so `qas/0/result/length` is found as
//! `qa/result/length`. Lookups accept both spellings.

use std::fmt;

use indexmap::IndexMap;

use crate::connection::DeviceConnection;
use crate::parameter::{NodeInfo, Parameter};
use crate::Result;

#[derive(Debug, Clone)]
pub enum NodeEntry {
    Node(Node),
    List(Vec<NodeEntry>),
    Parameter(Box<Parameter>),
}

impl NodeEntry {
    fn child(&self, key: &str) -> Option<&NodeEntry> {
        match self {
            NodeEntry::Node(node) => node.children.get(key),
            NodeEntry::List(list) => key.parse::<usize>().ok().and_then(|i| list.get(i)),
            NodeEntry::Parameter(_) => None,
        }
    }

    fn child_mut(&mut self, key: &str) -> Option<&mut NodeEntry> {
        match self {
            NodeEntry::Node(node) => node.children.get_mut(key),
            NodeEntry::List(list) => key
                .parse::<usize>()
                .ok()
                .and_then(|i| list.get_mut(i)),
            NodeEntry::Parameter(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            NodeEntry::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[NodeEntry]> {
        match self {
            NodeEntry::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_parameter(&self) -> Option<&Parameter> {
        match self {
            NodeEntry::Parameter(parameter) => Some(parameter),
            _ => None,
        }
    }

    fn as_parameter_mut(&mut self) -> Option<&mut Parameter> {
        match self {
            NodeEntry::Parameter(parameter) => Some(parameter),
            _ => None,
        }
    }

    fn count_parameters(&self) -> usize {
        match self {
            NodeEntry::Node(node) => node.children.values().map(Self::count_parameters).sum(),
            NodeEntry::List(list) => list.iter().map(Self::count_parameters).sum(),
            NodeEntry::Parameter(_) => 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Node {
    children: IndexMap<String, NodeEntry>,
}

impl Node {
    pub fn get(&self, key: &str) -> Option<&NodeEntry> {
        self.children.get(key)
    }

    /// Names of the sub-nodes and node lists.
    pub fn nodes(&self) -> Vec<&str> {
        self.children
            .iter()
            .filter(|(_, entry)| !matches!(entry, NodeEntry::Parameter(_)))
            .map(|(key, _)| key.as_str())
            .collect()
    }

    pub fn parameters(&self) -> Vec<&str> {
        self.children
            .iter()
            .filter(|(_, entry)| matches!(entry, NodeEntry::Parameter(_)))
            .map(|(key, _)| key.as_str())
            .collect()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "nodes:")?;
        for node in self.nodes() {
            writeln!(f, " - {node}")?;
        }
        writeln!(f, "parameters:")?;
        for parameter in self.parameters() {
            writeln!(f, " - {parameter}")?;
        }
        Ok(())
    }
}

enum RawNode {
    Leaf(NodeInfo),
    Branch(IndexMap<String, RawNode>),
}

fn insert(tree: &mut IndexMap<String, RawNode>, keys: &[String], info: NodeInfo) {
    let Some((key, rest)) = keys.split_first() else {
        return;
    };
    if rest.is_empty() {
        tree.insert(key.clone(), RawNode::Leaf(info));
        return;
    }
    let entry = tree
        .entry(key.clone())
        .or_insert_with(|| RawNode::Branch(IndexMap::new()));
    if let RawNode::Leaf(_) = entry {
        *entry = RawNode::Branch(IndexMap::new());
    }
    if let RawNode::Branch(children) = entry {
        insert(children, rest, info);
    }
}

fn build_node(children: IndexMap<String, RawNode>, device: &DeviceConnection) -> Node {
    let mut node = Node::default();
    for (key, raw) in children {
        let (key, entry) = build_named_entry(key, raw, device);
        node.children.insert(key, entry);
    }
    node
}

fn build_entry(raw: RawNode, device: &DeviceConnection) -> NodeEntry {
    match raw {
        RawNode::Leaf(info) => NodeEntry::Parameter(Box::new(Parameter::new(info, device))),
        RawNode::Branch(children) => NodeEntry::Node(build_node(children, device)),
    }
}

fn build_named_entry(key: String, raw: RawNode, device: &DeviceConnection) -> (String, NodeEntry) {
    let children = match raw {
        RawNode::Branch(children)
            if !children.is_empty() && children.keys().all(|k| k.parse::<usize>().is_ok()) =>
        {
            children
        }
        raw => return (key, build_entry(raw, device)),
    };
    let mut items = children
        .into_iter()
        .filter_map(|(k, raw)| k.parse::<usize>().ok().map(|i| (i, raw)))
        .collect::<Vec<_>>();
    items.sort_by_key(|(i, _)| *i);
    let mut list = items
        .into_iter()
        .map(|(_, raw)| build_entry(raw, device))
        .collect::<Vec<_>>();
    if list.len() == 1 {
        let singular = key.strip_suffix('s').unwrap_or(&key).to_string();
        return (singular, list.remove(0));
    }
    (key, NodeEntry::List(list))
}

fn step<'a>(root: &'a Node, current: Option<&'a NodeEntry>, key: &str) -> Option<&'a NodeEntry> {
    match current {
        None => root.children.get(key),
        Some(entry) => entry.child(key),
    }
}

#[derive(Debug, Clone)]
pub struct Nodetree {
    serial: String,
    root: Node,
}

impl Nodetree {
    /// Read the node listing of the connected device.
    pub fn from_device(device: &DeviceConnection) -> Result<Self> {
        let nodes = device.get_nodetree(&format!("/{}/*", device.serial()))?;
        Ok(Self::from_nodes(device, nodes))
    }

    /// Build from `listNodesJSON` output.
    pub fn from_json(device: &DeviceConnection, json: &str) -> Result<Self> {
        let nodes = serde_json::from_str(json).map_err(anyhow::Error::from)?;
        Ok(Self::from_nodes(device, nodes))
    }

    /// Build from a listing keyed by absolute node path.
    pub fn from_nodes(device: &DeviceConnection, nodes: IndexMap<String, NodeInfo>) -> Self {
        let prefix = format!("/{}/", device.serial().to_uppercase());
        let mut raw = IndexMap::new();
        for (path, info) in nodes {
            let keys = path
                .strip_prefix(&prefix)
                .unwrap_or(&path)
                .split('/')
                .filter(|k| !k.is_empty())
                .map(str::to_lowercase)
                .collect::<Vec<_>>();
            insert(&mut raw, &keys, info);
        }
        Nodetree {
            serial: device.serial().to_string(),
            root: build_node(raw, device),
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn num_parameters(&self) -> usize {
        self.root
            .children
            .values()
            .map(NodeEntry::count_parameters)
            .sum()
    }

    /// Keys leading to `path` in the tree, with collapsed single-entry lists
    /// resolved.
    fn canonical_keys(&self, path: &str) -> Option<Vec<String>> {
        let mut segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
            .collect::<Vec<_>>();
        if segments.first() == Some(&self.serial) {
            segments.remove(0);
        }
        let mut keys = Vec::new();
        let mut current = None;
        let mut i = 0;
        while let Some(segment) = segments.get(i) {
            if let Some(next) = step(&self.root, current, segment) {
                keys.push(segment.clone());
                current = Some(next);
                i += 1;
                continue;
            }
            let singular = segment.strip_suffix('s')?;
            if segments.get(i + 1).map(String::as_str) != Some("0") {
                return None;
            }
            current = Some(step(&self.root, current, singular)?);
            keys.push(singular.to_string());
            i += 2;
        }
        (!keys.is_empty()).then_some(keys)
    }

    pub fn entry(&self, path: &str) -> Option<&NodeEntry> {
        let keys = self.canonical_keys(path)?;
        let (first, rest) = keys.split_first()?;
        let mut entry = self.root.children.get(first)?;
        for key in rest {
            entry = entry.child(key)?;
        }
        Some(entry)
    }

    pub fn parameter(&self, path: &str) -> Option<&Parameter> {
        self.entry(path)?.as_parameter()
    }

    pub fn parameter_mut(&mut self, path: &str) -> Option<&mut Parameter> {
        let keys = self.canonical_keys(path)?;
        let (first, rest) = keys.split_first()?;
        let mut entry = self.root.children.get_mut(first)?;
        for key in rest {
            entry = entry.child_mut(key)?;
        }
        entry.as_parameter_mut()
    }
}

#[cfg(test)]
mod tests {
    use node_value::NodeValue;
    use toolkit_common::DeviceKind;

    use super::*;
    use crate::config::ApiConfig;
    use crate::connection::ZiConnection;

    fn info(path: &str) -> NodeInfo {
        NodeInfo::new(path, "Integer (64 bit)", "Read, Write", "None", "")
    }

    fn offline_device() -> DeviceConnection {
        DeviceConnection::new("qa", "dev2000", DeviceKind::Uhfqa, "1GbE")
    }

    #[test]
    fn test_structure() {
        let nodes = [
            "/DEV2000/SIGOUTS/0/ON",
            "/DEV2000/SIGOUTS/1/ON",
            "/DEV2000/QAS/0/RESULT/LENGTH",
            "/DEV2000/QAS/0/RESULT/ENABLE",
            "/DEV2000/FEATURES/OPTIONS",
        ]
        .into_iter()
        .map(|p| (p.to_string(), info(p)))
        .collect::<IndexMap<_, _>>();
        let tree = Nodetree::from_nodes(&offline_device(), nodes);

        assert_eq!(tree.root().nodes(), vec!["sigouts", "qa", "features"]);
        assert_eq!(tree.num_parameters(), 5);
        assert_eq!(tree.entry("sigouts").unwrap().as_list().unwrap().len(), 2);
        assert_eq!(
            tree.parameter("sigouts/1/on").unwrap().path(),
            "/DEV2000/SIGOUTS/1/ON"
        );
        assert!(tree.parameter("qa/result/length").is_some());
        assert!(tree.parameter("/dev2000/qas/0/result/length").is_some());
        assert!(tree.parameter("qas/1/result/length").is_none());
        assert!(tree.parameter("sigouts/2/on").is_none());
        assert!(tree.parameter("sigouts").is_none());
        let qa = tree.entry("qa").unwrap().as_node().unwrap();
        assert_eq!(qa.nodes(), vec!["result"]);
        let result = qa.get("result").unwrap().as_node().unwrap();
        assert_eq!(result.parameters(), vec!["length", "enable"]);
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "/DEV2000/QAS/0/RESULT/SOURCE": {
                "Node": "/DEV2000/QAS/0/RESULT/SOURCE",
                "Description": "Result source.",
                "Properties": "Read, Write, Setting",
                "Type": "Integer (enumerated)",
                "Unit": "None",
                "Options": {"0": "Crosstalk", "7": "Integration"}
            },
            "/DEV2000/STATS/PHYSICAL/TEMPERATURES/0": {
                "Node": "/DEV2000/STATS/PHYSICAL/TEMPERATURES/0",
                "Properties": "Read",
                "Type": "Double"
            }
        }"#;
        let tree = Nodetree::from_json(&offline_device(), json).unwrap();
        assert_eq!(tree.num_parameters(), 2);
        let source = tree.parameter("qa/result/source").unwrap();
        assert!(source.is_writable());
        assert_eq!(source.info().unit, "None");
        let temperature = tree.parameter("stats/physical/temperature").unwrap();
        assert!(!temperature.is_writable());
        assert!(Nodetree::from_json(&offline_device(), "[1, 2]").is_err());
    }

    #[test]
    fn test_from_virtual_device() {
        let device = offline_device();
        device
            .setup(ZiConnection::new_virtual(ApiConfig::default()))
            .unwrap();
        device.connect_device().unwrap();
        let mut tree = Nodetree::from_device(&device).unwrap();
        assert_eq!(tree.entry("qa/rotations").unwrap().as_list().unwrap().len(), 10);
        let length = tree.parameter_mut("qas/0/result/length").unwrap();
        length.set(20).unwrap();
        assert_eq!(length.get().unwrap(), NodeValue::Integer(20));
        let mode = tree.parameter_mut("qa/integration/mode").unwrap();
        assert_eq!(mode.get().unwrap(), NodeValue::from("standard"));
    }
}
