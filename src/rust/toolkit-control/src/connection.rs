// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Data server sessions.
//!
//! [`ZiConnection`] is one session to a data server, shared by all devices
//! that connect through it. [`DeviceConnection`] addresses the nodes of a
//! single device on such a session.

use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use anyhow::anyhow;
use indexmap::IndexMap;
use node_value::NodeValue;
use toolkit_common::DeviceKind;

use crate::config::ApiConfig;
use crate::parameter::NodeInfo;
use crate::virtual_server::VirtualDataServer;
use crate::{Error, Result};

/// The node interface of a data server.
///
/// Paths passed to a server are absolute and lowercase, e.g.
/// `/dev8000/sigouts/0/on`. Set paths may contain `*` wildcards.
pub trait DataServer: Send {
    fn connect(&mut self, api: &ApiConfig) -> Result<()>;

    /// Hint about the kind of device expected behind `serial`. Servers that
    /// discover devices on their own ignore it.
    fn announce_device(&mut self, _serial: &str, _kind: DeviceKind) {}

    fn connect_device(&mut self, serial: &str, interface: &str) -> Result<()>;

    fn set(&mut self, settings: &[(String, NodeValue)]) -> Result<()>;

    fn get(&mut self, paths: &[String]) -> Result<IndexMap<String, NodeValue>>;

    /// Node descriptions under `prefix` as a `listNodesJSON` document.
    fn list_nodes_json(&self, prefix: &str) -> Result<String>;

    fn awg_module(&mut self) -> &mut dyn AwgModule;
}

/// The AWG module of a data server: seqC compiler plus ELF uploader.
///
/// Module paths are relative, e.g. `compiler/sourcestring` or `/index`.
pub trait AwgModule: Send {
    fn set(&mut self, path: &str, value: NodeValue) -> Result<()>;
    fn get_int(&mut self, path: &str) -> Result<i64>;
    fn get_string(&mut self, path: &str) -> Result<String>;
}

struct Session {
    server: Box<dyn DataServer>,
    connected: bool,
    awg_device: Option<String>,
    awg_index: i64,
}

/// A session to a data server shared between devices.
#[derive(Clone)]
pub struct ZiConnection {
    details: ApiConfig,
    session: Arc<Mutex<Session>>,
}

impl ZiConnection {
    pub fn new(details: ApiConfig, server: Box<dyn DataServer>) -> Self {
        ZiConnection {
            details,
            session: Arc::new(Mutex::new(Session {
                server,
                connected: false,
                awg_device: None,
                awg_index: 0,
            })),
        }
    }

    /// A session on a fresh in-process [`VirtualDataServer`].
    pub fn new_virtual(details: ApiConfig) -> Self {
        Self::new(details, Box::new(VirtualDataServer::new()))
    }

    pub fn details(&self) -> &ApiConfig {
        &self.details
    }

    fn session(&self) -> Result<MutexGuard<'_, Session>> {
        self.session
            .lock()
            .map_err(|_| Error::from(anyhow!("Data server session lock poisoned")))
    }

    fn connected_session(&self) -> Result<MutexGuard<'_, Session>> {
        let session = self.session()?;
        if !session.connected {
            return Err(Error::NoServer);
        }
        Ok(session)
    }

    /// Open the session. Connecting an open session again is a no-op.
    pub fn connect(&self) -> Result<()> {
        let mut session = self.session()?;
        if session.connected {
            return Ok(());
        }
        session.server.connect(&self.details)?;
        session.connected = true;
        toolkit_log::info!(
            "Successfully connected to data server at {}:{} api version: {}",
            self.details.host,
            self.details.port,
            self.details.api_level
        );
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.session().map(|s| s.connected).unwrap_or(false)
    }

    pub fn connect_device(&self, serial: &str, kind: DeviceKind, interface: &str) -> Result<()> {
        let mut session = self.connected_session()?;
        session.server.announce_device(serial, kind);
        session.server.connect_device(serial, interface)?;
        toolkit_log::info!("Successfully connected to device {} on interface {}", serial.to_uppercase(), interface);
        Self::select_awg(&mut session, serial, 0)
    }

    pub fn set(&self, settings: &[(String, NodeValue)]) -> Result<()> {
        for (path, value) in settings {
            toolkit_log::diagnostic!("set {} = {}", path, value);
        }
        self.connected_session()?.server.set(settings)
    }

    pub fn get(&self, paths: &[String]) -> Result<IndexMap<String, NodeValue>> {
        self.connected_session()?.server.get(paths)
    }

    pub fn list_nodes_json(&self, prefix: &str) -> Result<String> {
        self.connected_session()?.server.list_nodes_json(prefix)
    }

    pub fn awg_set(&self, serial: &str, index: usize, path: &str, value: NodeValue) -> Result<()> {
        let mut session = self.connected_session()?;
        Self::select_awg(&mut session, serial, index as i64)?;
        session.server.awg_module().set(path, value)
    }

    pub fn awg_get_int(&self, serial: &str, index: usize, path: &str) -> Result<i64> {
        let mut session = self.connected_session()?;
        Self::select_awg(&mut session, serial, index as i64)?;
        session.server.awg_module().get_int(path)
    }

    pub fn awg_get_string(&self, serial: &str, index: usize, path: &str) -> Result<String> {
        let mut session = self.connected_session()?;
        Self::select_awg(&mut session, serial, index as i64)?;
        session.server.awg_module().get_string(path)
    }

    /// Point the AWG module at a device and core, touching only what changed.
    /// Switching the device resets the core index to 0 first.
    fn select_awg(session: &mut Session, serial: &str, index: i64) -> Result<()> {
        if session.awg_device.as_deref() != Some(serial) {
            if session.awg_index != 0 {
                session.server.awg_module().set("/index", NodeValue::Integer(0))?;
                session.awg_index = 0;
            }
            session
                .server
                .awg_module()
                .set("/device", NodeValue::from(serial))?;
            session.awg_device = Some(serial.to_string());
        }
        if session.awg_index != index {
            session
                .server
                .awg_module()
                .set("/index", NodeValue::Integer(index))?;
            session.awg_index = index;
        }
        Ok(())
    }
}

/// Node access for one device.
///
/// Clones share the underlying session slot, so parameters created before
/// `setup` see the connection once it is established.
#[derive(Clone)]
pub struct DeviceConnection {
    name: String,
    serial: String,
    kind: DeviceKind,
    interface: String,
    connection: Arc<RwLock<Option<ZiConnection>>>,
}

impl DeviceConnection {
    pub fn new(name: &str, serial: &str, kind: DeviceKind, interface: &str) -> Self {
        DeviceConnection {
            name: name.to_string(),
            serial: serial.to_lowercase(),
            kind,
            interface: interface.to_string(),
            connection: Arc::new(RwLock::new(None)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Attach the device to a data server session and open it.
    pub fn setup(&self, connection: ZiConnection) -> Result<()> {
        connection.connect()?;
        let mut slot = self
            .connection
            .write()
            .map_err(|_| Error::from(anyhow!("Device connection lock poisoned")))?;
        *slot = Some(connection);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connection
            .read()
            .map(|slot| slot.as_ref().is_some_and(ZiConnection::is_connected))
            .unwrap_or(false)
    }

    pub fn connection(&self) -> Result<ZiConnection> {
        let slot = self
            .connection
            .read()
            .map_err(|_| Error::from(anyhow!("Device connection lock poisoned")))?;
        match slot.as_ref() {
            Some(connection) if connection.is_connected() => Ok(connection.clone()),
            _ => Err(Error::NotConnected {
                name: self.name.clone(),
                serial: self.serial.clone(),
            }),
        }
    }

    pub fn connect_device(&self) -> Result<()> {
        self.connection()?
            .connect_device(&self.serial, self.kind, &self.interface)
    }

    /// Absolute node path for `command`.
    ///
    /// Paths are lowercased and get a leading `/`. Device-relative paths are
    /// prefixed with the serial; paths already naming the serial or a
    /// server node under `/zi/` are kept.
    pub fn normalize_path(&self, command: &str) -> String {
        let mut path = command.to_lowercase();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        if !path.contains("/zi/") && !path.contains(&self.serial) {
            path = format!("/{}{}", self.serial, path);
        }
        path
    }

    pub fn set(&self, path: &str, value: impl Into<NodeValue>) -> Result<()> {
        self.connection()?
            .set(&[(self.normalize_path(path), value.into())])
    }

    /// Write several nodes in one transaction.
    pub fn set_batch<I, S>(&self, settings: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, NodeValue)>,
        S: AsRef<str>,
    {
        let settings = settings
            .into_iter()
            .map(|(path, value)| (self.normalize_path(path.as_ref()), value))
            .collect::<Vec<_>>();
        self.connection()?.set(&settings)
    }

    pub fn get(&self, path: &str) -> Result<NodeValue> {
        let path = self.normalize_path(path);
        let mut values = self.connection()?.get(std::slice::from_ref(&path))?;
        values
            .shift_remove(&path)
            .ok_or(Error::NodeNotFound(path))
    }

    /// Values of several nodes, in the order requested.
    pub fn get_many<S: AsRef<str>>(&self, paths: &[S]) -> Result<Vec<NodeValue>> {
        let paths = paths
            .iter()
            .map(|p| self.normalize_path(p.as_ref()))
            .collect::<Vec<_>>();
        let mut values = self.connection()?.get(&paths)?;
        paths
            .into_iter()
            .map(|path| values.shift_remove(&path).ok_or(Error::NodeNotFound(path)))
            .collect()
    }

    /// Descriptions of all device nodes, keyed by their uppercase path.
    pub fn get_nodetree(&self, prefix: &str) -> Result<IndexMap<String, NodeInfo>> {
        let json = self.connection()?.list_nodes_json(prefix)?;
        let nodes = serde_json::from_str(&json).map_err(anyhow::Error::from)?;
        Ok(nodes)
    }
}
