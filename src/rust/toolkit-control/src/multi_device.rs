// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Several instruments sharing one data server session.

use indexmap::IndexMap;

use crate::config::ApiConfig;
use crate::connection::ZiConnection;
use crate::instruments::{GenericInstrument, Hdawg, Instrument, Uhfqa};
use crate::{Error, Result};

/// An instrument handed to [`MultiDeviceConnection::connect_device`].
pub enum Device {
    Hdawg(Box<Hdawg>),
    Uhfqa(Box<Uhfqa>),
    Other(Box<GenericInstrument>),
}

impl Device {
    fn instrument_mut(&mut self) -> &mut dyn Instrument {
        match self {
            Device::Hdawg(hdawg) => hdawg.as_mut(),
            Device::Uhfqa(uhfqa) => uhfqa.as_mut(),
            Device::Other(other) => other.as_mut(),
        }
    }
}

impl From<Hdawg> for Device {
    fn from(value: Hdawg) -> Self {
        Device::Hdawg(Box::new(value))
    }
}

impl From<Uhfqa> for Device {
    fn from(value: Uhfqa) -> Self {
        Device::Uhfqa(Box::new(value))
    }
}

impl From<GenericInstrument> for Device {
    fn from(value: GenericInstrument) -> Self {
        Device::Other(Box::new(value))
    }
}

/// Container of instruments that are connected over a single data server
/// session. Instruments are looked up by the name they were created with.
#[derive(Default)]
pub struct MultiDeviceConnection {
    connection: Option<ZiConnection>,
    hdawgs: IndexMap<String, Hdawg>,
    uhfqas: IndexMap<String, Uhfqa>,
    others: IndexMap<String, GenericInstrument>,
}

impl MultiDeviceConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the shared session on an in-process virtual data server.
    pub fn setup(&mut self, api: ApiConfig) -> Result<()> {
        self.setup_with(ZiConnection::new_virtual(api))
    }

    /// Use `connection` as the shared session.
    pub fn setup_with(&mut self, connection: ZiConnection) -> Result<()> {
        connection.connect()?;
        self.connection = Some(connection);
        Ok(())
    }

    pub fn connection(&self) -> Option<&ZiConnection> {
        self.connection.as_ref()
    }

    /// Connect `device` over the shared session and register it by name.
    /// A device registered under the same name is replaced.
    pub fn connect_device(&mut self, device: impl Into<Device>) -> Result<()> {
        let connection = self.connection.clone().ok_or(Error::NoServer)?;
        let mut device = device.into();
        let instrument = device.instrument_mut();
        instrument.setup(Some(connection))?;
        instrument.connect_device(true)?;
        let name = instrument.name().to_string();
        match device {
            Device::Hdawg(hdawg) => {
                self.hdawgs.insert(name, *hdawg);
            }
            Device::Uhfqa(uhfqa) => {
                self.uhfqas.insert(name, *uhfqa);
            }
            Device::Other(other) => {
                self.others.insert(name, *other);
            }
        }
        Ok(())
    }

    pub fn hdawgs(&self) -> &IndexMap<String, Hdawg> {
        &self.hdawgs
    }

    pub fn uhfqas(&self) -> &IndexMap<String, Uhfqa> {
        &self.uhfqas
    }

    pub fn others(&self) -> &IndexMap<String, GenericInstrument> {
        &self.others
    }

    pub fn hdawg(&self, name: &str) -> Result<&Hdawg> {
        self.hdawgs
            .get(name)
            .ok_or_else(|| Error::DeviceNotFound(name.to_string()))
    }

    pub fn hdawg_mut(&mut self, name: &str) -> Result<&mut Hdawg> {
        self.hdawgs
            .get_mut(name)
            .ok_or_else(|| Error::DeviceNotFound(name.to_string()))
    }

    pub fn uhfqa(&self, name: &str) -> Result<&Uhfqa> {
        self.uhfqas
            .get(name)
            .ok_or_else(|| Error::DeviceNotFound(name.to_string()))
    }

    pub fn uhfqa_mut(&mut self, name: &str) -> Result<&mut Uhfqa> {
        self.uhfqas
            .get_mut(name)
            .ok_or_else(|| Error::DeviceNotFound(name.to_string()))
    }

    pub fn other_mut(&mut self, name: &str) -> Result<&mut GenericInstrument> {
        self.others
            .get_mut(name)
            .ok_or_else(|| Error::DeviceNotFound(name.to_string()))
    }

    /// Split borrow of one HDAWG and one UHFQA, for experiments that drive
    /// both at once.
    pub fn hdawg_and_uhfqa_mut(
        &mut self,
        hdawg: &str,
        uhfqa: &str,
    ) -> Result<(&mut Hdawg, &mut Uhfqa)> {
        let hdawg = self
            .hdawgs
            .get_mut(hdawg)
            .ok_or_else(|| Error::DeviceNotFound(hdawg.to_string()))?;
        let uhfqa = self
            .uhfqas
            .get_mut(uhfqa)
            .ok_or_else(|| Error::DeviceNotFound(uhfqa.to_string()))?;
        Ok((hdawg, uhfqa))
    }
}

#[cfg(test)]
mod tests {
    use node_value::NodeValue;
    use toolkit_common::DeviceKind;

    use super::*;

    #[test]
    fn test_requires_setup() {
        let mut mdc = MultiDeviceConnection::new();
        assert!(matches!(
            mdc.connect_device(Hdawg::new("hdawg", "dev8000")),
            Err(Error::NoServer)
        ));
        assert!(mdc.hdawgs().is_empty());
    }

    #[test]
    fn test_shared_session() {
        let mut mdc = MultiDeviceConnection::new();
        mdc.setup(ApiConfig::default()).unwrap();
        mdc.connect_device(Hdawg::new("hdawg", "dev8000")).unwrap();
        mdc.connect_device(Uhfqa::new("qa", "dev2000")).unwrap();
        mdc.connect_device(GenericInstrument::new("pqsc", DeviceKind::Pqsc, "dev10000"))
            .unwrap();

        assert_eq!(mdc.hdawgs().len(), 1);
        assert_eq!(mdc.uhfqas().len(), 1);
        assert_eq!(mdc.others().len(), 1);
        assert!(mdc.hdawg("hdawg").unwrap().base().is_connected());
        assert!(matches!(
            mdc.uhfqa("hdawg"),
            Err(Error::DeviceNotFound(name)) if name == "hdawg"
        ));

        // Values written through one device are visible through the session.
        mdc.uhfqa_mut("qa")
            .unwrap()
            .base()
            .set("qas/0/result/length", 64)
            .unwrap();
        let connection = mdc.connection().unwrap();
        let values = connection
            .get(&["/dev2000/qas/0/result/length".to_string()])
            .unwrap();
        assert_eq!(
            values.get("/dev2000/qas/0/result/length"),
            Some(&NodeValue::Integer(64))
        );

        let (hdawg, uhfqa) = mdc.hdawg_and_uhfqa_mut("hdawg", "qa").unwrap();
        assert_eq!(hdawg.base().serial(), "dev8000");
        assert_eq!(uhfqa.base().serial(), "dev2000");
    }
}
