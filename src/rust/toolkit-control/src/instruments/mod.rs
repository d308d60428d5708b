// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Instrument drivers.
//!
//! Every instrument wraps a [`BaseInstrument`] holding its identity and data
//! server access. Instruments with AWG cores own one [`Awg`] implementation
//! per core.

mod awg;
mod hdawg;
mod readout_channel;
mod uhfqa;

pub use awg::{Awg, AwgCore};
pub use hdawg::{Hdawg, HdawgAwg};
pub use readout_channel::ReadoutChannel;
pub use uhfqa::{Uhfqa, UhfqaAwg};

use node_value::NodeValue;
use toolkit_common::DeviceKind;

use crate::config::{ApiConfig, AwgTiming, DeviceConfig, ToolkitConfig};
use crate::connection::{DeviceConnection, ZiConnection};
use crate::nodetree::Nodetree;
use crate::parameter::Parameter;
use crate::Result;

/// State common to all instruments.
pub struct BaseInstrument {
    device: DeviceConnection,
    api: ApiConfig,
    timing: AwgTiming,
    nodetree: Option<Nodetree>,
    options: Vec<String>,
}

impl BaseInstrument {
    pub fn new(name: &str, kind: DeviceKind, serial: &str) -> Self {
        BaseInstrument {
            device: DeviceConnection::new(name, serial, kind, "1GbE"),
            api: ApiConfig::default(),
            timing: AwgTiming::default(),
            nodetree: None,
            options: vec![],
        }
    }

    pub fn from_config(device: &DeviceConfig, config: &ToolkitConfig) -> Self {
        BaseInstrument {
            device: DeviceConnection::new(
                &device.name,
                &device.serial,
                device.kind,
                &device.interface,
            ),
            api: config.api.clone(),
            timing: config.timing,
            nodetree: None,
            options: vec![],
        }
    }

    pub fn name(&self) -> &str {
        self.device.name()
    }

    pub fn kind(&self) -> DeviceKind {
        self.device.kind()
    }

    pub fn serial(&self) -> &str {
        self.device.serial()
    }

    pub fn interface(&self) -> &str {
        self.device.interface()
    }

    pub fn api(&self) -> &ApiConfig {
        &self.api
    }

    pub fn timing(&self) -> AwgTiming {
        self.timing
    }

    pub fn device(&self) -> &DeviceConnection {
        &self.device
    }

    pub fn is_connected(&self) -> bool {
        self.device.is_connected()
    }

    /// Installed device options, available after `connect_device`.
    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn nodetree(&self) -> Option<&Nodetree> {
        self.nodetree.as_ref()
    }

    pub fn nodetree_mut(&mut self) -> Option<&mut Nodetree> {
        self.nodetree.as_mut()
    }

    /// Nodetree parameter at `path`.
    pub fn parameter_mut(&mut self, path: &str) -> Option<&mut Parameter> {
        self.nodetree.as_mut()?.parameter_mut(path)
    }

    /// Attach to a data server session. Without an existing session a new one
    /// is opened on an in-process virtual data server using the instrument's
    /// API configuration.
    pub fn setup(&mut self, connection: Option<ZiConnection>) -> Result<()> {
        let connection =
            connection.unwrap_or_else(|| ZiConnection::new_virtual(self.api.clone()));
        self.device.setup(connection)
    }

    fn connect(&mut self, with_nodetree: bool) -> Result<()> {
        self.device.connect_device()?;
        if with_nodetree {
            let nodetree = Nodetree::from_device(&self.device)?;
            toolkit_log::debug!(
                "Nodetree of {} holds {} parameters",
                self.name(),
                nodetree.num_parameters()
            );
            self.nodetree = Some(nodetree);
        }
        self.options = self
            .device
            .get("features/options")?
            .as_str()?
            .split('\n')
            .map(str::trim)
            .filter(|option| !option.is_empty())
            .map(str::to_string)
            .collect();
        Ok(())
    }

    pub fn set(&self, path: &str, value: impl Into<NodeValue>) -> Result<()> {
        self.device.set(path, value)
    }

    pub fn set_batch<I, S>(&self, settings: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, NodeValue)>,
        S: AsRef<str>,
    {
        self.device.set_batch(settings)
    }

    pub fn get(&self, path: &str) -> Result<NodeValue> {
        self.device.get(path)
    }
}

/// A connected Zurich Instruments device.
pub trait Instrument {
    fn base(&self) -> &BaseInstrument;

    fn base_mut(&mut self) -> &mut BaseInstrument;

    /// Settings applied right after the device is connected.
    fn init_settings(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        self.base().name()
    }

    fn setup(&mut self, connection: Option<ZiConnection>) -> Result<()> {
        self.base_mut().setup(connection)
    }

    /// Connect the device to the data server, read its nodetree and options
    /// and apply the initial settings.
    fn connect_device(&mut self, with_nodetree: bool) -> Result<()> {
        self.base_mut().connect(with_nodetree)?;
        self.init_settings()?;
        toolkit_log::info!(
            "Connected {} ({}) with options {:?}",
            self.base().name(),
            self.base().serial(),
            self.base().options()
        );
        Ok(())
    }
}

/// Instrument without device-specific behavior, used for UHFLI, MFLI and
/// PQSC.
pub struct GenericInstrument {
    base: BaseInstrument,
}

impl GenericInstrument {
    pub fn new(name: &str, kind: DeviceKind, serial: &str) -> Self {
        GenericInstrument {
            base: BaseInstrument::new(name, kind, serial),
        }
    }

    pub fn from_config(device: &DeviceConfig, config: &ToolkitConfig) -> Self {
        GenericInstrument {
            base: BaseInstrument::from_config(device, config),
        }
    }
}

impl Instrument for GenericInstrument {
    fn base(&self) -> &BaseInstrument {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseInstrument {
        &mut self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_generic_instrument() {
        let mut mfli = GenericInstrument::new("lockin", DeviceKind::Mfli, "DEV3000");
        assert!(matches!(
            mfli.connect_device(true),
            Err(Error::NotConnected { .. })
        ));
        mfli.setup(None).unwrap();
        mfli.connect_device(true).unwrap();
        assert_eq!(mfli.base().options(), ["MD"]);
        assert_eq!(mfli.base().serial(), "dev3000");
        let freq = mfli.base_mut().parameter_mut("oscs/1/freq").unwrap();
        freq.set(1.5e6).unwrap();
        assert_eq!(
            mfli.base().get("oscs/1/freq").unwrap(),
            NodeValue::Double(1.5e6)
        );
    }

    #[test]
    fn test_without_nodetree() {
        let mut pqsc = GenericInstrument::new("pqsc", DeviceKind::Pqsc, "dev10000");
        pqsc.setup(None).unwrap();
        pqsc.connect_device(false).unwrap();
        assert!(pqsc.base().nodetree().is_none());
        assert!(pqsc.base().options().is_empty());
        pqsc.base().set("execution/repetitions", 50).unwrap();
    }
}
