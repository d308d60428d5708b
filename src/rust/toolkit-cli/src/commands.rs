// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use sequence_program::{SequenceProgram, SequenceSettings};
use toolkit_common::{DeviceKind, SequenceType, TriggerMode};
use toolkit_control::{
    Awg, AwgTiming, DeviceConfig, Hdawg, MultiDeviceConnection, Sweep, SweepPoint,
    ToolkitConfig, Uhfqa,
};

const DEMO_REPETITIONS: u64 = 16;
const DEMO_TIMEOUT: Duration = Duration::from_secs(5);

/// Generate the program described by the settings file at `path`.
pub fn seqc(path: &Path, device: DeviceKind) -> anyhow::Result<String> {
    let settings = SequenceSettings::from_file(path)?;
    if let Some(sequence_type) = settings.sequence_type
        && !device.traits().supports_sequence(sequence_type)
    {
        bail!("Sequence type '{sequence_type}' is not supported by {device}");
    }
    let mut program = SequenceProgram::for_target(device);
    program.set_params(&settings)?;
    Ok(program.seqc()?)
}

pub fn write_program(path: &Path, program: &str) -> anyhow::Result<()> {
    std::fs::write(path, program).with_context(|| format!("Failed to write {}", path.display()))?;
    toolkit_log::info!("Sequence program written to {}", path.display());
    Ok(())
}

/// One line per device: `<device>: <type>, <type>, ...`
pub fn types(device: Option<DeviceKind>) -> String {
    let devices: Vec<DeviceKind> = match device {
        Some(device) => vec![device],
        None => DeviceKind::ALL
            .into_iter()
            .filter(|kind| kind.traits().has_awg())
            .collect(),
    };
    devices
        .into_iter()
        .map(|device| {
            let names = device
                .traits()
                .supported_sequences
                .iter()
                .map(SequenceType::name)
                .collect::<Vec<_>>()
                .join(", ");
            format!("{device}: {names}\n")
        })
        .collect()
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<ToolkitConfig> {
    match path {
        Some(path) => Ok(ToolkitConfig::from_file(path)?),
        None => Ok(default_config()),
    }
}

/// An HDAWG and a UHFQA with fast polling, for running the demo without a
/// configuration file.
fn default_config() -> ToolkitConfig {
    let device = |name: &str, kind, serial: &str| DeviceConfig {
        name: name.to_string(),
        kind,
        serial: serial.to_string(),
        interface: "1GbE".to_string(),
    };
    ToolkitConfig {
        timing: AwgTiming {
            poll_interval: Duration::from_millis(10),
            ..AwgTiming::default()
        },
        devices: vec![
            device("hdawg", DeviceKind::Hdawg, "dev8000"),
            device("uhfqa", DeviceKind::Uhfqa, "dev2000"),
        ],
        ..ToolkitConfig::default()
    }
}

fn first_of_kind(config: &ToolkitConfig, kind: DeviceKind) -> anyhow::Result<&DeviceConfig> {
    config
        .devices
        .iter()
        .find(|device| device.kind == kind)
        .with_context(|| format!("The configuration holds no {kind}"))
}

/// Rabi amplitude sweep: the HDAWG plays the drive pulse and triggers the
/// UHFQA, which reads out channel 0. Returns the mean readout result per
/// amplitude.
pub fn demo(config: &ToolkitConfig, points: usize) -> anyhow::Result<Vec<SweepPoint<f64, f64>>> {
    let hdawg_config = first_of_kind(config, DeviceKind::Hdawg)?;
    let uhfqa_config = first_of_kind(config, DeviceKind::Uhfqa)?;
    let (drive_name, readout_name) = (hdawg_config.name.as_str(), uhfqa_config.name.as_str());

    let mut mdc = MultiDeviceConnection::new();
    mdc.setup(config.api.clone())?;
    mdc.connect_device(Hdawg::from_config(hdawg_config, config))?;
    mdc.connect_device(Uhfqa::from_config(uhfqa_config, config))?;

    let (hdawg, uhfqa) = mdc.hdawg_and_uhfqa_mut(drive_name, readout_name)?;
    let drive = hdawg.awg_mut(0)?;
    drive.set_sequence_params(
        &SequenceSettings::new()
            .sequence_type(SequenceType::Rabi)
            .trigger_mode(TriggerMode::SendTrigger)
            .pulse_amplitudes([1.0])
            .repetitions(DEMO_REPETITIONS),
    )?;
    drive.set_outputs("on", "on")?;
    drive.compile()?;

    uhfqa.enable_readout_channels(&[0])?;
    uhfqa.awg_mut().set_sequence_params(
        &SequenceSettings::new()
            .sequence_type(SequenceType::Readout)
            .trigger_mode(TriggerMode::ExternalTrigger)
            .repetitions(DEMO_REPETITIONS),
    )?;
    uhfqa.awg_mut().compile()?;

    let sweep = Sweep::linspace("amplitude", 0.0, 1.0, points);
    let results = sweep.run(
        &mut mdc,
        |mdc, amplitude| {
            mdc.hdawg_mut(drive_name)?
                .awg_mut(0)?
                .gain1
                .set(*amplitude)
        },
        |mdc, _| {
            let (hdawg, uhfqa) = mdc.hdawg_and_uhfqa_mut(drive_name, readout_name)?;
            uhfqa.arm(Some(DEMO_REPETITIONS), Some(1))?;
            uhfqa.awg().run()?;
            let drive = hdawg.awg_mut(0)?;
            drive.run()?;
            drive.wait_done(DEMO_TIMEOUT)?;
            uhfqa.awg().wait_done(DEMO_TIMEOUT)?;
            let result = uhfqa.channel_mut(0)?.result_vector()?;
            Ok(result.iter().sum::<f64>() / result.len().max(1) as f64)
        },
    )?;
    Ok(results)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn settings_file(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_seqc() {
        let file = settings_file(
            r#"{"sequence_type": "Rabi", "pulse_amplitudes": [0.5], "repetitions": 3}"#,
        );
        let program = seqc(file.path(), DeviceKind::Hdawg).unwrap();
        assert!(program.contains("repeat (3) {"));
        assert!(program.contains("playWave(0.5*w_1, 0.5*w_2);"));

        let err = seqc(file.path(), DeviceKind::Uhfqa).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Sequence type 'Rabi' is not supported by uhfqa"
        );
    }

    #[test]
    fn test_write_program() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rabi.seqc");
        write_program(&path, "setTrigger(0);\n").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "setTrigger(0);\n");
    }

    #[test]
    fn test_types() {
        assert_eq!(
            types(Some(DeviceKind::Hdawg)),
            "hdawg: None, Simple, Rabi, T1, T2*, Custom, Trigger\n"
        );
        let all = types(None);
        assert_eq!(all.lines().count(), 2);
        assert!(all.contains("uhfqa: Simple, Readout, CW Spectroscopy, Pulsed Spectroscopy, Custom\n"));
    }

    #[test]
    fn test_demo() {
        let config = load_config(None).unwrap();
        let points = demo(&config, 3).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[2].value, 1.0);
        // Every acquisition shifts the virtual readout signal.
        for (n, point) in points.iter().enumerate() {
            let expected = (0.4 * (n + 1) as f64).cos();
            assert!((point.result - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_demo_needs_both_devices() {
        let config = ToolkitConfig::from_json(
            r#"{"devices": [{"name": "hd", "kind": "hdawg", "serial": "dev8001"}]}"#,
        )
        .unwrap();
        let err = demo(&config, 2).unwrap_err();
        assert_eq!(err.to_string(), "The configuration holds no uhfqa");
    }
}
