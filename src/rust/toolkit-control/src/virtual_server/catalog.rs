// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Node catalogs of the simulated devices.

use indexmap::IndexMap;
use node_value::{NodeValue, NumericArray};
use num_complex::Complex;
use toolkit_common::DeviceKind;

/// Length of the UHFQA integration weight vectors.
pub(super) const WEIGHTS_LENGTH: usize = 4096;

#[derive(Debug, Clone)]
pub(super) struct VirtualNode {
    pub description: &'static str,
    pub unit: &'static str,
    pub writable: bool,
    pub options: &'static [(i64, &'static str)],
    pub value: NodeValue,
}

impl VirtualNode {
    pub fn type_label(&self) -> &'static str {
        match self.value {
            NodeValue::Integer(_) => "Integer (64 bit)",
            NodeValue::Double(_) => "Double",
            NodeValue::Complex(_) => "Complex Double",
            NodeValue::String(_) => "String",
            NodeValue::Vector(_) => "ZIVectorData",
        }
    }

    pub fn properties(&self) -> &'static str {
        if self.writable {
            "Read, Write, Setting"
        } else {
            "Read"
        }
    }
}

#[derive(Default)]
struct Catalog {
    nodes: IndexMap<String, VirtualNode>,
}

impl Catalog {
    fn add(
        &mut self,
        path: String,
        value: impl Into<NodeValue>,
        writable: bool,
        unit: &'static str,
        description: &'static str,
    ) -> &mut VirtualNode {
        self.nodes.entry(path).or_insert(VirtualNode {
            description,
            unit,
            writable,
            options: &[],
            value: value.into(),
        })
    }

    fn rw(
        &mut self,
        path: String,
        value: impl Into<NodeValue>,
        unit: &'static str,
        description: &'static str,
    ) -> &mut VirtualNode {
        self.add(path, value, true, unit, description)
    }

    fn ro(&mut self, path: String, value: impl Into<NodeValue>, description: &'static str) {
        self.add(path, value, false, "None", description);
    }

    fn features(&mut self, devtype: &str, options: &str) {
        self.ro("features/devtype".into(), devtype, "Device type.");
        self.ro(
            "features/options".into(),
            options,
            "Installed options, separated by newlines.",
        );
    }
}

const INTEGRATION_MODES: &[(i64, &str)] = &[
    (0, "\"standard\": Standard weighted integration"),
    (1, "\"spectroscopy\": Spectroscopy mode"),
];

fn hdawg(c: &mut Catalog) {
    c.features("HDAWG8", "MF\nME\nSKW\nPC");
    c.rw(
        "system/clocks/referenceclock/source".into(),
        0,
        "None",
        "Reference clock source. 0: internal, 1: external, 2: ZSync.",
    );
    c.rw(
        "system/awg/oscillatorcontrol".into(),
        0,
        "None",
        "Oscillator frequency and phase control by the AWG sequencer.",
    );
    for i in 0..8 {
        c.rw(format!("sigouts/{i}/on"), 0, "None", "Enables the signal output.");
        c.rw(
            format!("sines/{i}/phaseshift"),
            0.0,
            "deg",
            "Phase shift applied to the sine generator.",
        );
        c.rw(
            format!("sines/{i}/oscselect"),
            0,
            "None",
            "Oscillator used by the sine generator.",
        );
        c.rw(
            format!("triggers/in/{i}/level"),
            0.0,
            "V",
            "Trigger level of the trigger input.",
        );
    }
    for i in 0..16 {
        c.rw(format!("oscs/{i}/freq"), 10e6, "Hz", "Oscillator frequency.");
    }
    for i in 0..4 {
        c.rw(format!("awgs/{i}/enable"), 0, "None", "Runs the AWG sequencer.");
        c.rw(
            format!("awgs/{i}/single"),
            0,
            "None",
            "Puts the sequencer into single shot mode.",
        );
        for out in 0..2 {
            for gain in 0..2 {
                c.rw(
                    format!("awgs/{i}/outputs/{out}/gains/{gain}"),
                    1.0,
                    "None",
                    "Gain of the AWG output.",
                );
            }
            c.rw(
                format!("awgs/{i}/outputs/{out}/modulation/mode"),
                0,
                "None",
                "Modulation mode of the AWG output.",
            );
            c.rw(
                format!("awgs/{i}/auxtriggers/{out}/channel"),
                0,
                "None",
                "Trigger input used by the AWG.",
            );
            c.rw(
                format!("awgs/{i}/auxtriggers/{out}/slope"),
                0,
                "None",
                "Edge of the AWG trigger. 0: level, 1: rise, 2: fall, 3: both.",
            );
        }
    }
}

fn uhfqa(c: &mut Catalog) {
    c.features("UHFQA", "QA\nAWG");
    for i in 0..2 {
        c.rw(format!("sigouts/{i}/on"), 0, "None", "Enables the signal output.");
        for j in 0..8 {
            c.rw(
                format!("sigouts/{i}/enables/{j}"),
                0,
                "None",
                "Adds the demodulator signal to the output.",
            );
            c.rw(
                format!("sigouts/{i}/amplitudes/{j}"),
                0.0,
                "V",
                "Amplitude of the demodulator signal added to the output.",
            );
        }
    }
    c.rw("awgs/0/enable".into(), 0, "None", "Runs the AWG sequencer.");
    c.rw(
        "awgs/0/single".into(),
        0,
        "None",
        "Puts the sequencer into single shot mode.",
    );
    for out in 0..2 {
        c.rw(
            format!("awgs/0/outputs/{out}/amplitude"),
            1.0,
            "None",
            "Amplitude scaling of the AWG output.",
        );
        c.rw(
            format!("awgs/0/outputs/{out}/mode"),
            0,
            "None",
            "Output mode. 0: plain, 1: modulation.",
        );
        c.rw(
            format!("awgs/0/auxtriggers/{out}/channel"),
            0,
            "None",
            "Trigger input used by the AWG.",
        );
        c.rw(
            format!("awgs/0/auxtriggers/{out}/slope"),
            0,
            "None",
            "Edge of the AWG trigger. 0: level, 1: rise, 2: fall, 3: both.",
        );
    }
    c.rw(
        "qas/0/integration/mode".into(),
        0,
        "None",
        "Integration mode of the quantum analyzer.",
    )
    .options = INTEGRATION_MODES;
    c.rw(
        "qas/0/integration/length".into(),
        4096,
        "Samples",
        "Number of samples integrated.",
    );
    for ch in 0..10 {
        for part in ["real", "imag"] {
            c.rw(
                format!("qas/0/integration/weights/{ch}/{part}"),
                NumericArray::Float64(vec![0.0; WEIGHTS_LENGTH]),
                "None",
                "Integration weights of the readout channel.",
            );
        }
        c.rw(
            format!("qas/0/rotations/{ch}"),
            Complex::new(1.0, 0.0),
            "None",
            "Rotation applied to the integration result.",
        );
        c.rw(
            format!("qas/0/thresholds/{ch}/level"),
            0.0,
            "None",
            "Discrimination threshold of the readout channel.",
        );
        c.ro(
            format!("qas/0/result/data/{ch}/wave"),
            NumericArray::Float64(vec![]),
            "Result vector of the readout channel.",
        );
    }
    for row in 0..10 {
        for col in 0..10 {
            c.rw(
                format!("qas/0/crosstalk/rows/{row}/cols/{col}"),
                if row == col { 1.0 } else { 0.0 },
                "None",
                "Crosstalk suppression matrix element.",
            );
        }
    }
    c.rw(
        "qas/0/result/length".into(),
        1000,
        "None",
        "Number of results per readout channel.",
    );
    c.rw(
        "qas/0/result/averages".into(),
        1,
        "None",
        "Number of averages per result.",
    );
    c.rw(
        "qas/0/result/source".into(),
        7,
        "None",
        "Signal source of the result unit.",
    );
    c.rw("qas/0/result/reset".into(), 0, "None", "Resets the result unit.");
    c.rw(
        "qas/0/result/enable".into(),
        0,
        "None",
        "Arms the result unit.",
    );
}

fn lock_in(c: &mut Catalog, devtype: &str, options: &str, demods: usize) {
    c.features(devtype, options);
    c.rw("sigouts/0/on".into(), 0, "None", "Enables the signal output.");
    for i in 0..demods {
        c.rw(format!("oscs/{i}/freq"), 10e6, "Hz", "Oscillator frequency.");
        c.rw(
            format!("demods/{i}/enable"),
            0,
            "None",
            "Enables the data stream of the demodulator.",
        );
        c.rw(
            format!("demods/{i}/rate"),
            1.0e3,
            "1/s",
            "Sample rate of the demodulator data stream.",
        );
    }
}

fn pqsc(c: &mut Catalog) {
    c.features("PQSC", "");
    c.rw(
        "execution/enable".into(),
        0,
        "None",
        "Starts the trigger generation.",
    );
    c.rw(
        "execution/repetitions".into(),
        1,
        "None",
        "Number of triggers sent.",
    );
    c.rw(
        "execution/holdoff".into(),
        1e-6,
        "s",
        "Hold-off time between triggers.",
    );
}

/// Nodes of a device of `kind`, keyed by their device-relative lowercase path.
pub(super) fn nodes_for(kind: DeviceKind) -> IndexMap<String, VirtualNode> {
    let mut catalog = Catalog::default();
    match kind {
        DeviceKind::Hdawg => hdawg(&mut catalog),
        DeviceKind::Uhfqa => uhfqa(&mut catalog),
        DeviceKind::Uhfli => lock_in(&mut catalog, "UHFLI", "AWG\nDIG", 8),
        DeviceKind::Mfli => lock_in(&mut catalog, "MFLI", "MD", 4),
        DeviceKind::Pqsc => pqsc(&mut catalog),
    }
    catalog.nodes
}
