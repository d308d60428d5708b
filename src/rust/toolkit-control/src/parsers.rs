// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Value parsers attached to [`Parameter`](crate::Parameter)s.
//!
//! A set parser validates and converts a user value before it is written to
//! the device, a get parser converts the raw node value for the user.

use node_value::NodeValue;
use num_complex::Complex;

use crate::{Error, Result};

pub type Parser = fn(NodeValue) -> Result<NodeValue>;

/// Sampling rate of the UHFQA integration units.
const QA_SAMPLING_RATE: f64 = 1.8e9;

const RESULT_SOURCES: [(i64, &str); 6] = [
    (0, "Crosstalk"),
    (1, "Threshold"),
    (2, "Rotation"),
    (4, "Crosstalk Correlation"),
    (5, "Threshold Correlation"),
    (7, "Integration"),
];

pub fn set_on_off(value: NodeValue) -> Result<NodeValue> {
    match value {
        NodeValue::String(s) => match s.to_lowercase().as_str() {
            "on" => Ok(NodeValue::Integer(1)),
            "off" => Ok(NodeValue::Integer(0)),
            _ => Err(Error::invalid_value(
                "on/off",
                format!("'{s}', allowed are 'on', 'off', 1 and 0"),
            )),
        },
        other => match other.as_i64()? {
            v @ (0 | 1) => Ok(NodeValue::Integer(v)),
            v => Err(Error::invalid_value(
                "on/off",
                format!("{v}, allowed are 'on', 'off', 1 and 0"),
            )),
        },
    }
}

pub fn get_on_off(value: NodeValue) -> Result<NodeValue> {
    let state = if value.as_i64()? == 0 { "off" } else { "on" };
    Ok(NodeValue::String(state.to_string()))
}

pub fn amp1(value: NodeValue) -> Result<NodeValue> {
    let v = value.as_f64()?;
    if v.abs() > 1.0 {
        return Err(Error::invalid_value(
            "amplitude",
            format!("{v} is out of range, must be within -1.0 and 1.0"),
        ));
    }
    Ok(value)
}

pub fn abs90(value: NodeValue) -> Result<NodeValue> {
    let v = value.as_f64()?;
    if v.abs() >= 90.0 {
        return Err(Error::invalid_value(
            "phase",
            format!("{v} is out of range, must be within -90 and 90 degrees"),
        ));
    }
    Ok(value)
}

pub fn greater0(value: NodeValue) -> Result<NodeValue> {
    let v = value.as_f64()?;
    if v <= 0.0 {
        return Err(Error::invalid_value(
            "value",
            format!("{v} must be greater than 0"),
        ));
    }
    Ok(value)
}

/// Phase in degrees to a unit complex rotation.
pub fn deg2complex(value: NodeValue) -> Result<NodeValue> {
    let deg = value.as_f64()?;
    Ok(NodeValue::Complex(Complex::from_polar(1.0, deg.to_radians())))
}

pub fn complex2deg(value: NodeValue) -> Result<NodeValue> {
    Ok(NodeValue::Double(value.as_complex()?.arg().to_degrees()))
}

/// Integration time in seconds to samples.
pub fn qa_time2samples(value: NodeValue) -> Result<NodeValue> {
    let t = greater0(value)?.as_f64()?;
    Ok(NodeValue::Integer((t * QA_SAMPLING_RATE) as i64))
}

pub fn qa_samples2time(value: NodeValue) -> Result<NodeValue> {
    let samples = greater0(value)?.as_f64()?;
    Ok(NodeValue::Double(samples / QA_SAMPLING_RATE))
}

pub fn set_result_source(value: NodeValue) -> Result<NodeValue> {
    let name = value.as_str()?;
    RESULT_SOURCES
        .iter()
        .find(|(_, n)| n.eq_ignore_ascii_case(name))
        .map(|(code, _)| NodeValue::Integer(*code))
        .ok_or_else(|| {
            let allowed = RESULT_SOURCES
                .iter()
                .map(|(_, n)| format!("'{n}'"))
                .collect::<Vec<_>>()
                .join(", ");
            Error::invalid_value(
                "result source",
                format!("'{name}', must be one of {allowed}"),
            )
        })
}

pub fn get_result_source(value: NodeValue) -> Result<NodeValue> {
    let code = value.as_i64()?;
    RESULT_SOURCES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| NodeValue::String(name.to_string()))
        .ok_or_else(|| Error::invalid_value("result source", format!("unknown code {code}")))
}
