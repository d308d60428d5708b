// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Values exchanged with the data server.
//!
//! A node holds either a scalar (integer, double, complex, string) or a
//! vector. Vectors carry waveform data (`Integer16`), integration weights and
//! readout results (`Float64`) and complex demodulator data (`Complex64`).

use std::fmt;

use num_complex::Complex;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("Expected a value of type {expected}, got {found}")]
pub struct TypeMismatch {
    pub expected: &'static str,
    pub found: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NumericArray {
    Integer16(Vec<i16>),
    Integer64(Vec<i64>),
    Float64(Vec<f64>),
    Complex64(Vec<Complex<f64>>),
}

impl NumericArray {
    pub fn abs_at_index(&self, index: usize) -> Option<f64> {
        match self {
            NumericArray::Integer16(vec) => vec.get(index).map(|x| (*x as f64).abs()),
            NumericArray::Integer64(vec) => vec.get(index).map(|x| x.abs() as f64),
            NumericArray::Float64(vec) => vec.get(index).map(|x| x.abs()),
            NumericArray::Complex64(vec) => vec.get(index).map(|x| x.norm()),
        }
    }

    /// Largest absolute value, 0 for an empty array.
    pub fn max_abs(&self) -> f64 {
        (0..self.len())
            .filter_map(|i| self.abs_at_index(i))
            .fold(0.0, f64::max)
    }

    pub fn len(&self) -> usize {
        match self {
            NumericArray::Integer16(vec) => vec.len(),
            NumericArray::Integer64(vec) => vec.len(),
            NumericArray::Float64(vec) => vec.len(),
            NumericArray::Complex64(vec) => vec.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            NumericArray::Integer16(vec) => vec.is_empty(),
            NumericArray::Integer64(vec) => vec.is_empty(),
            NumericArray::Float64(vec) => vec.is_empty(),
            NumericArray::Complex64(vec) => vec.is_empty(),
        }
    }

    /// Real-valued copy of the data. Complex entries map to their real part.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            NumericArray::Integer16(vec) => vec.iter().map(|x| *x as f64).collect(),
            NumericArray::Integer64(vec) => vec.iter().map(|x| *x as f64).collect(),
            NumericArray::Float64(vec) => vec.clone(),
            NumericArray::Complex64(vec) => vec.iter().map(|x| x.re).collect(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            NumericArray::Integer16(_) => "int16 vector",
            NumericArray::Integer64(_) => "int64 vector",
            NumericArray::Float64(_) => "double vector",
            NumericArray::Complex64(_) => "complex vector",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeValue {
    Integer(i64),
    Double(f64),
    Complex(Complex<f64>),
    String(String),
    Vector(NumericArray),
}

impl NodeValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeValue::Integer(_) => "integer",
            NodeValue::Double(_) => "double",
            NodeValue::Complex(_) => "complex",
            NodeValue::String(_) => "string",
            NodeValue::Vector(v) => v.type_name(),
        }
    }

    fn mismatch(&self, expected: &'static str) -> TypeMismatch {
        TypeMismatch {
            expected,
            found: self.type_name().to_string(),
        }
    }

    /// Integer view. Doubles are accepted if they hold an integral value.
    pub fn as_i64(&self) -> Result<i64, TypeMismatch> {
        match self {
            NodeValue::Integer(v) => Ok(*v),
            NodeValue::Double(v) if v.fract() == 0.0 => Ok(*v as i64),
            _ => Err(self.mismatch("integer")),
        }
    }

    pub fn as_f64(&self) -> Result<f64, TypeMismatch> {
        match self {
            NodeValue::Integer(v) => Ok(*v as f64),
            NodeValue::Double(v) => Ok(*v),
            _ => Err(self.mismatch("double")),
        }
    }

    pub fn as_complex(&self) -> Result<Complex<f64>, TypeMismatch> {
        match self {
            NodeValue::Integer(v) => Ok(Complex::new(*v as f64, 0.0)),
            NodeValue::Double(v) => Ok(Complex::new(*v, 0.0)),
            NodeValue::Complex(v) => Ok(*v),
            _ => Err(self.mismatch("complex")),
        }
    }

    pub fn as_str(&self) -> Result<&str, TypeMismatch> {
        match self {
            NodeValue::String(s) => Ok(s),
            _ => Err(self.mismatch("string")),
        }
    }

    pub fn as_vector(&self) -> Result<&NumericArray, TypeMismatch> {
        match self {
            NodeValue::Vector(v) => Ok(v),
            _ => Err(self.mismatch("vector")),
        }
    }
}

impl fmt::Display for NodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeValue::Integer(v) => write!(f, "{v}"),
            NodeValue::Double(v) => write!(f, "{v}"),
            NodeValue::Complex(v) => write!(f, "{v}"),
            NodeValue::String(s) => write!(f, "{s}"),
            NodeValue::Vector(v) => write!(f, "<{} of length {}>", v.type_name(), v.len()),
        }
    }
}

impl From<i64> for NodeValue {
    fn from(value: i64) -> Self {
        NodeValue::Integer(value)
    }
}

impl From<i32> for NodeValue {
    fn from(value: i32) -> Self {
        NodeValue::Integer(value.into())
    }
}

impl From<u32> for NodeValue {
    fn from(value: u32) -> Self {
        NodeValue::Integer(value.into())
    }
}

impl From<bool> for NodeValue {
    fn from(value: bool) -> Self {
        NodeValue::Integer(value.into())
    }
}

impl From<f64> for NodeValue {
    fn from(value: f64) -> Self {
        NodeValue::Double(value)
    }
}

impl From<Complex<f64>> for NodeValue {
    fn from(value: Complex<f64>) -> Self {
        NodeValue::Complex(value)
    }
}

impl From<&str> for NodeValue {
    fn from(value: &str) -> Self {
        NodeValue::String(value.to_string())
    }
}

impl From<String> for NodeValue {
    fn from(value: String) -> Self {
        NodeValue::String(value)
    }
}

impl From<Vec<i16>> for NodeValue {
    fn from(value: Vec<i16>) -> Self {
        NodeValue::Vector(NumericArray::Integer16(value))
    }
}

impl From<Vec<f64>> for NodeValue {
    fn from(value: Vec<f64>) -> Self {
        NodeValue::Vector(NumericArray::Float64(value))
    }
}

impl From<NumericArray> for NodeValue {
    fn from(value: NumericArray) -> Self {
        NodeValue::Vector(value)
    }
}
