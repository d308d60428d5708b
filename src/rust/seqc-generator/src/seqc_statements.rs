// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use crate::seqc_generator::SeqCGenerator;

/// Format a float the way seqC literals are written: shortest round-trip
/// form, always with a decimal point for finite values.
pub fn format_float(value: f64) -> String {
    let text = format!("{value}");
    if value.is_finite() && !text.contains('.') {
        format!("{text}.0")
    } else {
        text
    }
}

/// Argument of a seqC function call.
#[derive(Debug, Clone, PartialEq)]
pub enum SeqCVariant {
    Bool(bool),
    String(String),
    Integer(i64),
    Float(f64),
}

impl fmt::Display for SeqCVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeqCVariant::Bool(b) => write!(f, "{b}"),
            SeqCVariant::String(s) => write!(f, "{s}"),
            SeqCVariant::Integer(i) => write!(f, "{i}"),
            SeqCVariant::Float(flt) => f.write_str(&format_float(*flt)),
        }
    }
}

impl From<i64> for SeqCVariant {
    fn from(value: i64) -> Self {
        SeqCVariant::Integer(value)
    }
}

impl From<u64> for SeqCVariant {
    fn from(value: u64) -> Self {
        SeqCVariant::Integer(value as i64)
    }
}

impl From<f64> for SeqCVariant {
    fn from(value: f64) -> Self {
        SeqCVariant::Float(value)
    }
}

impl From<bool> for SeqCVariant {
    fn from(value: bool) -> Self {
        SeqCVariant::Bool(value)
    }
}

impl From<&str> for SeqCVariant {
    fn from(value: &str) -> Self {
        SeqCVariant::String(value.to_string())
    }
}

impl From<String> for SeqCVariant {
    fn from(value: String) -> Self {
        SeqCVariant::String(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SeqCStatement {
    Comment {
        text: String,
    },
    BlankLine,
    FunctionCall {
        name: String,
        args: Vec<SeqCVariant>,
    },
    WaveDeclaration {
        wave_id: String,
        expression: String,
    },
    Repeat {
        num_repeats: u64,
        body: SeqCGenerator,
        complexity: u64,
    },
    /// Verbatim program text, e.g. a user supplied program.
    Raw {
        text: String,
    },
}

impl SeqCStatement {
    pub fn complexity(&self) -> u64 {
        match self {
            SeqCStatement::Repeat { complexity, .. } => *complexity,
            SeqCStatement::Comment { .. } | SeqCStatement::BlankLine => 0,
            SeqCStatement::Raw { text } => text.lines().count() as u64,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(0.5), "0.5");
        assert_eq!(format_float(-0.25), "-0.25");
        assert_eq!(format_float(1e-6), "0.000001");
        assert_eq!(format_float(100e6), "100000000.0");
        assert_eq!(format_float(f64::NAN), "NaN");
    }

    #[test]
    fn test_variant_display() {
        assert_eq!(SeqCVariant::from(3_i64).to_string(), "3");
        assert_eq!(SeqCVariant::from(2.0).to_string(), "2.0");
        assert_eq!(SeqCVariant::from(true).to_string(), "true");
        assert_eq!(SeqCVariant::from("QA_INT_ALL").to_string(), "QA_INT_ALL");
    }

    #[test]
    fn test_statement_complexity() {
        let wait = SeqCStatement::FunctionCall {
            name: "wait".to_string(),
            args: vec![SeqCVariant::Integer(10)],
        };
        assert_eq!(wait.complexity(), 1);
        let raw = SeqCStatement::Raw {
            text: "wait(1);\nwaitWave();\n".to_string(),
        };
        assert_eq!(raw.complexity(), 2);
        assert_eq!(SeqCStatement::BlankLine.complexity(), 0);
    }
}
