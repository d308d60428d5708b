// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use node_value::NodeValue;

use crate::connection::AwgModule;
use crate::{Error, Result};

const COMPILING: i64 = -1;
const COMPILE_OK: i64 = 0;
const COMPILE_ERROR: i64 = 1;
const COMPILE_WARNING: i64 = 2;

const ELF_DONE: i64 = 0;
const ELF_FAILED: i64 = 1;
const ELF_IN_PROGRESS: i64 = 2;

/// Simulated AWG module.
///
/// A source string is "compiled" by a few static checks. The compiler status
/// reads `-1` for one poll before the result is available, the ELF status
/// reads `2` for one poll before the upload completes, or fails if uploads
/// are set to fail.
#[derive(Debug, Clone)]
pub struct VirtualAwgModule {
    device: String,
    index: i64,
    source: String,
    compiler_status: i64,
    pending_status: i64,
    status_string: String,
    elf_status: i64,
    failing_uploads: bool,
}

impl Default for VirtualAwgModule {
    fn default() -> Self {
        VirtualAwgModule {
            device: String::new(),
            index: 0,
            source: String::new(),
            compiler_status: COMPILE_OK,
            pending_status: COMPILE_OK,
            status_string: String::new(),
            elf_status: ELF_DONE,
            failing_uploads: false,
        }
    }
}

/// Static checks of a seqC program, returning status and status string.
fn check_source(source: &str) -> (i64, String) {
    if source.trim().is_empty() {
        return (COMPILE_ERROR, "Program is empty".to_string());
    }
    let mut depth = [0_i64; 2];
    for c in source.chars() {
        match c {
            '{' => depth[0] += 1,
            '}' => depth[0] -= 1,
            '(' => depth[1] += 1,
            ')' => depth[1] -= 1,
            _ => {}
        }
        if depth.iter().any(|d| *d < 0) {
            break;
        }
    }
    if depth != [0, 0] {
        return (
            COMPILE_ERROR,
            "Syntax error: unbalanced braces or parentheses".to_string(),
        );
    }
    if source.contains("wave w") && !source.contains("playWave") {
        return (
            COMPILE_WARNING,
            "Declared waveforms are never played".to_string(),
        );
    }
    (COMPILE_OK, String::new())
}

impl VirtualAwgModule {
    pub(super) fn set_failing_uploads(&mut self, failing: bool) {
        self.failing_uploads = failing;
    }

    fn compile(&mut self, source: String) {
        let (status, status_string) = check_source(&source);
        self.source = source;
        self.compiler_status = COMPILING;
        self.pending_status = status;
        self.status_string = status_string;
        self.elf_status = if status == COMPILE_ERROR {
            ELF_DONE
        } else {
            ELF_IN_PROGRESS
        };
    }
}

fn normalize(path: &str) -> &str {
    path.trim_start_matches('/')
}

impl AwgModule for VirtualAwgModule {
    fn set(&mut self, path: &str, value: NodeValue) -> Result<()> {
        match normalize(path) {
            "device" => self.device = value.as_str()?.to_string(),
            "index" => self.index = value.as_i64()?,
            "compiler/sourcestring" => self.compile(value.as_str()?.to_string()),
            other => return Err(Error::NodeNotFound(format!("awgModule/{other}"))),
        }
        Ok(())
    }

    fn get_int(&mut self, path: &str) -> Result<i64> {
        match normalize(path) {
            "index" => Ok(self.index),
            "compiler/status" => {
                let status = self.compiler_status;
                if status == COMPILING {
                    self.compiler_status = self.pending_status;
                }
                Ok(status)
            }
            "elf/status" => {
                let status = self.elf_status;
                if status == ELF_IN_PROGRESS && self.compiler_status != COMPILING {
                    self.elf_status = if self.failing_uploads {
                        ELF_FAILED
                    } else {
                        ELF_DONE
                    };
                }
                Ok(status)
            }
            other => Err(Error::NodeNotFound(format!("awgModule/{other}"))),
        }
    }

    fn get_string(&mut self, path: &str) -> Result<String> {
        match normalize(path) {
            "device" => Ok(self.device.clone()),
            "compiler/sourcestring" => Ok(self.source.clone()),
            "compiler/statusstring" => Ok(self.status_string.clone()),
            other => Err(Error::NodeNotFound(format!("awgModule/{other}"))),
        }
    }
}
