// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Parameter sweeps.
//!
//! A [`Sweep`] steps through a list of values. For each value a setter
//! applies it to the experiment and a measurement closure collects the
//! result. The first failing point aborts the sweep.

use std::fmt::Debug;

use crate::{Error, Result};

/// One measured point of a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepPoint<V, R> {
    pub value: V,
    pub result: R,
}

#[derive(Debug, Clone)]
pub struct Sweep<V> {
    name: String,
    values: Vec<V>,
}

impl<V: Debug> Sweep<V> {
    pub fn new(name: impl Into<String>, values: Vec<V>) -> Self {
        Sweep {
            name: name.into(),
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[V] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Apply and measure every value in order.
    ///
    /// `ctx` is the experiment state handed to both closures, typically the
    /// instruments involved.
    pub fn run<C, R, A, M>(
        &self,
        ctx: &mut C,
        mut apply: A,
        mut measure: M,
    ) -> Result<Vec<SweepPoint<V, R>>>
    where
        V: Clone,
        A: FnMut(&mut C, &V) -> Result<()>,
        M: FnMut(&mut C, &V) -> Result<R>,
    {
        let mut points = Vec::with_capacity(self.values.len());
        for (index, value) in self.values.iter().enumerate() {
            let result = apply(ctx, value)
                .and_then(|()| measure(ctx, value))
                .map_err(|source| Error::Sweep {
                    name: self.name.clone(),
                    index,
                    value: format!("{value:?}"),
                    source: Box::new(source),
                })?;
            toolkit_log::debug!("Sweep {}: point {} done", self.name, index);
            points.push(SweepPoint {
                value: value.clone(),
                result,
            });
        }
        toolkit_log::info!("Sweep {} finished with {} points", self.name, points.len());
        Ok(points)
    }
}

impl Sweep<f64> {
    /// `n` evenly spaced values from `start` to `stop`, both included.
    pub fn linspace(name: impl Into<String>, start: f64, stop: f64, n: usize) -> Self {
        let values = match n {
            0 => vec![],
            1 => vec![start],
            _ => {
                let step = (stop - start) / (n - 1) as f64;
                (0..n).map(|i| start + step * i as f64).collect()
            }
        };
        Sweep::new(name, values)
    }
}
