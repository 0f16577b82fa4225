//! Textual form of the current mesh sizes, for diagnostics and restart.
//!
//! ```text
//! DELTA_MESH_SIZE ( 0.01 0.01 )
//! DELTA_FRAME_SIZE ( 0.1 0.1 )
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MadsError;

const MESH_SIZE_TAG: &str = "DELTA_MESH_SIZE";
const FRAME_SIZE_TAG: &str = "DELTA_FRAME_SIZE";

/// Snapshot of the per-variable mesh and frame sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshState {
    pub mesh_size: Vec<f64>,
    pub frame_size: Vec<f64>,
}

fn write_array(f: &mut fmt::Formatter<'_>, tag: &str, values: &[f64]) -> fmt::Result {
    write!(f, "{} (", tag)?;
    for v in values {
        write!(f, " {}", v)?;
    }
    write!(f, " )")
}

impl fmt::Display for MeshState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_array(f, MESH_SIZE_TAG, &self.mesh_size)?;
        writeln!(f)?;
        write_array(f, FRAME_SIZE_TAG, &self.frame_size)
    }
}

fn parse_array<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    tag: &str,
) -> Result<Vec<f64>, MadsError> {
    match tokens.next() {
        Some(t) if t == tag => {}
        other => {
            return Err(MadsError::MeshStateParse(format!(
                "expected {}, found {:?}",
                tag, other
            )))
        }
    }
    if tokens.next() != Some("(") {
        return Err(MadsError::MeshStateParse(format!(
            "expected '(' after {}",
            tag
        )));
    }

    let mut values = Vec::new();
    loop {
        match tokens.next() {
            Some(")") => return Ok(values),
            Some(t) => values.push(t.parse::<f64>().map_err(|e| {
                MadsError::MeshStateParse(format!("invalid value {:?} in {}: {}", t, tag, e))
            })?),
            None => {
                return Err(MadsError::MeshStateParse(format!(
                    "missing ')' after {} values",
                    tag
                )))
            }
        }
    }
}

impl FromStr for MeshState {
    type Err = MadsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = s.split_whitespace();
        let mesh_size = parse_array(&mut tokens, MESH_SIZE_TAG)?;
        let frame_size = parse_array(&mut tokens, FRAME_SIZE_TAG)?;
        if let Some(extra) = tokens.next() {
            return Err(MadsError::MeshStateParse(format!(
                "unexpected trailing token {:?}",
                extra
            )));
        }
        if mesh_size.len() != frame_size.len() {
            return Err(MadsError::MeshStateParse(format!(
                "{} has {} values but {} has {}",
                MESH_SIZE_TAG,
                mesh_size.len(),
                FRAME_SIZE_TAG,
                frame_size.len()
            )));
        }
        Ok(Self {
            mesh_size,
            frame_size,
        })
    }
}
