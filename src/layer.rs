//! Gemara layers
//!
//! Each layer is a document category with its own storage partition and
//! its own schema entry point.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest valid layer number
pub const MIN_LAYER: u32 = 1;

/// Highest valid layer number
pub const MAX_LAYER: u32 = 4;

/// A Gemara layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Layer {
    /// Layer 1: guidance documents
    Guidance = 1,
    /// Layer 2: control catalogs
    Controls = 2,
    /// Layer 3: policy documents
    Policy = 3,
    /// Layer 4: evaluation logs
    Evaluation = 4,
}

impl Layer {
    /// All layers in ascending order
    pub const ALL: [Layer; 4] = [
        Layer::Guidance,
        Layer::Controls,
        Layer::Policy,
        Layer::Evaluation,
    ];

    /// Layer number
    pub fn number(self) -> u32 {
        self as u32
    }

    /// Human-readable layer name
    pub fn name(self) -> &'static str {
        match self {
            Layer::Guidance => "Guidance",
            Layer::Controls => "Controls",
            Layer::Policy => "Policy",
            Layer::Evaluation => "Evaluation",
        }
    }

    /// Storage directory name under the base directory (`layer<N>`)
    pub fn dir_name(self) -> String {
        format!("layer{}", self.number())
    }

    /// Name of the layer-specific schema fragment (`layer-<N>`)
    pub fn fragment_name(self) -> String {
        format!("layer-{}", self.number())
    }

    /// Schema definition the layer's documents are validated against
    pub fn entry_point(self) -> &'static str {
        match self {
            Layer::Guidance => "#GuidanceDocument",
            Layer::Controls => "#Catalog",
            Layer::Policy => "#Policy",
            Layer::Evaluation => "#EvaluationLog",
        }
    }
}

impl TryFrom<u32> for Layer {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            1 => Ok(Layer::Guidance),
            2 => Ok(Layer::Controls),
            3 => Ok(Layer::Policy),
            4 => Ok(Layer::Evaluation),
            other => Err(Error::InvalidLayer(other)),
        }
    }
}

impl From<Layer> for u32 {
    fn from(layer: Layer) -> Self {
        layer.number()
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer {} ({})", self.number(), self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_from_range() {
        for n in MIN_LAYER..=MAX_LAYER {
            let layer = Layer::try_from(n).unwrap();
            assert_eq!(layer.number(), n);
        }
        assert!(matches!(Layer::try_from(0), Err(Error::InvalidLayer(0))));
        assert!(matches!(Layer::try_from(5), Err(Error::InvalidLayer(5))));
    }

    #[test]
    fn test_names() {
        assert_eq!(Layer::Controls.dir_name(), "layer2");
        assert_eq!(Layer::Policy.fragment_name(), "layer-3");
        assert_eq!(Layer::Evaluation.entry_point(), "#EvaluationLog");
        assert_eq!(Layer::Guidance.to_string(), "layer 1 (Guidance)");
    }

    #[test]
    fn test_serde_as_number() {
        let json = serde_json::to_string(&Layer::Policy).unwrap();
        assert_eq!(json, "3");
        let back: Layer = serde_json::from_str("2").unwrap();
        assert_eq!(back, Layer::Controls);
        assert!(serde_json::from_str::<Layer>("7").is_err());
    }
}
