use crate::breach::Thresholds;
use serde::{Deserialize, Serialize};

/// An instrument under evaluation.
///
/// `symbol` is provider-namespaced (e.g. `FSE/BAS_X`, `sap.de`), so the same
/// listing can appear under different symbols for different providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub name: String,
    pub thresholds: Thresholds,
}

impl Instrument {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>, thresholds: Thresholds) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            thresholds,
        }
    }
}
