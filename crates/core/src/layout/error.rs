use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    #[error("invalid value for {key}: {value} (must be finite and >= 0)")]
    InvalidValue { key: String, value: f64 },

    #[error("duplicate layout key: {0}")]
    DuplicateKey(String),

    #[error("invalid bounds {w}x{h} (width and height must be finite and >= 0)")]
    InvalidBounds { w: f64, h: f64 },
}
