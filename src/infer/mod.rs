pub mod arena;
pub mod engine;
pub mod model;
pub mod tensor;

pub use arena::Arena;
pub use engine::{EngineError, InferenceEngine, SUPPORTED_SCHEMA_VERSION};
pub use model::{Model, ModelError};
pub use tensor::{TensorKind, TensorSpec};
