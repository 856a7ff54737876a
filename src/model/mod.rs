//! Model access through a provider CLI.

pub mod subprocess;

pub use subprocess::CliModel;

use async_trait::async_trait;

use crate::error::ModelError;

/// Capability surface for text generation.
///
/// This abstraction allows swapping in a fake for tests.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send `prompt` to the model named by `model_id` and return the raw
    /// text response.
    async fn complete(&self, prompt: &str, model_id: &str) -> Result<String, ModelError>;
}
