//! Provider clients implementing the pipeline's capability traits.
//!
//! - [`PerplexityClient`] — lead discovery and research (chat completions)
//! - [`OpenAiClient`] — embeddings, script writing, speech synthesis
//! - [`CdnStore`] — audio uploads to a CDN bucket
//!
//! Clients classify failures into the pipeline's error taxonomy and leave
//! retry policy to the stage runner.

mod cdn;
mod http;
mod openai;
mod perplexity;

pub use cdn::CdnStore;
pub use openai::OpenAiClient;
pub use perplexity::PerplexityClient;
