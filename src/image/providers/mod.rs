//! Image generation providers.

#[cfg(feature = "huggingface")]
mod huggingface;
#[cfg(feature = "hyperbolic")]
mod hyperbolic;
#[cfg(feature = "replicate")]
mod replicate;
#[cfg(feature = "together")]
mod together;

#[cfg(feature = "huggingface")]
pub use huggingface::HuggingFaceProvider;

#[cfg(feature = "hyperbolic")]
pub use hyperbolic::{HyperbolicProvider, DEFAULT_HYPERBOLIC_MODEL};

#[cfg(feature = "replicate")]
pub use replicate::ReplicateProvider;

#[cfg(feature = "together")]
pub use together::{TogetherProvider, DEFAULT_TOGETHER_MODEL};
