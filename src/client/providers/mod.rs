pub mod config_based;
pub mod traits;

pub use config_based::ConfigBasedProvider;
pub use traits::{AudioProvider, Capability, ProviderError, SearchOutcome};
