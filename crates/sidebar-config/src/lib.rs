pub mod loader;
pub mod model;

pub use loader::{FileSettingsStore, MemorySettingsStore, SettingsStore};
pub use model::{
    AuthMethod, ContextSettings, GenerationSettings, ProviderConfig, ProviderId,
    ResolvedProviderConfig, Settings, TimeoutSettings,
};
