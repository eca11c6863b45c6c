use anyhow::Result;
use sidebar_config::{
    AuthMethod, FileSettingsStore, ProviderConfig, ProviderId, ResolvedProviderConfig, Settings,
    SettingsStore,
};
use sidebar_security::mask_secret;

/// Fields given on the command line; `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct ProviderOverrides {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub credential: Option<String>,
    pub auth: Option<AuthMethod>,
}

impl ProviderOverrides {
    fn apply(self, mut config: ProviderConfig) -> ProviderConfig {
        if self.endpoint.is_some() {
            config.endpoint = self.endpoint;
        }
        if self.model.is_some() {
            config.model = self.model;
        }
        if self.credential.is_some() {
            config.credential = self.credential;
        }
        if self.auth.is_some() {
            config.auth_method = self.auth;
        }
        config
    }
}

pub fn show(store: &dyn SettingsStore) -> Result<()> {
    let settings = store.load()?;
    print!("{}", render_masked(&settings)?);
    println!("{}", active_summary(&settings.active_config()));
    Ok(())
}

pub fn path(store: &FileSettingsStore) {
    println!("{}", store.path().display());
}

pub fn set_provider(store: &dyn SettingsStore, id: ProviderId, overrides: ProviderOverrides) -> Result<()> {
    let settings = store.load()?;
    let config = overrides.apply(settings.provider_config(id));
    let next = settings.with_provider(id, config);
    store.save(&next)?;

    let active = next.active_config();
    println!("Active provider: {} ({})", active.id.label(), active.model);
    Ok(())
}

fn active_summary(active: &ResolvedProviderConfig) -> String {
    let credential = match (active.id.requires_credential(), &active.credential) {
        (false, _) => "not needed",
        (true, Some(_)) => "set",
        (true, None) => "missing",
    };
    format!(
        "# active: {} ({} at {}, credential {})",
        active.id, active.model, active.endpoint, credential
    )
}

/// Settings as YAML with every stored credential masked.
fn render_masked(settings: &Settings) -> Result<String> {
    let mut masked = settings.clone();
    for config in masked.providers.values_mut() {
        config.credential = config.credential.as_deref().map(mask_secret);
    }
    Ok(serde_yaml::to_string(&masked)?)
}
