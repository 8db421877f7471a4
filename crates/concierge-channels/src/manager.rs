use std::collections::HashMap;

use crate::channel::ChannelAdapter;

/// Registry of the channel adapters a gateway instance is wired with.
/// Lookup is by the adapter's own [`ChannelAdapter::name`]; there is no
/// connection lifecycle to manage since every adapter call is request-scoped.
pub struct ChannelManager {
    adapters: HashMap<String, Box<dyn ChannelAdapter>>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self { adapters: HashMap::new() }
    }

    pub fn register(&mut self, adapter: Box<dyn ChannelAdapter>) {
        let name = adapter.name().to_string();
        tracing::info!(channel = %name, "registering channel adapter");
        self.adapters.insert(name, adapter);
    }

    pub fn get(&self, name: &str) -> Option<&dyn ChannelAdapter> {
        self.adapters.get(name).map(|b| b.as_ref())
    }
}

impl Default for ChannelManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::VoiceAdapter;

    #[test]
    fn registered_adapter_is_retrievable_by_name() {
        let mut mgr = ChannelManager::new();
        mgr.register(Box::new(VoiceAdapter));
        assert!(mgr.get("voice").is_some());
        assert!(mgr.get("whatsapp").is_none());
    }
}
