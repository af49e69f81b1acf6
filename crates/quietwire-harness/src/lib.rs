//! Multi-peer test harness for the quietwire stack.
//!
//! Wires the software provider, session core, and command bridge together
//! the way an embedding host would, so integration tests can run whole
//! conversations between peers over one shared key directory.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::{Arc, Once};

use quietwire_bridge::{BridgeConfig, CommandArgs, CommandBridge, CommandReply, ReplyValue};
use quietwire_provider::SoftwareProvider;
use tracing_subscriber::EnvFilter;

/// Install the `RUST_LOG`-driven subscriber once per process.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A fresh provider backing one simulated key directory.
///
/// Clones share the directory, so every peer built from clones of the
/// same provider can look each other up.
pub fn network() -> SoftwareProvider {
    SoftwareProvider::new()
}

/// The token a peer presents to the provider, carrying its identity claim.
pub fn token_for(name: &str) -> String {
    format!("{name}-secret@{name}")
}

/// Bring a named peer online: build its bridge and run `initSession`.
pub async fn online_peer(
    provider: &SoftwareProvider,
    name: &str,
) -> Result<Arc<CommandBridge<SoftwareProvider>>, String> {
    init_tracing();
    let bridge = CommandBridge::new(provider.clone(), BridgeConfig::default());
    let args = CommandArgs::new().with("token", token_for(name));
    match bridge.execute("initSession", args).await {
        Ok(ReplyValue::Bool(true)) => Ok(bridge),
        Ok(other) => Err(format!("unexpected initSession reply for {name}: {other:?}")),
        Err(failure) => Err(format!("initSession failed for {name}: {failure}")),
    }
}

/// Pull the text payload out of a reply, or `None` for failures and
/// boolean replies.
pub fn reply_text(reply: CommandReply) -> Option<String> {
    match reply {
        Ok(ReplyValue::Text(text)) => Some(text),
        _ => None,
    }
}
