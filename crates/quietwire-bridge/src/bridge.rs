//! Command dispatch.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use quietwire_core::{
    CoreError, CryptoProvider, Identity, MessageCipher, SessionManager, StaticToken, Token,
    TokenSupplier,
};

use crate::command::{
    CommandArgs, CommandFailure, CommandReply, CommandRequest, Responder, ReplyValue,
};

const INIT_SESSION: &str = "initSession";
const ENCRYPT: &str = "encrypt";
const DECRYPT_MINE: &str = "decryptMine";
const DECRYPT_THEIRS: &str = "decryptTheirs";

/// Required argument keys per command, `None` for unknown names.
fn required_args(name: &str) -> Option<&'static [&'static str]> {
    match name {
        INIT_SESSION => Some(&["token"]),
        ENCRYPT => Some(&["otherUser", "text"]),
        DECRYPT_MINE => Some(&["text"]),
        DECRYPT_THEIRS => Some(&["text", "otherUser"]),
        _ => None,
    }
}

/// Bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Deadline for commands that reach the crypto provider's
    /// network-facing calls. `decryptMine` needs no remote key and is not
    /// deadline-wrapped.
    pub provider_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self { provider_timeout: Duration::from_secs(30) }
    }
}

/// Dispatches named commands to the session manager and message cipher.
///
/// One bridge owns one core instance (one bound identity at a time). All
/// transport-specific marshalling stays outside; callers hand the bridge
/// `(name, args)` pairs and receive exactly one reply per command.
pub struct CommandBridge<P: CryptoProvider> {
    sessions: Arc<SessionManager<P>>,
    cipher: MessageCipher<P>,
    config: BridgeConfig,
}

impl<P: CryptoProvider> CommandBridge<P> {
    /// Create a bridge over the given provider.
    pub fn new(provider: P, config: BridgeConfig) -> Arc<Self> {
        let sessions = Arc::new(SessionManager::new(provider));
        let cipher = MessageCipher::new(Arc::clone(&sessions));
        Arc::new(Self { sessions, cipher, config })
    }

    /// The session manager behind this bridge, for hosts that drive
    /// initialization directly (for example with a rotating token
    /// supplier instead of the fixed-token `initSession` command).
    pub fn sessions(&self) -> &Arc<SessionManager<P>> {
        &self.sessions
    }

    /// Dispatch one command.
    ///
    /// Unknown names and missing arguments fail fast on the calling
    /// context without touching any other component. Everything else runs
    /// on the worker pool; the responder fires exactly once either way.
    pub fn dispatch(self: &Arc<Self>, request: CommandRequest) {
        let CommandRequest { name, args, responder } = request;

        let Some(required) = required_args(&name) else {
            tracing::debug!(command = %name, "unknown command");
            responder.failure(CoreError::NoSuchCommand { name });
            return;
        };
        for key in required {
            if args.get(key).is_none() {
                responder.failure(CoreError::BadArgument {
                    detail: format!("missing argument: {key}"),
                });
                return;
            }
        }

        let bridge = Arc::clone(self);
        tokio::spawn(async move {
            match bridge.run(&name, &args).await {
                Ok(value) => responder.success(value),
                Err(error) => {
                    tracing::debug!(command = %name, code = error.code(), "command failed");
                    responder.failure(error);
                }
            }
        });
    }

    /// Dispatch and await the reply on the caller's own context.
    pub async fn execute(self: &Arc<Self>, name: &str, args: CommandArgs) -> CommandReply {
        let (responder, rx) = Responder::channel();
        self.dispatch(CommandRequest { name: name.to_string(), args, responder });
        // Every dispatch path responds, so the channel cannot close
        // without a reply; the fallback is belt-and-braces for a killed
        // runtime.
        rx.await.unwrap_or_else(|_| {
            Err(CommandFailure {
                code: "PROVIDER_TIMEOUT",
                message: "reply channel closed before a response".to_string(),
            })
        })
    }

    async fn run(&self, name: &str, args: &CommandArgs) -> Result<ReplyValue, CoreError> {
        match name {
            INIT_SESSION => self.deadline(self.init_session(args)).await,
            ENCRYPT => self.deadline(self.encrypt(args)).await,
            DECRYPT_THEIRS => self.deadline(self.decrypt_theirs(args)).await,
            DECRYPT_MINE => self.decrypt_mine(args).await,
            other => Err(CoreError::NoSuchCommand { name: other.to_string() }),
        }
    }

    /// Bound a provider-facing operation so a hung provider can never
    /// leave the responder uninvoked.
    async fn deadline<F>(&self, operation: F) -> Result<ReplyValue, CoreError>
    where
        F: Future<Output = Result<ReplyValue, CoreError>>,
    {
        let limit = self.config.provider_timeout;
        match tokio::time::timeout(limit, operation).await {
            Ok(reply) => reply,
            Err(_) => {
                Err(CoreError::ProviderTimeout {
                    after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }

    /// Establish (or replace) the session and register idempotently.
    async fn init_session(&self, args: &CommandArgs) -> Result<ReplyValue, CoreError> {
        let token = args.require("token")?;
        if token.is_empty() {
            return Err(CoreError::BadArgument { detail: "empty token".to_string() });
        }
        let user = args.get("user").map(Identity::from);

        // The original surface hands over a bare token string, so the
        // bound capability is a fixed supplier; rotating hosts go through
        // `sessions()` with their own `TokenSupplier`.
        let supplier: Arc<dyn TokenSupplier> = Arc::new(StaticToken::new(Token::new(token)));

        self.sessions.initialize(user, supplier).await?;
        self.sessions.register().await?;
        Ok(ReplyValue::Bool(true))
    }

    async fn encrypt(&self, args: &CommandArgs) -> Result<ReplyValue, CoreError> {
        let recipient = Identity::from(args.require("otherUser")?);
        let text = args.require("text")?;
        let ciphertext = self.cipher.encrypt(text, &recipient).await?;
        Ok(ReplyValue::Text(ciphertext))
    }

    async fn decrypt_mine(&self, args: &CommandArgs) -> Result<ReplyValue, CoreError> {
        let text = args.require("text")?;
        let plaintext = self.cipher.decrypt_own(text).await?;
        Ok(ReplyValue::Text(plaintext))
    }

    async fn decrypt_theirs(&self, args: &CommandArgs) -> Result<ReplyValue, CoreError> {
        let sender = Identity::from(args.require("otherUser")?);
        let text = args.require("text")?;
        let plaintext = self.cipher.decrypt_from_sender(text, &sender).await?;
        Ok(ReplyValue::Text(plaintext))
    }
}

impl<P: CryptoProvider> std::fmt::Debug for CommandBridge<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBridge").field("config", &self.config).finish_non_exhaustive()
    }
}
