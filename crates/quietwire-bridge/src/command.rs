//! Command, argument, and responder types.

use quietwire_core::CoreError;
use tokio::sync::oneshot;

/// Insertion-ordered string→string command arguments.
///
/// The order commands were built in is preserved for logging and
/// round-tripping; lookup is by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandArgs(Vec<(String, String)>);

impl CommandArgs {
    /// Empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Append or replace an argument.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(entry) = self.0.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.0.push((key, value));
        }
    }

    /// Value for `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Value for `key`, or `BAD_ARGUMENT` naming the missing key.
    pub fn require(&self, key: &str) -> Result<&str, CoreError> {
        self.get(key)
            .ok_or_else(|| CoreError::BadArgument { detail: format!("missing argument: {key}") })
    }

    /// Iterate arguments in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Successful command result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyValue {
    /// Boolean result (`initSession`).
    Bool(bool),
    /// Text result (ciphertext or plaintext).
    Text(String),
}

/// Structured failure delivered to the caller: a stable code from the
/// core taxonomy plus free-text detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    /// Stable wire code (for example `SESSION_NOT_READY`).
    pub code: &'static str,
    /// Human-readable detail, carrying the provider's message where one
    /// exists.
    pub message: String,
}

impl From<CoreError> for CommandFailure {
    fn from(error: CoreError) -> Self {
        Self { code: error.code(), message: error.to_string() }
    }
}

impl std::fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Terminal outcome of one command.
pub type CommandReply = Result<ReplyValue, CommandFailure>;

/// Single-use reply channel for one command.
///
/// Consuming `self` on every delivery path makes the exactly-once
/// contract structural: a responder cannot fire twice, and the bridge
/// guarantees it never fires zero times.
#[derive(Debug)]
pub struct Responder {
    tx: oneshot::Sender<CommandReply>,
}

impl Responder {
    /// Create a responder and the receiver the caller awaits on its own
    /// execution context.
    pub fn channel() -> (Self, oneshot::Receiver<CommandReply>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Deliver a success value.
    pub fn success(self, value: ReplyValue) {
        self.deliver(Ok(value));
    }

    /// Deliver a structured failure.
    pub fn failure(self, error: CoreError) {
        self.deliver(Err(error.into()));
    }

    fn deliver(self, reply: CommandReply) {
        if self.tx.send(reply).is_err() {
            tracing::debug!("command caller went away before the reply");
        }
    }
}

/// One dispatched command: name, arguments, and its responder.
#[derive(Debug)]
pub struct CommandRequest {
    /// Command name from the surface table.
    pub name: String,
    /// Ordered arguments.
    pub args: CommandArgs,
    /// Single-use reply channel.
    pub responder: Responder,
}
