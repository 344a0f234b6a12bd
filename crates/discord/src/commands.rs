use std::{collections::BTreeMap, fmt, future::Future, sync::Arc};

use futures::future::{BoxFuture, FutureExt};
use thiserror::Error;

pub const STATUS_COMMAND: &str = "status";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HandlerError {
    #[error("command handler failed: {0}")]
    Failed(String),
}

pub type PendingReply = BoxFuture<'static, Result<String, HandlerError>>;

/// What a handler produced when invoked. The variant is decided by the
/// handler at call time, so one handler may answer now on one invocation and
/// defer on the next.
pub enum CommandReply {
    Immediate(String),
    Pending(PendingReply),
}

impl CommandReply {
    pub fn immediate(content: impl Into<String>) -> Self {
        Self::Immediate(content.into())
    }

    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<String, HandlerError>> + Send + 'static,
    {
        Self::Pending(future.boxed())
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

impl fmt::Debug for CommandReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate(content) => f.debug_tuple("Immediate").field(content).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

pub trait CommandHandler: Send + Sync {
    fn invoke(&self) -> CommandReply;
}

impl<F> CommandHandler for F
where
    F: Fn() -> CommandReply + Send + Sync,
{
    fn invoke(&self) -> CommandReply {
        self()
    }
}

#[derive(Clone)]
pub struct Command {
    name: String,
    description: String,
    handler: Arc<dyn CommandHandler>,
}

impl Command {
    pub fn new<H>(name: impl Into<String>, description: impl Into<String>, handler: H) -> Self
    where
        H: CommandHandler + 'static,
    {
        Self { name: name.into(), description: description.into(), handler: Arc::new(handler) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn invoke(&self) -> CommandReply {
        self.handler.invoke()
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("command `{name}` registered after dispatch started")]
    AlreadySealed { name: String },
    #[error("command `{0}` is already registered")]
    DuplicateName(String),
    #[error("command name must not be empty")]
    EmptyName,
}

/// Name to command mapping. Populated during setup, then sealed once the
/// dispatcher takes it over; lookups are allowed in either state.
#[derive(Default)]
pub struct CommandRegistry {
    entries: BTreeMap<String, Command>,
    sealed: bool,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, command: Command) -> Result<(), RegistryError> {
        if self.sealed {
            return Err(RegistryError::AlreadySealed { name: command.name });
        }
        if command.name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.entries.contains_key(&command.name) {
            return Err(RegistryError::DuplicateName(command.name));
        }

        self.entries.insert(command.name.clone(), command);
        Ok(())
    }

    /// Idempotent: sealing an already sealed registry is a no-op.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn lookup(&self, name: &str) -> Option<&Command> {
        self.entries.get(name)
    }

    /// Registered commands in name order.
    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.entries.keys().collect::<Vec<_>>())
            .field("sealed", &self.sealed)
            .finish()
    }
}

pub fn default_registry() -> Result<CommandRegistry, RegistryError> {
    let mut registry = CommandRegistry::new();
    registry.register(Command::new(
        STATUS_COMMAND,
        "Check the status of the Discord bot.",
        || CommandReply::immediate("ok"),
    ))?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::{default_registry, Command, CommandRegistry, CommandReply, RegistryError};

    fn fixed(name: &str, reply: &'static str) -> Command {
        Command::new(name, format!("{name} command"), move || CommandReply::immediate(reply))
    }

    fn content_of(reply: CommandReply) -> String {
        match reply {
            CommandReply::Immediate(content) => content,
            CommandReply::Pending(_) => panic!("expected an immediate reply"),
        }
    }

    #[test]
    fn rejects_duplicate_names_and_keeps_the_first_handler() {
        let mut registry = CommandRegistry::new();
        registry.register(fixed("status", "first")).expect("first registration");

        let error = registry.register(fixed("status", "second")).expect_err("duplicate");
        assert_eq!(error, RegistryError::DuplicateName("status".to_owned()));

        let command = registry.lookup("status").expect("status is registered");
        assert_eq!(content_of(command.invoke()), "first");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn rejects_registration_after_sealing() {
        let mut registry = CommandRegistry::new();
        registry.register(fixed("status", "ok")).expect("registration before sealing");
        registry.seal();

        let error = registry.register(fixed("ping", "pong")).expect_err("sealed");
        assert_eq!(error, RegistryError::AlreadySealed { name: "ping".to_owned() });
        assert!(registry.lookup("ping").is_none());
    }

    #[test]
    fn sealing_twice_is_a_no_op() {
        let mut registry = CommandRegistry::new();
        registry.seal();
        registry.seal();
        assert!(registry.is_sealed());
    }

    #[test]
    fn lookup_works_before_and_after_sealing() {
        let mut registry = CommandRegistry::new();
        registry.register(fixed("status", "ok")).expect("registration");
        assert!(registry.lookup("status").is_some());
        assert!(registry.lookup("missing").is_none());

        registry.seal();
        assert!(registry.lookup("status").is_some());
    }

    #[test]
    fn rejects_blank_names() {
        let mut registry = CommandRegistry::new();
        assert_eq!(registry.register(fixed("  ", "x")), Err(RegistryError::EmptyName));
        assert!(registry.is_empty());
    }

    #[test]
    fn commands_are_listed_in_name_order() {
        let mut registry = CommandRegistry::new();
        registry.register(fixed("zeta", "z")).expect("zeta");
        registry.register(fixed("alpha", "a")).expect("alpha");

        let names: Vec<&str> = registry.commands().map(Command::name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn one_handler_can_answer_now_or_later() {
        let defer = Arc::new(AtomicBool::new(false));
        let flag = defer.clone();
        let command = Command::new("report", "Build a report.", move || {
            if flag.load(Ordering::SeqCst) {
                CommandReply::pending(async { Ok("report ready".to_owned()) })
            } else {
                CommandReply::immediate("cached report")
            }
        });

        assert!(!command.invoke().is_pending());
        defer.store(true, Ordering::SeqCst);
        assert!(command.invoke().is_pending());
    }

    #[test]
    fn default_registry_answers_status_immediately() {
        let registry = default_registry().expect("default registry");
        let status = registry.lookup("status").expect("status command");

        assert_eq!(status.description(), "Check the status of the Discord bot.");
        assert_eq!(content_of(status.invoke()), "ok");
        assert!(!registry.is_sealed());
    }
}
