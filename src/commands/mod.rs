pub mod del;
pub mod echo;
pub mod exists;
pub mod get;
pub mod incr;
pub mod ping;
pub mod set;

use bytes::Bytes;
use std::collections::HashMap;
use std::str;

use crate::frame::Frame;
use crate::store::Store;

/// A command implementation: runs against the store with the full argument vector, command name
/// included, and always answers with a frame. Failures are `Frame::Error` replies.
pub type Handler = fn(&Store, &[Bytes]) -> Frame;

/// Number of elements a command accepts, counting the command name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    fn accepts(self, len: usize) -> bool {
        match self {
            Arity::Exact(n) => len == n,
            Arity::AtLeast(n) => len >= n,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Upper-case command name.
    pub name: &'static str,
    pub arity: Arity,
    pub handler: Handler,
}

/// Name to handler table. Lookups are case insensitive.
#[derive(Debug, Clone, Default)]
pub struct CommandDispatcher {
    commands: HashMap<&'static str, CommandSpec>,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    pub fn with_builtin_commands() -> Self {
        let mut dispatcher = Self::new();

        dispatcher.register(CommandSpec {
            name: "PING",
            arity: Arity::Exact(1),
            handler: ping::ping,
        });
        dispatcher.register(CommandSpec {
            name: "ECHO",
            arity: Arity::Exact(2),
            handler: echo::echo,
        });
        dispatcher.register(CommandSpec {
            name: "SET",
            arity: Arity::Exact(3),
            handler: set::set,
        });
        dispatcher.register(CommandSpec {
            name: "GET",
            arity: Arity::Exact(2),
            handler: get::get,
        });
        dispatcher.register(CommandSpec {
            name: "EXISTS",
            arity: Arity::AtLeast(2),
            handler: exists::exists,
        });
        dispatcher.register(CommandSpec {
            name: "DEL",
            arity: Arity::AtLeast(2),
            handler: del::del,
        });
        dispatcher.register(CommandSpec {
            name: "INCR",
            arity: Arity::Exact(2),
            handler: incr::incr,
        });

        dispatcher
    }

    pub fn register(&mut self, spec: CommandSpec) {
        self.commands.insert(spec.name, spec);
    }

    pub fn get(&self, name: &[u8]) -> Option<&CommandSpec> {
        let name = name.to_ascii_uppercase();
        let name = str::from_utf8(&name).ok()?;
        self.commands.get(name)
    }

    pub fn execute(&self, store: &Store, args: &[Bytes]) -> Frame {
        let Some(name) = args.first() else {
            return wrong_number_of_arguments();
        };

        let Some(spec) = self.get(name) else {
            return Frame::Error("not implemented".to_string());
        };

        if !spec.arity.accepts(args.len()) {
            return wrong_number_of_arguments();
        }

        (spec.handler)(store, args)
    }
}

pub(crate) fn wrong_number_of_arguments() -> Frame {
    Frame::Error("wrong number of arguments".to_string())
}
