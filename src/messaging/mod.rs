//! Messaging layer - the seam between the chat platform and the command router.

pub mod console;
pub mod dispatcher;

pub use console::{run_console, ConsoleMessenger};
pub use dispatcher::{Dispatcher, InboundMessage, Messenger};
