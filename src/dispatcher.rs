//! The stateless client surface: derive a command name, hand it to the
//! transport.

use std::any::Any;
use std::sync::Arc;

use crate::command::command_name;
use crate::context::Context;
use crate::error::BusError;
use crate::transport::Transport;

/// Sends commands into a [`Transport`]. Owns nothing beyond the transport
/// reference; holds no retry, worker, or ordering state of its own.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Dispatcher { transport }
    }

    /// Derive `value`'s command name and send it through the transport.
    pub fn dispatch<T: Any + Send + 'static>(&self, ctx: Context, value: T) -> Result<(), BusError> {
        let name = command_name::<T>();
        self.transport.dispatch(ctx, &name, Box::new(value))
    }
}
