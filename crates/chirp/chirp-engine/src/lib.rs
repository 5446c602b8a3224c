mod context;
mod dispatch;
mod server;

pub use context::SharedContext;
pub use dispatch::apply;
pub use server::{Ending, EngineError, RunReport, Server};
