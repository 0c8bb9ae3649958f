pub mod backoff;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod observer;

pub mod streams;

pub use config::Config;
pub use dispatcher::{Dispatched, Dispatcher};
pub use error::{Error, Result};
pub use event::Event;
