pub mod listener;

pub use listener::ListenerCollector;
