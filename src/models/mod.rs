//! Data models and structures for the MQTT load tester

pub mod config;
pub mod message;
pub mod outcome;

// Re-export main model types
pub use config::Config;
pub use message::{OutboundMessage, EchoMessage, InboundPayload, return_topic, is_return_topic, build_payload_data};
pub use outcome::{Outcome, RoundTrip, ResultRecord};
