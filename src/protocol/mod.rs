//! Wire protocol shared by clients, the balancer and backend nodes.
//!
//! # Data Flow
//! ```text
//! sender: Request (message.rs) → JSON → codec.rs (u32 BE length + body)
//!     → TCP, one connection per exchange (client.rs)
//! receiver: codec.rs → Request::decode → Command → handler → Response
//! ```
//!
//! # Design Decisions
//! - Explicit length prefix; a message may be any size up to the configured
//!   limit regardless of how the bytes arrive
//! - The balancer never decodes request bodies, it relays frames verbatim

pub mod client;
pub mod codec;
pub mod message;

pub use client::Client;
pub use message::{
    Action, Command, ErrorResponse, GetResponse, HealthResponse, NodeStatus, Request, Response,
    SetResponse, SyncAck, NOT_FOUND_VALUE,
};
