// masar-api: Wire types and asynchronous RPC transports for MASAR services

pub mod error;
pub mod transport;
pub mod websocket;
pub mod wire;

pub use error::Error;
pub use transport::{
    ChannelListener, ChannelStatus, MessageKind, RpcChannel, RpcTransport, TransportConfig,
};
pub use websocket::{ReconnectConfig, WebSocketTransport};
pub use wire::{FunctionCode, RpcRequest, RpcResponse};
