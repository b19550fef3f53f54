pub mod codec;
pub mod fragment;
pub mod frame;
pub mod handshake;
pub mod health;
pub mod reassembly;
pub mod types;

pub use codec::{DecodeError, RawFrame};
pub use fragment::*;
pub use frame::*;
pub use handshake::{
    ChallengeKey, HandshakeFailure, HandshakeRejection, UpgradeResponse, WsEndpoint, WsScheme,
    compute_accept_key,
};
pub use health::*;
pub use reassembly::*;
pub use types::*;
