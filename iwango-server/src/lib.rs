//! Library surface for the `iwango-server` binary, split out so integration
//! tests can drive the connection manager and supervisor through real
//! sockets instead of mocking the transport.

pub mod errors;
pub mod net;
pub mod supervisor;
