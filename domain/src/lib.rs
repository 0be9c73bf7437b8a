//! The Lobby/Team state engine: the domain graph (Player/Lobby/Team/
//! Title-Server), the opcode dispatch table that mutates it, and the actor
//! task that gives the whole thing its single-threaded execution model.

pub mod actor;
pub mod dispatcher;
pub mod entities;
pub mod inbound;
pub mod opcodes;
pub mod outbound;
