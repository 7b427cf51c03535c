//! Infrastructure shared by the protocol layers: integrity checksums and the
//! non-volatile storage abstraction.
pub mod checksum;
pub mod storage;
