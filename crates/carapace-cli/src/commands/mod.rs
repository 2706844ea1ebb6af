//! Command implementations.

mod build_ca;
mod gen_req;
mod init;
mod sign_req;

pub use build_ca::BuildCaCommand;
pub use gen_req::GenReqCommand;
pub use init::InitPkiCommand;
pub use sign_req::SignReqCommand;
