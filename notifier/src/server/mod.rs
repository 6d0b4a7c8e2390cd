pub mod handlers;
pub mod serve;
pub mod signature;
pub mod state;
