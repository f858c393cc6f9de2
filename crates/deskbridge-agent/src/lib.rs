pub mod dispatch;
pub mod handlers;
pub mod poll;
pub mod protocol;
pub mod registry;
pub mod tasks;
pub mod utils;
