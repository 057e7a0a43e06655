pub mod conversation;
pub mod event;
pub mod token;
