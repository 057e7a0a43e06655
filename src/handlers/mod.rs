pub mod action;
pub mod http;
