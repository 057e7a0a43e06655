pub mod calendar_service;
pub mod dispatcher;
pub mod event_format;
pub mod openai_service;
pub mod session;
pub mod timeout;
pub mod token_store;
