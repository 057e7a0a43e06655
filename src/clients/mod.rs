pub mod google_calendar;
pub mod google_oauth;
pub mod openai_client;
