pub mod credential;
pub mod notification;
pub mod outbox;
