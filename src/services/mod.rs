pub mod health_service;
pub mod notifier;
pub mod outbox_queue;
pub mod outbox_service;
pub mod push_service;
pub mod push_token_service;
pub mod store;
