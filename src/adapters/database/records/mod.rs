pub mod push;

pub use push::{DeviceTokenRecord, OutboxRecord, PushPreferenceRecord};
