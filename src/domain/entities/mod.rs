pub mod key_duration;
pub mod key_format;
pub mod license_key;
