pub mod audio_handlers;
pub mod health_handlers;
