pub mod audio_service;
pub mod json_import;
pub mod metadata_store;
