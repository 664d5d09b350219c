pub mod catalog;
pub mod classifier;
pub mod confidence;
pub mod explanation;
pub mod frame_source;
pub mod narration;
pub mod preferences;
pub mod presenter;
pub mod resolver;
pub mod session;
