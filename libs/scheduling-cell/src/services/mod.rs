pub mod conflict;
pub mod engine;
pub mod locks;
pub mod observation;
