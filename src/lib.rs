pub mod analyzers;
pub mod config;
pub mod errors;
pub mod instrument;
pub mod output;
pub mod pipeline;
pub mod source;
pub mod trip;
pub mod validation;
