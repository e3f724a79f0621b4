// Core modules: payload decoding, operation registry, job outcomes, error modeling.
pub mod decode;
pub mod error;
pub mod job;
pub mod params;
pub mod registry;
