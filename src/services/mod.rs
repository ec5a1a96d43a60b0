// src/services/mod.rs
pub mod image_processor;
pub mod llm_service;

pub use image_processor::ImageProcessor;
pub use llm_service::{GenerationBackend, LLMService};
