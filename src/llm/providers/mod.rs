pub mod anthropic;
pub mod gateway;
pub mod ollama;
pub mod openai_compatible;
