pub mod db;
pub mod gemini;
pub mod instructions;
pub mod json_store;
pub mod openai_answer;

pub use db::DbAdapter;
pub use gemini::GeminiAnswerAdapter;
pub use json_store::JsonFileAdapter;
pub use openai_answer::OpenAiAnswerAdapter;
