pub mod engine;
pub mod extractor;
pub mod http_ocr;
pub mod parser;
pub mod preprocessing;
#[cfg(feature = "tesseract")]
pub mod tesseract;

// Re-export main types
pub use engine::{build_engine, DisabledEngine, OcrEngine};
pub use extractor::TextExtractor;
pub use http_ocr::HttpOcrClient;
pub use parser::FieldParser;
pub use preprocessing::PreprocessingService;
