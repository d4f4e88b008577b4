// Content module
// Parses MDX chapter files and splits them into token-bounded chunks for indexing

pub mod chunker;
pub mod parser;
pub mod tokenizer;

pub use chunker::{ChunkMetadata, chunk_document, chunk_section, extract_sections, generate_chunk_id};
pub use parser::{Frontmatter, clean_markup, parse_document};
pub use tokenizer::count_tokens;
