use std::sync::LazyLock;

use tiktoken_rs::{CoreBPE, cl100k_base};

// cl100k_base covers the text-embedding-3 family and the gpt-4o chat models
static ENCODER: LazyLock<CoreBPE> =
    LazyLock::new(|| cl100k_base().expect("embedded cl100k vocabulary loads"));

/// Count tokens in a text span using the embedding model's tokenization scheme
#[inline]
pub fn count_tokens(text: &str) -> usize {
    ENCODER.encode_with_special_tokens(text).len()
}
