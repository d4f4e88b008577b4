use serde::{Deserialize, Serialize};

/// Supported answer languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ur,
}

/// Per-language phrase tables and agent instructions
pub struct LanguagePack {
    pub instructions: &'static str,
    pub greetings: &'static [&'static str],
    pub refusal_phrases: &'static [&'static str],
    /// Queries shorter than this may be conversational by substring match
    pub short_query_limit: usize,
    pub fallback_answer: &'static str,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::En, Language::Ur];

    #[inline]
    pub fn pack(self) -> &'static LanguagePack {
        match self {
            Language::En => &ENGLISH,
            Language::Ur => &URDU,
        }
    }

    /// Wrap user-selected passage text and the question into one message.
    ///
    /// Only the selection's first 500 characters are embedded in the message.
    #[inline]
    pub fn compose_selection_message(self, selected_text: &str, query: &str) -> String {
        let selection: String = selected_text.chars().take(500).collect();
        match self {
            Language::En => format!(
                "The user selected this text from the textbook: \"{}\"\n\nTheir question: {}",
                selection, query
            ),
            Language::Ur => format!(
                "صارف نے کتاب سے یہ متن منتخب کیا: \"{}\"\n\nان کا سوال: {}",
                selection, query
            ),
        }
    }
}

static ENGLISH: LanguagePack = LanguagePack {
    instructions: "\
You are a friendly and knowledgeable assistant for the textbook.

For greetings, thanks, and other casual conversation, respond naturally and \
do NOT use the search tool.

For any technical question about the book's subject matter:
1. ALWAYS call the search_textbook tool first to find relevant content.
2. Base your answer ONLY on the retrieved content.
3. Cite sources using the [Chapter: Section] format.
4. If the search returns no relevant results, say: \"This topic isn't \
covered in the textbook.\"

You have access to the full conversation history with this user; refer back \
to earlier turns naturally when they ask follow-up questions.",
    greetings: &[
        "hi",
        "hello",
        "hey",
        "good morning",
        "good afternoon",
        "good evening",
        "howdy",
        "greetings",
        "what's up",
        "whats up",
        "sup",
        "yo",
        "thanks",
        "thank you",
        "thx",
        "bye",
        "goodbye",
        "see you",
        "how are you",
        "how r u",
        "how're you",
    ],
    refusal_phrases: &[
        "not covered in the retrieved",
        "not found in the textbook",
        "cannot find information",
        "no relevant content",
        "don't have information",
        "does not appear to cover",
        "isn't covered in the textbook",
        "not covered in the textbook",
    ],
    short_query_limit: 20,
    fallback_answer: "I couldn't generate a response.",
};

static URDU: LanguagePack = LanguagePack {
    instructions: "\
آپ کتاب کے لیے ایک دوستانہ اور علم والا معاون ہیں۔

سلام، شکریہ اور عام بات چیت کے لیے قدرتی طور پر جواب دیں اور تلاش کا آلہ استعمال نہ کریں۔

کتاب کے مواد کے بارے میں کسی بھی تکنیکی سوال کے لیے:
1. پہلے ہمیشہ search_textbook ٹول استعمال کریں۔
2. اپنا جواب صرف حاصل کردہ مواد پر مبنی کریں۔
3. ذرائع کا حوالہ [باب: سیکشن] فارمیٹ میں دیں۔
4. اگر تلاش سے کوئی متعلقہ نتائج نہ ملیں تو کہیں: \"یہ موضوع کتاب میں شامل نہیں ہے۔\"

ہمیشہ اردو میں جواب دیں، لیکن تکنیکی اصطلاحات انگریزی میں رکھیں۔",
    greetings: &[
        "السلام علیکم",
        "سلام",
        "ہیلو",
        "ہائے",
        "شکریہ",
        "تھینکس",
        "خدا حافظ",
        "اللہ حافظ",
        "کیسے ہیں",
        "کیا حال ہے",
    ],
    refusal_phrases: &[
        "کتاب میں شامل نہیں",
        "موضوع کتاب میں شامل نہیں",
        "معلومات نہیں مل سکیں",
        "متعلقہ مواد نہیں",
    ],
    short_query_limit: 15,
    fallback_answer: "میں جواب تیار نہیں کر سکا۔",
};
