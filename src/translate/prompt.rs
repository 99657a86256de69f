//! Prompt templates per target language and cleanup of raw model output.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

/// Fence placed around the source text inside every prompt.
pub const TEXT_MARKER: &str = "\"\"\"";

/// Preamble labels a model tends to echo; generation stops on them.
pub const STOP_SEQUENCES: [&str; 3] = ["\n原文：", "\nOriginal text:", "\nSource text:"];

/// A target language the service knows how to instruct.
pub struct LanguageProfile {
    pub code: &'static str,
    pub name: &'static str,
    /// Dedicated instruction; `None` uses the default template.
    instruction: Option<&'static str>,
    /// Labels the model may prefix its answer with.
    labels: &'static [&'static str],
}

const ENGLISH_LABELS: &[&str] = &["translation result", "translated text", "translation"];

pub static LANGUAGES: &[LanguageProfile] = &[
    LanguageProfile {
        code: "zh-tw",
        name: "繁體中文",
        instruction: Some(
            "請將以下文字翻譯成繁體中文（台灣）。\n\
             要求：\n\
             1. 保留原文的段落、換行與標點格式\n\
             2. 使用台灣慣用的用語與專業術語\n\
             3. 只輸出譯文，不要加入任何解釋或標題",
        ),
        labels: &["翻譯結果", "翻譯後的文字", "譯文", "翻譯"],
    },
    LanguageProfile {
        code: "zh-cn",
        name: "简体中文",
        instruction: Some(
            "请将以下文字翻译成简体中文。\n\
             要求：\n\
             1. 保留原文的段落、换行与标点格式\n\
             2. 使用中国大陆通行的用语与专业术语\n\
             3. 只输出译文，不要加入任何解释或标题",
        ),
        labels: &["翻译结果", "翻译后的文本", "译文", "翻译"],
    },
    LanguageProfile {
        code: "en",
        name: "English",
        instruction: Some(
            "Translate the following text into natural English.\n\
             Requirements:\n\
             1. Keep the original paragraphs, line breaks and formatting\n\
             2. Use standard terminology for technical terms\n\
             3. Output only the translation, without notes or headings",
        ),
        labels: ENGLISH_LABELS,
    },
    LanguageProfile {
        code: "ja",
        name: "日本語",
        instruction: Some(
            "以下の文章を自然な日本語に翻訳してください。\n\
             要件：\n\
             1. 原文の段落・改行・書式を保持する\n\
             2. 日本で一般的な用語と専門用語を使う\n\
             3. 翻訳文のみを出力し、説明や見出しを付けない",
        ),
        labels: &["翻訳結果", "翻訳"],
    },
    LanguageProfile {
        code: "ko",
        name: "한국어",
        instruction: Some(
            "다음 텍스트를 자연스러운 한국어로 번역하세요.\n\
             요구 사항:\n\
             1. 원문의 문단, 줄바꿈, 서식을 유지할 것\n\
             2. 한국에서 통용되는 용어와 전문 용어를 사용할 것\n\
             3. 번역문만 출력하고 설명이나 제목을 붙이지 말 것",
        ),
        labels: &["번역 결과", "번역"],
    },
    LanguageProfile {
        code: "fr",
        name: "Français",
        instruction: None,
        labels: &["traduction"],
    },
    LanguageProfile {
        code: "de",
        name: "Deutsch",
        instruction: None,
        labels: &["übersetzung"],
    },
    LanguageProfile {
        code: "es",
        name: "Español",
        instruction: None,
        labels: &["traducción"],
    },
];

static LABEL_PATTERNS: Lazy<HashMap<&'static str, Regex>> = Lazy::new(|| {
    LANGUAGES
        .iter()
        .filter_map(|lang| label_pattern(lang.labels).map(|re| (lang.code, re)))
        .collect()
});

static DEFAULT_LABEL_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| label_pattern(&[]));

/// `^(label|...)\s*[:：]\s*`, longest labels first, English labels always included.
fn label_pattern(labels: &[&str]) -> Option<Regex> {
    let mut all: Vec<&str> = labels.iter().chain(ENGLISH_LABELS).copied().collect();
    all.sort_by_key(|label| std::cmp::Reverse(label.len()));
    all.dedup();
    let alternatives: Vec<String> = all.iter().map(|label| regex::escape(label)).collect();
    Regex::new(&format!(r"(?i)^\s*(?:{})\s*[:：]\s*", alternatives.join("|"))).ok()
}

pub fn find_language(code: &str) -> Option<&'static LanguageProfile> {
    let code = code.to_ascii_lowercase();
    LANGUAGES.iter().find(|lang| lang.code == code)
}

/// Build the instruction prompt for `target_lang`, embedding `text` verbatim.
pub fn build_prompt(text: &str, target_lang: &str) -> String {
    let instruction = match find_language(target_lang) {
        Some(LanguageProfile {
            instruction: Some(instruction),
            ..
        }) => (*instruction).to_string(),
        Some(lang) => default_instruction(lang.name),
        None => default_instruction(target_lang),
    };
    format!("{instruction}\n\n{TEXT_MARKER}\n{text}\n{TEXT_MARKER}")
}

fn default_instruction(language: &str) -> String {
    format!(
        "Translate the following text into {language}.\n\
         Requirements:\n\
         1. Keep the original paragraphs, line breaks and formatting\n\
         2. Use terminology customary for {language} readers\n\
         3. Output only the translation, without notes or headings"
    )
}

/// Strip echoed labels such as "翻譯結果：" or "Translated text:" and
/// surrounding whitespace from raw model output.
pub fn clean_output(raw: &str, target_lang: &str) -> String {
    let code = target_lang.to_ascii_lowercase();
    let pattern = LABEL_PATTERNS
        .get(code.as_str())
        .or(DEFAULT_LABEL_PATTERN.as_ref());

    let mut text = raw.trim();
    if let Some(pattern) = pattern {
        // A model sometimes stacks labels, e.g. "Translation: 翻譯結果："
        while let Some(found) = pattern.find(text) {
            if found.end() == 0 {
                break;
            }
            text = text[found.end()..].trim_start();
        }
    }
    strip_fence(text).trim().to_string()
}

fn strip_fence(text: &str) -> &str {
    text.strip_prefix(TEXT_MARKER)
        .and_then(|inner| inner.strip_suffix(TEXT_MARKER))
        .unwrap_or(text)
}
