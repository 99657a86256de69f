//! Source language detection for requests sent with `source_lang = "auto"`.

use whatlang::Lang;

/// Minimum whatlang confidence for a detection to be reported.
const MIN_CONFIDENCE: f64 = 0.5;

/// Detects the dominant language of `text` using whatlang.
/// Returns a language tag in the service's vocabulary, or None when whatlang
/// finds no script or is not confident enough.
pub fn detect_language(text: &str) -> Option<String> {
    let info = whatlang::detect(text)?;
    if info.confidence() < MIN_CONFIDENCE {
        return None;
    }
    Some(lang_to_tag(info.lang(), text).to_string())
}

fn lang_to_tag(lang: Lang, text: &str) -> &'static str {
    match lang {
        Lang::Eng => "en",
        Lang::Cmn => chinese_variant(text),
        Lang::Jpn => "ja",
        Lang::Kor => "ko",
        Lang::Fra => "fr",
        Lang::Deu => "de",
        Lang::Spa => "es",
        Lang::Rus => "ru",
        Lang::Por => "pt",
        Lang::Ita => "it",
        Lang::Vie => "vi",
        Lang::Tha => "th",
        _ => "other",
    }
}

// Characters whose simplified and traditional forms differ.
const TRADITIONAL_ONLY: &str = "這個們來時會說國為學對開關與後發還點裡經當頭體";
const SIMPLIFIED_ONLY: &str = "这个们来时会说国为学对开关与后发还点里经当头体";

fn chinese_variant(text: &str) -> &'static str {
    let traditional = text.chars().filter(|c| TRADITIONAL_ONLY.contains(*c)).count();
    let simplified = text.chars().filter(|c| SIMPLIFIED_ONLY.contains(*c)).count();
    if traditional > simplified {
        "zh-tw"
    } else {
        "zh-cn"
    }
}
