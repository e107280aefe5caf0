/// Best-guess language of a text sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// ISO 639-1 where one exists, otherwise ISO 639-3.
    pub language: String,
    pub confidence: f64,
}

/// Pluggable language identification.
pub trait LanguageDetector: Send + Sync {
    fn detect(&self, text: &str) -> Option<Detection>;
}

/// Trigram-based detection via `whatlang`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhatlangDetector;

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> Option<Detection> {
        let info = whatlang::detect(text)?;
        Some(Detection {
            language: to_iso639_1(info.lang().code()).to_string(),
            confidence: info.confidence(),
        })
    }
}

/// Always reports the same answer. Useful where detection is not wanted.
#[derive(Debug, Clone)]
pub struct FixedLanguage(pub Detection);

impl LanguageDetector for FixedLanguage {
    fn detect(&self, _: &str) -> Option<Detection> {
        Some(self.0.clone())
    }
}

pub fn to_iso639_1(code: &str) -> &str {
    match code {
        "eng" => "en",
        "spa" => "es",
        "fra" => "fr",
        "deu" => "de",
        "ita" => "it",
        "por" => "pt",
        "nld" => "nl",
        "rus" => "ru",
        "ukr" => "uk",
        "pol" => "pl",
        "ces" => "cs",
        "slk" => "sk",
        "hun" => "hu",
        "ron" => "ro",
        "bul" => "bg",
        "ell" => "el",
        "tur" => "tr",
        "swe" => "sv",
        "dan" => "da",
        "nob" => "nb",
        "fin" => "fi",
        "est" => "et",
        "lav" => "lv",
        "lit" => "lt",
        "hrv" => "hr",
        "srp" => "sr",
        "slv" => "sl",
        "cat" => "ca",
        "heb" => "he",
        "ara" => "ar",
        "pes" => "fa",
        "hin" => "hi",
        "ben" => "bn",
        "tam" => "ta",
        "tha" => "th",
        "vie" => "vi",
        "ind" => "id",
        "jpn" => "ja",
        "kor" => "ko",
        "cmn" => "zh",
        "lat" => "la",
        "afr" => "af",
        other => other,
    }
}
