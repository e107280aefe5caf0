use regex::{Regex, RegexBuilder};

/// Ordered (pattern, code) table; the first pattern that matches a heading
/// names its item.
pub const SEC_ITEM_PATTERNS: &[(&str, &str)] = &[
    // 8-K
    (r"item\s*1\.01", "item_1_01"),
    (r"item\s*1\.02", "item_1_02"),
    (r"item\s*2\.01", "item_2_01"),
    (r"item\s*2\.02", "item_2_02"),
    (r"item\s*2\.05", "item_2_05"),
    (r"item\s*3\.01", "item_3_01"),
    (r"item\s*5\.02", "item_5_02"),
    (r"item\s*5\.03", "item_5_03"),
    (r"item\s*7\.01", "item_7_01"),
    (r"item\s*8\.01", "item_8_01"),
    (r"item\s*9\.01", "item_9_01"),
    // 10-K
    (r"item\s*1[.\s:—]+business", "item_1"),
    (r"item\s*1a[.\s:—]+risk", "item_1a"),
    (r"item\s*1b[.\s:—]+unresolved", "item_1b"),
    (r"item\s*2[.\s:—]+propert", "item_2"),
    (r"item\s*3[.\s:—]+legal", "item_3"),
    (r"item\s*4[.\s:—]+mine", "item_4"),
    (r"item\s*5[.\s:—]+market", "item_5"),
    (r"item\s*6[.\s:—]+selected", "item_6"),
    (r"item\s*7[.\s:—]+management", "item_7"),
    (r"item\s*7a[.\s:—]+quantitative", "item_7a"),
    (r"item\s*8[.\s:—]+financial\s+stat", "item_8"),
    (r"item\s*9[.\s:—]+changes", "item_9"),
    (r"item\s*9a[.\s:—]+controls", "item_9a"),
    (r"item\s*9b[.\s:—]+other", "item_9b"),
    (r"item\s*10[.\s:—]+directors", "item_10"),
    (r"item\s*11[.\s:—]+executive", "item_11"),
    (r"item\s*12[.\s:—]+security", "item_12"),
    (r"item\s*13[.\s:—]+certain", "item_13"),
    (r"item\s*14[.\s:—]+principal", "item_14"),
    (r"item\s*15[.\s:—]+exhibit", "item_15"),
    // 10-Q
    (r"item\s*1[.\s:—]+financial\s+stat", "item_1_10q"),
    (r"item\s*2[.\s:—]+management", "item_2_10q"),
    (r"item\s*3[.\s:—]+quantitative", "item_3_10q"),
    (r"item\s*4[.\s:—]+controls", "item_4_10q"),
];

/// Compiled, case-insensitive item table. First match wins.
pub struct ItemPatterns {
    patterns: Vec<(Regex, String)>,
}

impl ItemPatterns {
    pub fn new(table: &[(&str, &str)]) -> Result<Self, regex::Error> {
        let patterns = table
            .iter()
            .map(|(pattern, code)| {
                let re = RegexBuilder::new(pattern).case_insensitive(true).build()?;
                Ok((re, code.to_string()))
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { patterns })
    }

    pub fn sec() -> Self {
        Self::new(SEC_ITEM_PATTERNS).expect("built-in item patterns compile")
    }

    pub fn detect(&self, text: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|(re, _)| re.is_match(text))
            .map(|(_, code)| code.as_str())
    }
}
