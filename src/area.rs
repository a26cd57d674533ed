// 🗾 Area Code Resolver
// 5-digit region code → fixed prefecture (static 47-entry table) + municipality name

use serde::{Deserialize, Serialize};

/// Prefecture code → prefecture name (JIS X 0401)
pub const PREFECTURES: [(&str, &str); 47] = [
    ("01", "北海道"),
    ("02", "青森県"),
    ("03", "岩手県"),
    ("04", "宮城県"),
    ("05", "秋田県"),
    ("06", "山形県"),
    ("07", "福島県"),
    ("08", "茨城県"),
    ("09", "栃木県"),
    ("10", "群馬県"),
    ("11", "埼玉県"),
    ("12", "千葉県"),
    ("13", "東京都"),
    ("14", "神奈川県"),
    ("15", "新潟県"),
    ("16", "富山県"),
    ("17", "石川県"),
    ("18", "福井県"),
    ("19", "山梨県"),
    ("20", "長野県"),
    ("21", "岐阜県"),
    ("22", "静岡県"),
    ("23", "愛知県"),
    ("24", "三重県"),
    ("25", "滋賀県"),
    ("26", "京都府"),
    ("27", "大阪府"),
    ("28", "兵庫県"),
    ("29", "奈良県"),
    ("30", "和歌山県"),
    ("31", "鳥取県"),
    ("32", "島根県"),
    ("33", "岡山県"),
    ("34", "広島県"),
    ("35", "山口県"),
    ("36", "徳島県"),
    ("37", "香川県"),
    ("38", "愛媛県"),
    ("39", "高知県"),
    ("40", "福岡県"),
    ("41", "佐賀県"),
    ("42", "長崎県"),
    ("43", "熊本県"),
    ("44", "大分県"),
    ("45", "宮崎県"),
    ("46", "鹿児島県"),
    ("47", "沖縄県"),
];

/// AreaCode - result of resolving a region code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaCode {
    /// First two characters of the region code
    pub prefecture_code: String,
    /// Empty when the prefix is not in the table
    pub prefecture_name: String,
}

/// Look up a prefecture name by its 2-digit code
pub fn prefecture_name(pref_code: &str) -> Option<&'static str> {
    PREFECTURES
        .iter()
        .find(|(code, _)| *code == pref_code)
        .map(|(_, name)| *name)
}

/// True for "01".."47"
pub fn is_known_prefecture(pref_code: &str) -> bool {
    prefecture_name(pref_code).is_some()
}

/// A 5-digit municipal code: known prefecture, not a national or prefecture total ("00000", "13000")
pub fn is_municipal_code(code: &str) -> bool {
    code.len() == 5
        && code.bytes().all(|b| b.is_ascii_digit())
        && is_known_prefecture(&code[..2])
        && &code[2..] != "000"
}

/// Resolve a region code to its prefecture. Never fails.
pub fn resolve(code: &str) -> AreaCode {
    let prefecture_code = match code.char_indices().nth(2) {
        Some((idx, _)) => &code[..idx],
        None => code,
    };

    AreaCode {
        prefecture_code: prefecture_code.to_string(),
        prefecture_name: prefecture_name(prefecture_code)
            .unwrap_or_default()
            .to_string(),
    }
}

/// Municipality name with the resolved prefecture prefix stripped, if present
///
/// "東京都千代田区" (13101) → "千代田区"; "千代田区" stays as-is.
pub fn municipality_name(code: &str, raw_name: &str) -> String {
    let area = resolve(code);
    strip_prefecture(&area.prefecture_name, raw_name)
}

/// Split a full area label into (prefecture, municipality) using the code's prefix
pub fn split_area_name(code: &str, area_name: &str) -> (String, String) {
    let area = resolve(code);
    let municipality = strip_prefecture(&area.prefecture_name, area_name);
    (area.prefecture_name, municipality)
}

fn strip_prefecture(prefecture: &str, name: &str) -> String {
    let name = name.trim();
    if !prefecture.is_empty() {
        if let Some(rest) = name.strip_prefix(prefecture) {
            return rest.trim_start().to_string();
        }
    }
    name.to_string()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_has_47_unique_entries() {
        let mut codes: Vec<&str> = PREFECTURES.iter().map(|(c, _)| *c).collect();
        codes.dedup();
        assert_eq!(codes.len(), 47);
        assert_eq!(PREFECTURES[0], ("01", "北海道"));
        assert_eq!(PREFECTURES[46], ("47", "沖縄県"));
    }

    #[test]
    fn test_resolve_prefix_for_every_prefecture() {
        for (pref, name) in PREFECTURES.iter() {
            let code = format!("{}101", pref);
            let area = resolve(&code);
            assert_eq!(area.prefecture_code, &code[0..2]);
            assert_eq!(area.prefecture_name, *name);
        }
    }

    #[test]
    fn test_municipal_codes() {
        assert!(is_municipal_code("13101"));
        assert!(is_municipal_code("01100"));
        assert!(!is_municipal_code("00000"));
        assert!(!is_municipal_code("13000"));
        assert!(!is_municipal_code("99101"));
        assert!(!is_municipal_code("1310"));
        assert!(!is_municipal_code("13１01"));
    }

    #[test]
    fn test_resolve_unknown_prefix_is_empty() {
        let area = resolve("99999");
        assert_eq!(area.prefecture_code, "99");
        assert_eq!(area.prefecture_name, "");

        let area = resolve("00123");
        assert_eq!(area.prefecture_name, "");
    }

    #[test]
    fn test_resolve_short_input() {
        let area = resolve("1");
        assert_eq!(area.prefecture_code, "1");
        assert_eq!(area.prefecture_name, "");
    }

    #[test]
    fn test_municipality_strips_prefecture_prefix() {
        assert_eq!(municipality_name("13101", "東京都千代田区"), "千代田区");
        assert_eq!(municipality_name("13101", "千代田区"), "千代田区");
        assert_eq!(municipality_name("01100", "北海道札幌市"), "札幌市");
    }

    #[test]
    fn test_municipality_not_stripped_for_other_prefecture() {
        // Label belongs to a different prefecture than the code says: kept as-is
        assert_eq!(municipality_name("14100", "東京都千代田区"), "東京都千代田区");
    }

    #[test]
    fn test_split_area_name() {
        let (pref, muni) = split_area_name("27100", "大阪府大阪市");
        assert_eq!(pref, "大阪府");
        assert_eq!(muni, "大阪市");
    }
}
