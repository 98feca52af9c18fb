//! 词元过滤：判断 token 是否参与计数。

/// ASCII 标点（`char::is_ascii_punctuation` 的同一集合，这里显式列出）
const ASCII_PUNCT: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// 返回 true 表示该 token 应被排除。
///
/// 任一字符满足下列条件即排除：ASCII 标点、空白、ASCII 范围（< 128）、
/// CJK 标点 U+3000..=U+303F、CJK 括号 U+3008..=U+3011、全角区 U+FF00..=U+FFEF、
/// 引号 `"` `“` `”`。空 token 也视为噪声（不会进入词表）。
pub fn is_noise(token: &str) -> bool {
    if token.is_empty() {
        return true;
    }
    token.chars().any(is_noise_char)
}

fn is_noise_char(c: char) -> bool {
    if ASCII_PUNCT.contains(c) || c.is_whitespace() || c.is_ascii() {
        return true;
    }
    // 中文标点
    if ('\u{3000}'..='\u{303F}').contains(&c) {
        return true;
    }
    // 书名号/括号
    if ('\u{3008}'..='\u{3011}').contains(&c) {
        return true;
    }
    // 全角 ASCII
    if ('\u{FF00}'..='\u{FFEF}').contains(&c) {
        return true;
    }
    matches!(c, '"' | '“' | '”')
}
