//! 短码大小写保留编码
//!
//! 数据库的 `(domain, key)` 索引不区分大小写，区分大小写的域名把短码的
//! UTF-8 字节编码为小写十六进制后再存储，这样 `Abc` 与 `abc` 会落到不同的行上。

/// 把任意字符串编码为只含 `[0-9a-f]` 的形式
pub fn encode_key(key: &str) -> String {
    hex::encode(key.as_bytes())
}

/// 大小写不敏感比较用的折叠形式（Unicode 小写）
pub fn fold_key(key: &str) -> String {
    key.to_lowercase()
}

/// [`encode_key`] 的逆运算；输入不是合法编码时返回 `None`
pub fn decode_key(encoded: &str) -> Option<String> {
    let bytes = hex::decode(encoded).ok()?;
    String::from_utf8(bytes).ok()
}
