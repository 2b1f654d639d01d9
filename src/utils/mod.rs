pub mod ip;
pub mod key_codec;
pub mod request;
pub mod url_validator;

pub use key_codec::{decode_key, encode_key, fold_key};
pub use url_validator::validate_url;

/// 点击 ID 长度
pub const CLICK_ID_LENGTH: usize = 16;

/// 各实体 ID 前缀
pub mod id_prefix {
    pub const WORKSPACE: &str = "ws_";
    pub const TOKEN: &str = "tok_";
    pub const LINK: &str = "link_";
    pub const TAG: &str = "tag_";
    pub const CUSTOMER: &str = "cus_";
    pub const PROGRAM: &str = "prog_";
    pub const PARTNER: &str = "pn_";
    pub const ENROLLMENT: &str = "pge_";
    pub const REWARD: &str = "rw_";
    pub const SALE: &str = "sale_";
    pub const PAYOUT: &str = "po_";
    pub const EVENT: &str = "evt_";
    pub const WEBHOOK_EVENT: &str = "whevt_";
}

pub fn generate_random_code(length: usize) -> String {
    use std::iter;

    // 随机选择字母和数字
    let chars = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

    iter::repeat_with(|| chars[rand::random_range(0..chars.len())] as char)
        .take(length)
        .collect()
}

/// 生成带前缀的实体 ID，例如 `link_4fQ1...`
pub fn create_id(prefix: &str) -> String {
    format!("{}{}", prefix, generate_random_code(24))
}

/// 生成新的点击 ID
pub fn create_click_id() -> String {
    generate_random_code(CLICK_ID_LENGTH)
}

/// 新的 workspace API 令牌（明文只展示一次）
pub fn generate_api_token() -> String {
    format!("dub_{}", generate_random_code(24))
}

/// 令牌在库中的形式：SHA-256 的十六进制
pub fn hash_token(token: &str) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(token.as_bytes()))
}
