//! # Cache Key
//!
//! 检索缓存键的构造规则。
//!
//! 键格式: `mem:<sha256(user_id)>:<sha256(limit, query)>`
//!
//! 用户段和查询段都是定长十六进制摘要，因此按用户前缀失效时
//! 不会误伤其他用户 (例如 `"u1"` 与 `"u1:x"`)。

use sha2::{Digest, Sha256};

const NAMESPACE: &str = "mem";

/// 缓存键构造器
pub struct CacheKey;

impl CacheKey {
    /// 某个用户所有检索缓存键的公共前缀
    pub fn user_prefix(user_id: &str) -> String {
        format!("{}:{}:", NAMESPACE, digest(user_id.as_bytes()))
    }

    /// 检索结果缓存键
    ///
    /// 相同的 (user, query, limit) 必然得到相同的键。
    pub fn memories(user_id: &str, query: &str, limit: usize) -> String {
        let mut hasher = Sha256::new();
        hasher.update(limit.to_le_bytes());
        hasher.update(query.as_bytes());
        format!("{}{}", Self::user_prefix(user_id), hex::encode(hasher.finalize()))
    }
}

fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
