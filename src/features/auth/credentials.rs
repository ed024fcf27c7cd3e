use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

use crate::config::UserEntry;
use crate::error::AppError;

/// 口令哈希格式标识
pub const HASH_SCHEME: &str = "pbkdf2-sha256";
/// 新生成哈希的默认迭代次数
pub const DEFAULT_ROUNDS: u32 = 100_000;

const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// 通过校验的用户
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub username: String,
}

/// 凭据校验接口（用户存储由外部提供）
pub trait CredentialStore: Send + Sync {
    /// 校验用户名与口令；失败返回 None，不区分“用户不存在”和“口令错误”
    fn authenticate(&self, username: &str, password: &str) -> Option<AuthenticatedUser>;
}

/// 解析后的口令哈希
#[derive(Debug, Clone)]
pub struct PasswordHash {
    rounds: u32,
    salt: Vec<u8>,
    hash: Vec<u8>,
}

impl PasswordHash {
    /// 解析 `pbkdf2-sha256$<rounds>$<salt_b64>$<hash_b64>`
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let invalid = || AppError::Internal("口令哈希格式无效".into());
        let mut parts = raw.trim().split('$');
        if parts.next() != Some(HASH_SCHEME) {
            return Err(invalid());
        }
        let rounds: u32 = parts
            .next()
            .and_then(|r| r.parse().ok())
            .filter(|r| *r > 0)
            .ok_or_else(invalid)?;
        let salt = parts
            .next()
            .and_then(|s| STANDARD_NO_PAD.decode(s).ok())
            .ok_or_else(invalid)?;
        let hash = parts
            .next()
            .and_then(|h| STANDARD_NO_PAD.decode(h).ok())
            .filter(|h| !h.is_empty())
            .ok_or_else(invalid)?;
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self { rounds, salt, hash })
    }

    pub fn verify(&self, password: &str) -> bool {
        let derived = derive(password, &self.salt, self.rounds, self.hash.len());
        constant_time_eq(&derived, &self.hash)
    }
}

fn derive(password: &str, salt: &[u8], rounds: u32, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, rounds, &mut out);
    out
}

const COMPARE_KEY: &[u8] = b"qr-backend/credential-compare";

/// 借助 `Mac::verify_slice` 的常量时间比较；无法构造 MAC 时按不相等处理
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let tag = |v: &[u8]| -> Option<Hmac<Sha256>> {
        let mut mac = Hmac::<Sha256>::new_from_slice(COMPARE_KEY).ok()?;
        mac.update(v);
        Some(mac)
    };
    match (tag(a), tag(b)) {
        (Some(lhs), Some(rhs)) => lhs.verify_slice(&rhs.finalize().into_bytes()).is_ok(),
        _ => false,
    }
}

/// 生成可写入配置文件的口令哈希（随机盐）
pub fn hash_password(password: &str, rounds: u32) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    hash_password_with_salt(password, &salt, rounds)
}

pub fn hash_password_with_salt(password: &str, salt: &[u8], rounds: u32) -> String {
    let hash = derive(password, salt, rounds, KEY_LEN);
    format!(
        "{HASH_SCHEME}${rounds}${}${}",
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(hash)
    )
}

/// 基于配置文件用户列表的凭据存储
pub struct StaticCredentialStore {
    users: HashMap<String, PasswordHash>,
    /// 用户不存在时也做一次同等代价的推导，避免通过耗时差异探测用户名
    decoy: PasswordHash,
}

impl StaticCredentialStore {
    pub fn from_entries(entries: &[UserEntry]) -> Result<Self, AppError> {
        let mut users = HashMap::with_capacity(entries.len());
        for entry in entries {
            let hash = PasswordHash::parse(&entry.password_hash).map_err(|_| {
                AppError::Internal(format!("用户 {} 的 password_hash 格式无效", entry.username))
            })?;
            users.insert(entry.username.clone(), hash);
        }
        let rounds = users
            .values()
            .map(|h| h.rounds)
            .max()
            .unwrap_or(DEFAULT_ROUNDS);
        let decoy = PasswordHash {
            rounds,
            salt: vec![0u8; SALT_LEN],
            hash: vec![0u8; KEY_LEN],
        };
        if users.is_empty() {
            tracing::warn!("未配置任何登录用户，/token 将始终返回 401");
        }
        Ok(Self { users, decoy })
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl CredentialStore for StaticCredentialStore {
    fn authenticate(&self, username: &str, password: &str) -> Option<AuthenticatedUser> {
        match self.users.get(username) {
            Some(hash) if hash.verify(password) => Some(AuthenticatedUser {
                username: username.to_string(),
            }),
            Some(_) => None,
            None => {
                let _ = self.decoy.verify(password);
                None
            }
        }
    }
}
