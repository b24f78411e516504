//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 手机验证码登录与会话服务。
//!
//! 验证码以字符串存放在 `login:code:{phone}`；会话以哈希存放在 `login:token:{token}`，
//! 每次认证成功都会刷新会话的过期时间。

use crate::backend::KvStore;
use crate::config::LoginConfig;
use crate::database::{User, UserDto, UserRepository};
use crate::error::{DealError, Result};
use crate::id_worker::IdGenerator;
use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

pub const LOGIN_CODE_PREFIX: &str = "login:code:";
pub const LOGIN_TOKEN_PREFIX: &str = "login:token:";

/// 用户ID使用的业务键
pub const USER_BUSINESS_KEY: &str = "user";

const CODE_LENGTH: usize = 6;

lazy_static! {
    static ref PHONE_PATTERN: Regex =
        Regex::new(r"^1([38][0-9]|4[579]|5[0-35-9]|6[6]|7[0135678]|9[89])\d{8}$")
            .expect("phone pattern is valid");
}

/// 手机号格式是否合法
pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_PATTERN.is_match(phone)
}

#[derive(Clone)]
pub struct LoginService {
    users: Arc<dyn UserRepository>,
    store: Arc<dyn KvStore>,
    ids: IdGenerator,
    code_ttl: Duration,
    token_ttl: Duration,
}

impl LoginService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        store: Arc<dyn KvStore>,
        ids: IdGenerator,
        config: &LoginConfig,
    ) -> Self {
        Self {
            users,
            store,
            ids,
            code_ttl: Duration::from_secs(config.code_ttl_secs),
            token_ttl: Duration::from_secs(config.token_ttl_secs),
        }
    }

    /// 生成并保存验证码，返回验证码供短信通道发送
    #[instrument(skip(self), level = "info")]
    pub async fn send_code(&self, phone: &str) -> Result<String> {
        if !is_valid_phone(phone) {
            return Err(DealError::Validation(format!("invalid phone {}", phone)));
        }
        let code: String = {
            let mut rng = rand::thread_rng();
            (0..CODE_LENGTH)
                .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
                .collect()
        };
        self.store
            .set(
                &format!("{}{}", LOGIN_CODE_PREFIX, phone),
                &code,
                Some(self.code_ttl),
            )
            .await?;
        debug!("Verification code issued for {}", phone);
        Ok(code)
    }

    /// 校验验证码并登录，不存在的用户会被自动创建；返回会话令牌
    #[instrument(skip(self, code), level = "info")]
    pub async fn login(&self, phone: &str, code: &str) -> Result<String> {
        if !is_valid_phone(phone) {
            return Err(DealError::Validation(format!("invalid phone {}", phone)));
        }
        let code_key = format!("{}{}", LOGIN_CODE_PREFIX, phone);
        match self.store.get(&code_key).await? {
            Some(expected) if expected == code => {}
            _ => {
                return Err(DealError::Validation(
                    "verification code mismatch".to_string(),
                ))
            }
        }
        self.store.delete(&code_key).await?;

        let user = match self.users.find_user_by_phone(phone).await? {
            Some(user) => user,
            None => self.register(phone).await?,
        };

        let token = uuid::Uuid::new_v4().simple().to_string();
        let token_key = format!("{}{}", LOGIN_TOKEN_PREFIX, token);
        self.store
            .hset_all(&token_key, &UserDto::from(&user).to_fields())
            .await?;
        self.store.expire(&token_key, self.token_ttl).await?;
        Ok(token)
    }

    /// 创建新用户；并发首次登录时另一请求可能已写入同一手机号，此时读取已有用户
    async fn register(&self, phone: &str) -> Result<User> {
        let user = User::with_phone(self.ids.next_id(USER_BUSINESS_KEY).await?, phone);
        match self.users.insert_user(&user).await {
            Ok(()) => {
                info!("Registered user {} for {}", user.id, phone);
                Ok(user)
            }
            Err(DealError::Duplicate(reason)) => {
                debug!("Concurrent registration for {}: {}", phone, reason);
                self.users
                    .find_user_by_phone(phone)
                    .await?
                    .ok_or_else(|| DealError::NotFound(format!("user with phone {}", phone)))
            }
            Err(e) => Err(e),
        }
    }

    /// 按令牌读取会话并刷新其过期时间；会话不存在时返回 None
    #[instrument(skip(self, token), level = "debug")]
    pub async fn authenticate(&self, token: &str) -> Result<Option<UserDto>> {
        if token.is_empty() {
            return Ok(None);
        }
        let token_key = format!("{}{}", LOGIN_TOKEN_PREFIX, token);
        let fields = self.store.hget_all(&token_key).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        let user = UserDto::from_fields(&fields)?;
        self.store.expire(&token_key, self.token_ttl).await?;
        Ok(Some(user))
    }
}
