//! 状态作用域：仅由键前缀决定
//!
//! `temp:` 会话生命周期（进程内）；`user:` 跨会话、按用户；`app:` 进程生命周期、运行期只读；
//! 无前缀为会话默认作用域。

use serde::{Deserialize, Serialize};

pub const TEMP_PREFIX: &str = "temp:";
pub const USER_PREFIX: &str = "user:";
pub const APP_PREFIX: &str = "app:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    Temp,
    User,
    App,
    Session,
}

impl Scope {
    /// 解析键的作用域
    pub fn of(key: &str) -> Scope {
        if key.starts_with(TEMP_PREFIX) {
            Scope::Temp
        } else if key.starts_with(USER_PREFIX) {
            Scope::User
        } else if key.starts_with(APP_PREFIX) {
            Scope::App
        } else {
            Scope::Session
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            Scope::Temp => TEMP_PREFIX,
            Scope::User => USER_PREFIX,
            Scope::App => APP_PREFIX,
            Scope::Session => "",
        }
    }

    /// 前缀能确定唯一作用域时返回它（用于 list）；空前缀或普通前缀返回 None
    pub fn of_prefix(prefix: &str) -> Option<Scope> {
        match Scope::of(prefix) {
            Scope::Session => None,
            scope => Some(scope),
        }
    }
}

/// 存储命名空间
pub(crate) fn app_namespace() -> String {
    "app".to_string()
}

pub(crate) fn user_namespace(user_id: &str) -> String {
    format!("user/{}", user_id)
}

pub(crate) fn session_namespace(session_id: &str) -> String {
    format!("session/{}", session_id)
}

pub(crate) fn temp_namespace(session_id: &str) -> String {
    format!("temp/{}", session_id)
}
