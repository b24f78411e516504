//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 连接字符串解析与方言差异处理。

use crate::error::{DealError, Result};
use sea_orm::DatabaseBackend;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 数据库类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseType {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl DatabaseType {
    /// 从URL推断数据库类型，无法识别时按SQLite处理
    pub fn from_url(url: &str) -> Self {
        let lower = url.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            DatabaseType::PostgreSQL
        } else if lower.starts_with("mysql://") {
            DatabaseType::MySQL
        } else {
            DatabaseType::SQLite
        }
    }

    pub fn backend(self) -> DatabaseBackend {
        match self {
            DatabaseType::PostgreSQL => DatabaseBackend::Postgres,
            DatabaseType::MySQL => DatabaseBackend::MySql,
            DatabaseType::SQLite => DatabaseBackend::Sqlite,
        }
    }
}

/// SQLite文件路径，内存数据库与其他类型返回 None
pub fn sqlite_file_path(url: &str) -> Option<PathBuf> {
    if DatabaseType::from_url(url) != DatabaseType::SQLite || url.contains(":memory:") {
        return None;
    }
    let rest = url.strip_prefix("sqlite:")?;
    let path = rest.split('?').next().unwrap_or(rest);
    let path = if let Some(abs) = path.strip_prefix("///") {
        format!("/{}", abs)
    } else {
        path.trim_start_matches("//").to_string()
    };
    (!path.is_empty()).then(|| PathBuf::from(path))
}

/// 确保SQLite数据库文件所在目录存在
pub fn ensure_database_directory(url: &str) -> Result<()> {
    let Some(path) = sqlite_file_path(url) else {
        return Ok(());
    };
    let full_path = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()?.join(path)
    };
    if let Some(parent) = full_path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DealError::DatabaseError(format!(
                    "无法创建数据库目录 {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }
    Ok(())
}

/// 把 `?` 占位符转换为目标方言的写法（PostgreSQL 使用 `$n`）
pub fn bind_placeholders(backend: DatabaseBackend, sql: &str) -> String {
    if backend != DatabaseBackend::Postgres {
        return sql.to_string();
    }
    let mut out = String::with_capacity(sql.len() + 8);
    let mut index = 0;
    for c in sql.chars() {
        if c == '?' {
            index += 1;
            out.push('$');
            out.push_str(&index.to_string());
        } else {
            out.push(c);
        }
    }
    out
}
