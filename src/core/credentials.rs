//! # Credentials Module / 凭据模块
//!
//! Secret tokens are resolved once by the caller and passed explicitly to the
//! reporter; nothing below the CLI reads them from the environment.
//!
//! 密钥令牌由调用者解析一次并显式传递给报告器；CLI 之下的任何代码都不会从环境中读取它们。

use std::fmt;

/// A bearer secret. `Debug` and `Display` never print the value.
/// 一个持有者密钥。`Debug` 和 `Display` 永远不会打印其值。
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// The two tokens the pipeline may use.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub coverage: Option<Credential>,
    pub status: Option<Credential>,
}

impl Credentials {
    /// Resolves both tokens through `lookup`, which maps a variable name to
    /// its value. Empty values count as missing.
    pub fn resolve(
        coverage_var: &str,
        status_var: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let fetch = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .map(Credential::new)
        };
        Self {
            coverage: fetch(coverage_var),
            status: fetch(status_var),
        }
    }
}
