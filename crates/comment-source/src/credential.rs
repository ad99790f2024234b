//! Account credentials used to authenticate against the comment API.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Cookie set for one Bilibili account.
///
/// Only `SESSDATA` is mandatory. A synthetic `buvid3` is generated when none is
/// supplied because the comment endpoints reject requests without one.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub sessdata: String,
    #[serde(default)]
    pub buvid3: String,
    #[serde(default)]
    pub bili_jct: String,
}

impl Credential {
    pub fn new(sessdata: impl Into<String>) -> Self {
        Self {
            sessdata: sessdata.into(),
            buvid3: String::new(),
            bili_jct: String::new(),
        }
    }

    pub fn with_buvid3(mut self, buvid3: impl Into<String>) -> Self {
        self.buvid3 = buvid3.into();
        self
    }

    pub fn with_bili_jct(mut self, bili_jct: impl Into<String>) -> Self {
        self.bili_jct = bili_jct.into();
        self
    }

    /// Whether the credential carries a session token at all.
    pub fn is_usable(&self) -> bool {
        !self.sessdata.trim().is_empty()
    }

    /// Render the `Cookie` header value for this account.
    pub fn cookie_header(&self) -> String {
        let buvid3 = if self.buvid3.is_empty() {
            generate_fake_buvid3()
        } else {
            self.buvid3.clone()
        };

        let mut cookies = vec![
            format!("SESSDATA={}", self.sessdata),
            format!("buvid3={}", buvid3),
        ];
        if !self.bili_jct.is_empty() {
            cookies.push(format!("bili_jct={}", self.bili_jct));
        }
        cookies.join("; ")
    }

    /// Short, non-secret fingerprint for log lines.
    pub fn fingerprint(&self) -> String {
        let tail: String = self
            .sessdata
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("***{tail}")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("sessdata", &self.fingerprint())
            .field("has_buvid3", &!self.buvid3.is_empty())
            .field("has_bili_jct", &!self.bili_jct.is_empty())
            .finish()
    }
}

/// Generate a BUVID3-shaped device identifier.
///
/// Format: `XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXXinfoc` with uppercase hex digits.
pub fn generate_fake_buvid3() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
    format!(
        "{}-{}-{}-{}-{}infoc",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..]
    )
}
