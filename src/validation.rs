use thiserror::Error;

const EMAIL_MAX_CHARS: usize = 255;
const PASSWORD_MIN_CHARS: usize = 6;
const PASSWORD_MAX_CHARS: usize = 100;

/// 通信前の入力チェックで検出したエラー。
///
/// メッセージはそのまま利用者に表示する。
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub String);

/// 入力チェック済みの認証情報。
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"********")
            .finish()
    }
}

impl Credentials {
    /// 認証フォームの入力をチェックする。
    ///
    /// メールアドレスは前後の空白を取り除いてからチェックし、最初に違反したルールのメッセージを返す。
    ///
    /// # Arguments
    ///
    /// * `email` - メールアドレス
    /// * `password` - パスワード
    pub fn parse(email: &str, password: &str) -> Result<Self, ValidationError> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(ValidationError("Invalid email address".to_string()));
        }
        if text_length(email) > EMAIL_MAX_CHARS {
            return Err(too_long(EMAIL_MAX_CHARS));
        }

        let password_chars = text_length(password);
        if password_chars < PASSWORD_MIN_CHARS {
            return Err(ValidationError(format!(
                "Password must be at least {} characters",
                PASSWORD_MIN_CHARS
            )));
        }
        if password_chars > PASSWORD_MAX_CHARS {
            return Err(too_long(PASSWORD_MAX_CHARS));
        }

        Ok(Self {
            email: email.to_string(),
            password: password.to_string(),
        })
    }
}

/// ブラウザのフォームと同じく、文字数はUTF-16のコード単位で数える。
fn text_length(s: &str) -> usize {
    s.encode_utf16().count()
}

fn too_long(max: usize) -> ValidationError {
    ValidationError(format!("String must contain at most {} character(s)", max))
}

/// メールアドレスとして構文上正しいかどうか。
///
/// ローカル部は英数字と`_ ' + - .`、ドメインは英数字とハイフンのラベルを`.`で繋いだもので、
/// トップレベルは2文字以上の英字とする。
fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    let local_ok = !local.is_empty()
        && !local.starts_with('.')
        && !local.contains("..")
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_'+-.".contains(c))
        && local
            .chars()
            .last()
            .map_or(false, |c| c.is_ascii_alphanumeric() || "_+-".contains(c));
    if !local_ok {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    let Some((tld, hosts)) = labels.split_last() else {
        return false;
    };
    let hosts_ok = !hosts.is_empty()
        && hosts.iter().all(|label| {
            label
                .chars()
                .next()
                .map_or(false, |c| c.is_ascii_alphanumeric())
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        });
    let tld_ok = tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic());

    hosts_ok && tld_ok
}
