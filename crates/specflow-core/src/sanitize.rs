//! Allow-list checks for free-form values passed to `git`.
//!
//! Values are accepted verbatim or rejected whole. Nothing is stripped or
//! escaped. The caller still passes every value as its own argv entry; see
//! [`crate::git`].

use crate::error::{FieldKind, GitSecurityError, Offense};

pub const MAX_REF_LEN: usize = 255;
pub const MAX_MESSAGE_LEN: usize = 1024;

/// Characters never allowed in a commit message.
pub const BLOCKED_MESSAGE_CHARS: &[char] = &[';', '|', '&', '`', '$', '\n', '>', '<', '(', ')'];

pub fn sanitize(kind: FieldKind, value: &str) -> Result<&str, GitSecurityError> {
    let reject = |offense| GitSecurityError { kind, offense };

    if value.is_empty() {
        return Err(reject(Offense::Empty));
    }

    // Character checks run first so the first bad character is what gets reported.
    match kind {
        FieldKind::Branch | FieldKind::Tag => {
            if let Some((offset, ch)) = value.chars().enumerate().find(|(_, c)| !is_ref_char(*c)) {
                return Err(reject(Offense::Char { ch, offset }));
            }
            let len = value.chars().count();
            if len > MAX_REF_LEN {
                return Err(reject(Offense::TooLong { len, max: MAX_REF_LEN }));
            }
            if let Some(pattern) = ref_pattern_violation(value) {
                return Err(reject(Offense::Pattern(pattern)));
            }
        }
        FieldKind::CommitMessage => {
            if let Some((offset, ch)) = value
                .chars()
                .enumerate()
                .find(|(_, c)| {
                    BLOCKED_MESSAGE_CHARS.contains(c) || c.is_control() || is_invisible(*c)
                })
            {
                return Err(reject(Offense::Char { ch, offset }));
            }
            let len = value.chars().count();
            if len > MAX_MESSAGE_LEN {
                return Err(reject(Offense::TooLong { len, max: MAX_MESSAGE_LEN }));
            }
            if value.trim().is_empty() {
                return Err(reject(Offense::Empty));
            }
            if value.starts_with('-') {
                return Err(reject(Offense::Pattern("leading '-'")));
            }
        }
    }

    Ok(value)
}

/// Unicode format (Cf) and line or paragraph separator (Zl, Zp) characters:
/// bidi overrides, zero-width joiners and the like.
fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}'
            | '\u{0600}'..='\u{0605}'
            | '\u{061C}'
            | '\u{06DD}'
            | '\u{070F}'
            | '\u{0890}'..='\u{0891}'
            | '\u{08E2}'
            | '\u{180E}'
            | '\u{200B}'..='\u{200F}'
            | '\u{2028}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{2066}'..='\u{206F}'
            | '\u{FEFF}'
            | '\u{FFF9}'..='\u{FFFB}'
            | '\u{110BD}'
            | '\u{110CD}'
            | '\u{13430}'..='\u{1343F}'
            | '\u{1BCA0}'..='\u{1BCA3}'
            | '\u{1D173}'..='\u{1D17A}'
            | '\u{E0001}'
            | '\u{E0020}'..='\u{E007F}'
    )
}

fn is_ref_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '.' | '-')
}

/// Sequences git (or its option parser) would treat specially even though
/// every character is individually allowed.
fn ref_pattern_violation(value: &str) -> Option<&'static str> {
    if value.starts_with('-') {
        Some("leading '-'")
    } else if value.contains("..") {
        Some("'..'")
    } else if value.contains("//") {
        Some("'//'")
    } else if value.starts_with('/') || value.ends_with('/') {
        Some("leading or trailing '/'")
    } else if value.starts_with('.') || value.ends_with('.') || value.contains("/.") {
        Some("component starting or ending with '.'")
    } else if value.ends_with(".lock") {
        Some("'.lock' suffix")
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn offense(kind: FieldKind, value: &str) -> Offense {
        sanitize(kind, value)
            .expect_err(&format!("expected rejection: {value:?}"))
            .offense
    }

    #[test]
    fn branch_with_semicolon_cites_it() {
        let err = sanitize(FieldKind::Branch, "feature; rm -rf /").unwrap_err();
        assert_eq!(err.offense, Offense::Char { ch: ';', offset: 7 });
        assert_eq!(err.kind, FieldKind::Branch);
    }

    #[test]
    fn allow_listed_values_come_back_unchanged() {
        for v in ["001-login", "feature/auth_v2", "release-1.2.0", "A/b/C_9"] {
            assert_eq!(sanitize(FieldKind::Branch, v).unwrap(), v);
            assert_eq!(sanitize(FieldKind::Tag, v).unwrap(), v);
        }
        let msg = "Add login spec: covers SSO, MFA and recovery? no -- just SSO!";
        assert_eq!(sanitize(FieldKind::CommitMessage, msg).unwrap(), msg);
        assert_eq!(sanitize(FieldKind::CommitMessage, "Ünïcode spec ✓").unwrap(), "Ünïcode spec ✓");
    }

    #[test]
    fn every_blocked_character_rejects_a_message() {
        for &ch in BLOCKED_MESSAGE_CHARS {
            let value = format!("update spec {ch} tail");
            assert_eq!(
                offense(FieldKind::CommitMessage, &value),
                Offense::Char { ch, offset: 12 }
            );
        }
    }

    #[test]
    fn shell_metacharacters_reject_refs() {
        for v in ["a;b", "a|b", "a&b", "a`b", "$(x)", "a b", "a\nb", "a>b", "a<b", "a*b", "a~1", "a^", "a:b"] {
            assert!(matches!(offense(FieldKind::Branch, v), Offense::Char { .. }), "{v:?}");
            assert!(matches!(offense(FieldKind::Tag, v), Offense::Char { .. }), "{v:?}");
        }
    }

    #[test]
    fn ref_patterns_reject() {
        for v in ["-D", "--force", "a..b", "/lead", "trail/", "a//b", ".hidden", "x/.y", "dot.", "main.lock"] {
            assert!(matches!(offense(FieldKind::Branch, v), Offense::Pattern(_)), "{v:?}");
        }
    }

    #[test]
    fn control_characters_reject_messages() {
        assert!(matches!(
            offense(FieldKind::CommitMessage, "tab\there"),
            Offense::Char { ch: '\t', .. }
        ));
        assert!(matches!(
            offense(FieldKind::CommitMessage, "cr\rhere"),
            Offense::Char { ch: '\r', .. }
        ));
        assert_eq!(
            offense(FieldKind::CommitMessage, "fix \u{202E}gnp.exe"),
            Offense::Char { ch: '\u{202E}', offset: 4 }
        );
        assert_eq!(
            offense(FieldKind::CommitMessage, "a\u{200B}b"),
            Offense::Char { ch: '\u{200B}', offset: 1 }
        );
        assert_eq!(
            offense(FieldKind::CommitMessage, "x\u{2028}y"),
            Offense::Char { ch: '\u{2028}', offset: 1 }
        );
        for ch in ['\u{2029}', '\u{2066}', '\u{FEFF}', '\u{00AD}', '\u{E0041}'] {
            let value = format!("spec{ch}update");
            assert_eq!(offense(FieldKind::CommitMessage, &value), Offense::Char { ch, offset: 4 });
        }
    }

    #[test]
    fn option_like_message_rejected() {
        assert!(matches!(
            offense(FieldKind::CommitMessage, "--amend"),
            Offense::Pattern(_)
        ));
    }

    #[test]
    fn empty_and_oversized_values_reject() {
        assert_eq!(offense(FieldKind::Branch, ""), Offense::Empty);
        assert_eq!(offense(FieldKind::CommitMessage, "   "), Offense::Empty);
        let long_ref = "a".repeat(MAX_REF_LEN + 1);
        assert_eq!(
            offense(FieldKind::Tag, &long_ref),
            Offense::TooLong { len: MAX_REF_LEN + 1, max: MAX_REF_LEN }
        );
        let long_msg = "m".repeat(MAX_MESSAGE_LEN + 1);
        assert!(matches!(offense(FieldKind::CommitMessage, &long_msg), Offense::TooLong { .. }));
        assert!(sanitize(FieldKind::CommitMessage, &"m".repeat(MAX_MESSAGE_LEN)).is_ok());
    }

    #[test]
    fn bad_character_anywhere_rejects_whole_value() {
        let v = format!("{}{}", "a".repeat(200), ";");
        assert_eq!(offense(FieldKind::Branch, &v), Offense::Char { ch: ';', offset: 200 });
    }
}
