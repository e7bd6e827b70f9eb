//! Statement descriptor formatting.

use farebox_shared::types::TransactionId;

/// Characters the gateway rejects in statement descriptors.
const FORBIDDEN: [char; 4] = ['<', '>', '"', '\''];

/// Maximum descriptor length accepted by the gateway.
const MAX_LEN: usize = 22;

/// Builds the statement descriptor for a company's charge.
///
/// Prefers the company's SMS operator code over its name, strips the
/// characters the gateway rejects, keeps the first 10 characters, appends
/// `,Ref#<transaction id>` and truncates the whole thing to 22
/// characters.
#[must_use]
pub fn statement_descriptor(
    name: &str,
    sms_op_code: Option<&str>,
    transaction_id: TransactionId,
) -> String {
    let base = sms_op_code.filter(|s| !s.trim().is_empty()).unwrap_or(name);
    let cleaned: String = base.chars().filter(|c| !FORBIDDEN.contains(c)).collect();
    let prefix: String = cleaned.chars().take(10).collect();

    format!("{prefix},Ref#{transaction_id}")
        .chars()
        .take(MAX_LEN)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_and_charset() {
        let d = statement_descriptor(
            "Very Long Transport Company Name",
            None,
            TransactionId::new(),
        );
        assert!(d.len() <= MAX_LEN);
        assert!(!d.contains(['<', '>', '"', '\'']));
    }

    #[test]
    fn test_prefers_sms_op_code() {
        let d = statement_descriptor("Amber Coaches", Some("AMBR"), TransactionId::new());
        assert!(d.starts_with("AMBR,Ref#"));
    }

    #[test]
    fn test_blank_sms_op_code_falls_back_to_name() {
        let d = statement_descriptor("Amber", Some("  "), TransactionId::new());
        assert!(d.starts_with("Amber,Ref#"));
    }

    #[test]
    fn test_forbidden_characters_stripped() {
        let d = statement_descriptor("A<b>c\"d'e", None, TransactionId::new());
        assert!(d.starts_with("Abcde,Ref#"));
    }

    #[test]
    fn test_company_prefix_capped_at_ten() {
        let d = statement_descriptor("ABCDEFGHIJKLMNOP", None, TransactionId::new());
        assert!(d.starts_with("ABCDEFGHIJ,Ref#"));
    }
}
