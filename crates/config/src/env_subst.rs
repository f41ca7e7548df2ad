/// Replace `${ENV_VAR}` placeholders in raw config text.
///
/// Unset variables and unterminated placeholders are left untouched.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };

        let name = &after[..end];
        match lookup(name).filter(|_| !name.is_empty()) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "CHIRP_KEY" => Some("ck".into()),
            "CHIRP_SECRET" => Some("cs".into()),
            _ => None,
        }
    }

    #[test]
    fn substitutes_known_var() {
        assert_eq!(
            substitute_env_with("consumer_key = \"${CHIRP_KEY}\"", lookup),
            "consumer_key = \"ck\""
        );
    }

    #[test]
    fn substitutes_several_vars_in_one_value() {
        assert_eq!(
            substitute_env_with("${CHIRP_KEY}:${CHIRP_SECRET}", lookup),
            "ck:cs"
        );
    }

    #[test]
    fn leaves_unknown_var() {
        assert_eq!(
            substitute_env_with("${CHIRP_NONEXISTENT_XYZ}", lookup),
            "${CHIRP_NONEXISTENT_XYZ}"
        );
        assert_eq!(substitute_env_with("${}", lookup), "${}");
    }

    #[test]
    fn unterminated_placeholder_is_literal() {
        assert_eq!(substitute_env_with("a ${CHIRP_KEY", lookup), "a ${CHIRP_KEY");
    }

    #[test]
    fn no_placeholders() {
        assert_eq!(substitute_env("plain $text {here}"), "plain $text {here}");
    }
}
