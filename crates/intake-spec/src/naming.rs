/// Machine key for a label: lower-cased, with every run of
/// non-alphanumeric characters collapsed into one underscore.
pub fn derive_field_name(label: &str) -> String {
    let mut name = String::with_capacity(label.len());
    let mut pending_separator = false;
    for ch in label.chars() {
        if ch.is_alphanumeric() {
            if pending_separator && !name.is_empty() {
                name.push('_');
            }
            pending_separator = false;
            name.extend(ch.to_lowercase());
        } else {
            pending_separator = true;
        }
    }
    name
}

/// First name of the form `{base}`, `{base}_2`, `{base}_3`, ... that `taken` rejects.
pub fn unique_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}_{}", base, n))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_runs_and_lowercases() {
        assert_eq!(derive_field_name("Full Name"), "full_name");
        assert_eq!(derive_field_name("E-mail  Address!!"), "e_mail_address");
        assert_eq!(derive_field_name("  Date of Birth (DOB) "), "date_of_birth_dob");
        assert_eq!(derive_field_name("Grade"), "grade");
        assert_eq!(derive_field_name("***"), "");
    }

    #[test]
    fn unique_name_appends_counter() {
        let taken = ["email_copy", "email_copy_2"];
        assert_eq!(
            unique_name("email_copy", |name| taken.contains(&name)),
            "email_copy_3"
        );
        assert_eq!(unique_name("phone", |name| taken.contains(&name)), "phone");
    }
}
