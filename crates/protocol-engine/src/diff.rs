//! Word-level summary of a single edit

/// Describe the smallest contiguous word replacement turning `before` into `after`.
///
/// Returns `None` when the two texts have identical words.
pub fn minimal_fix(before: &str, after: &str) -> Option<String> {
    let old: Vec<&str> = before.split_whitespace().collect();
    let new: Vec<&str> = after.split_whitespace().collect();

    let prefix = old
        .iter()
        .zip(new.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let max_suffix = old.len().min(new.len()) - prefix;
    let suffix = old
        .iter()
        .rev()
        .zip(new.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    let removed = old[prefix..old.len() - suffix].join(" ");
    let added = new[prefix..new.len() - suffix].join(" ");

    match (removed.is_empty(), added.is_empty()) {
        (true, true) => None,
        (false, false) => Some(format!("replace \"{}\" with \"{}\"", removed, added)),
        (false, true) => Some(format!("delete \"{}\"", removed)),
        (true, false) => match prefix.checked_sub(1).and_then(|i| old.get(i)) {
            Some(anchor) => Some(format!("insert \"{}\" after \"{}\"", added, anchor)),
            None => Some(format!("insert \"{}\" at start", added)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_word_replacement() {
        assert_eq!(
            minimal_fix("Subjects will be enrolled", "participants will be enrolled").as_deref(),
            Some("replace \"Subjects\" with \"participants\"")
        );
    }

    #[test]
    fn test_phrase_replacement_in_middle() {
        let fix = minimal_fix(
            "Report AEs promptly to the sponsor",
            "Report AEs within 24 hours of site awareness to the sponsor",
        )
        .unwrap();
        assert_eq!(fix, "replace \"promptly\" with \"within 24 hours of site awareness\"");
    }

    #[test]
    fn test_insertion_and_deletion() {
        assert_eq!(
            minimal_fix("consent obtained", "consent must be obtained").as_deref(),
            Some("insert \"must be\" after \"consent\"")
        );
        assert_eq!(
            minimal_fix("take the the dose", "take the dose").as_deref(),
            Some("delete \"the\"")
        );
    }

    #[test]
    fn test_identical_is_none() {
        assert_eq!(minimal_fix("same  words", "same words"), None);
    }
}
