use hazdoc_model::{normalize, normalize_key, wrap};
use proptest::prelude::*;

proptest! {
    #[test]
    fn normalize_is_idempotent(keys in proptest::collection::vec("[A-Za-z ]{1,16}", 0..8)) {
        let once = normalize(keys.iter().map(|k| (k.as_str(), "v")));
        let twice = normalize(once.iter().map(|(k, v)| (k, v.clone())));
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn normalized_keys_have_no_spaces(key in "[A-Za-z ]{0,24}") {
        prop_assert!(!normalize_key(&key).contains(' '));
    }

    #[test]
    fn wrap_respects_width_and_keeps_words(
        words in proptest::collection::vec("[a-zA-Z0-9,.]{1,12}", 0..20),
        width in 1usize..50,
    ) {
        let input = words.join(" ");
        let wrapped = wrap(&input, width);

        for line in wrapped.lines() {
            let len = line.chars().count();
            prop_assert!(len <= width || !line.contains(' '), "line {line:?} exceeds {width}");
        }
        let rejoined: Vec<&str> = wrapped.split_whitespace().collect();
        prop_assert_eq!(rejoined, words.iter().map(String::as_str).collect::<Vec<_>>());
    }
}
