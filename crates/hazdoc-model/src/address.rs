/// Column width used for shipper and consignee addresses on the declaration templates.
pub const DEFAULT_ADDRESS_WIDTH: usize = 40;

/// Greedy word wrap.
///
/// Lines hold at most `width` characters unless a single word is longer, in which case that
/// word sits alone on its line. Any run of whitespace (newlines included) is a single break
/// opportunity. A `width` of zero behaves like one.
pub fn wrap(address: &str, width: usize) -> String {
    let width = width.max(1);
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in address.split_whitespace() {
        let word_len = word.chars().count();
        if current_len == 0 {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + 1 + word_len <= width {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        }
    }
    if current_len > 0 {
        lines.push(current);
    }
    lines.join("\n")
}
