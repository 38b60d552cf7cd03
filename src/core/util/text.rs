// Text helpers used in replies and logs.

use rand::Rng;

/// Cut long content for log embeds: "first fifty chars [...]".
pub fn make_dots(content: &str, max_len: usize) -> String {
    if content.chars().count() <= max_len {
        return content.to_string();
    }
    let cut: String = content.chars().take(max_len).collect();
    format!("{} [...]", cut)
}

/// Strip `@everyone` and `@here` unless the author is allowed to use them.
pub fn at_everyone_filter(content: &str, can_mention_everyone: bool) -> String {
    if can_mention_everyone {
        return content.to_string();
    }
    content.replace("@everyone", "").replace("@here", "")
}

/// Random numeric id with exactly `digits` digits (1..=19).
pub fn gen_id(digits: u32) -> u64 {
    let digits = digits.clamp(1, 19);
    let low = if digits == 1 { 0 } else { 10u64.pow(digits - 1) };
    let high = 10u64.saturating_pow(digits);
    rand::thread_rng().gen_range(low..high)
}

/// Split text into chunks of at most `size` characters.
pub fn split_every(content: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = content.chars().collect();
    chars
        .chunks(size.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Replace the `:user` and `:server` placeholders of a greeting.
pub fn fill_placeholders(template: &str, user: &str, server: &str) -> String {
    template.replace(":user", user).replace(":server", server)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_dots() {
        assert_eq!(make_dots("short", 50), "short");
        assert_eq!(make_dots("abcdef", 3), "abc [...]");
    }

    #[test]
    fn test_at_everyone_filter() {
        assert_eq!(at_everyone_filter("hi @everyone and @here", false), "hi  and ");
        assert_eq!(at_everyone_filter("hi @everyone", true), "hi @everyone");
    }

    #[test]
    fn test_gen_id_length() {
        for _ in 0..50 {
            assert_eq!(gen_id(12).to_string().len(), 12);
        }
    }

    #[test]
    fn test_split_every() {
        assert_eq!(split_every("abcde", 2), vec!["ab", "cd", "e"]);
        assert!(split_every("", 2).is_empty());
    }

    #[test]
    fn test_fill_placeholders() {
        assert_eq!(
            fill_placeholders("Welcome to :server, :user!", "<@1>", "Rust"),
            "Welcome to Rust, <@1>!"
        );
    }
}
