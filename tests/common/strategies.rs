use proptest::prelude::*;

/// Strategy for standard (unordered) queue names, optionally URL-style
pub fn standard_queue_name_strategy() -> impl Strategy<Value = String> {
    (
        prop::option::of("https://queue\\.local/[0-9]{6}/"),
        "[a-z][a-z0-9_-]{0,40}",
    )
        .prop_map(|(prefix, name)| format!("{}{name}", prefix.unwrap_or_default()))
}

/// Strategy for ordered queue names with any suffix casing
pub fn fifo_queue_name_strategy() -> impl Strategy<Value = String> {
    (
        "[a-z][a-z0-9_-]{0,40}",
        prop::sample::select(vec![".fifo", ".FIFO", ".Fifo", ".fiFO"]),
    )
        .prop_map(|(base, suffix)| format!("{base}{suffix}"))
}

/// Strategy for message bodies
pub fn message_body_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 {}:\",]{1,64}"
}

/// Strategy for a non-empty batch of message bodies
pub fn message_batch_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(message_body_strategy(), 1..60)
}
