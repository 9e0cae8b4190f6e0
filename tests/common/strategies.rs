use notification_core::orchestration::BackoffCalculatorConfig;
use notification_core::ChannelKind;
use proptest::prelude::*;
use std::collections::BTreeMap;

/// Strategy for tenant and request identifiers
pub fn identifier_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9][a-z0-9-]{0,31}"
}

pub fn channel_strategy() -> impl Strategy<Value = ChannelKind> {
    prop_oneof![
        Just(ChannelKind::Push),
        Just(ChannelKind::Email),
        Just(ChannelKind::Sms),
    ]
}

/// Strategy for valid backoff configurations (cap never below base)
pub fn backoff_config_strategy() -> impl Strategy<Value = BackoffCalculatorConfig> {
    (1u64..=10_000, 1u64..=1_000, 0u64..=1_000, 1u32..=10).prop_map(
        |(base_delay_ms, cap_multiplier, jitter_window_ms, max_attempts)| {
            BackoffCalculatorConfig {
                base_delay_ms,
                max_delay_ms: base_delay_ms * cap_multiplier,
                jitter_window_ms,
                max_attempts,
            }
        },
    )
}

/// Words Handlebars resolves as helpers or literals rather than variables
const RESERVED_NAMES: &[&str] = &[
    "if", "unless", "each", "with", "lookup", "raw", "log", "eq", "ne", "gt", "gte", "lt", "lte",
    "and", "or", "not", "len", "else", "this", "true", "false", "null",
];

/// Strategy for placeholder names that resolve as plain variables
pub fn placeholder_name_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9_]{0,11}".prop_filter("reserved template word", |name| {
        !RESERVED_NAMES.contains(&name.as_str())
    })
}

/// Strategy for variable maps; values may themselves look like placeholders
pub fn variables_strategy() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map(
        placeholder_name_strategy(),
        prop_oneof!["[ -~]{0,24}", "\\{\\{ ?[a-z]{1,6} ?\\}\\}"],
        0..6,
    )
}

/// Strategy for template bodies mixing text, placeholders and stray braces
pub fn template_body_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            "[a-zA-Z ,.!]{0,12}",
            placeholder_name_strategy().prop_map(|name| format!("{{{{ {name} }}}}")),
            Just("{{".to_string()),
            Just("}}".to_string()),
        ],
        0..12,
    )
    .prop_map(|parts| parts.concat())
}

/// Strategy for bodies built only from plain text and well-formed
/// placeholders, paired with the text that remains once every placeholder
/// renders empty
pub fn well_formed_body_strategy() -> impl Strategy<Value = (String, String)> {
    prop::collection::vec(
        prop_oneof![
            "[a-zA-Z ,.!]{0,12}".prop_map(|text| (text.clone(), text)),
            placeholder_name_strategy()
                .prop_map(|name| (format!("{{{{ {name} }}}}"), String::new())),
        ],
        0..12,
    )
    .prop_map(|parts| {
        parts
            .into_iter()
            .fold((String::new(), String::new()), |(mut body, mut text), (part, plain)| {
                body.push_str(&part);
                text.push_str(&plain);
                (body, text)
            })
    })
}
