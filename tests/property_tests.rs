use audio_hub::client::capability::{DurationFormat, FieldMapping, HttpMethod, PaginationMapping};
use audio_hub::client::normalize::{format_duration, pagination_info, ResponseNormalizer};
use audio_hub::client::path::get_path;
use audio_hub::client::template::{render, RenderTarget, TemplateValues};
use audio_hub::client::{CallParams, CapabilityConfig, RequestBuilder};
use proptest::prelude::*;
use serde_json::{json, Value};

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-z0-9 ]{0,8}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-c]", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

mod path_props {
    use super::*;

    proptest! {
        #[test]
        fn test_empty_path_is_always_absent(data in arb_json()) {
            prop_assert!(get_path(&data, "").is_none());
        }

        #[test]
        fn test_nested_lookup_finds_leaf(a in "[a-z]{1,6}", b in "[a-z]{1,6}", n in any::<i64>()) {
            let data = json!({ (a.clone()): { (b.clone()): n } });
            prop_assert_eq!(get_path(&data, &format!("{a}.{b}")), Some(&json!(n)));
            let deeper = format!("{a}.{b}.c");
            prop_assert!(get_path(&data, &deeper).is_none());
        }
    }
}

mod normalize_props {
    use super::*;

    proptest! {
        #[test]
        fn test_success_mismatch_always_empty(status in any::<i64>().prop_filter("not the success value", |s| *s != 0), items in arb_json()) {
            let mapping = FieldMapping::from_raw(&json!({
                "success_field": "status",
                "success_value": 0,
                "data_path": "data"
            }))
            .unwrap();
            let raw = json!({"status": status, "data": items});
            let normalizer = ResponseNormalizer::new("p", &mapping);
            prop_assert!(normalizer.books(&raw).is_empty());
            prop_assert!(normalizer.chapters(&raw, 20).chapters.is_empty());
        }

        #[test]
        fn test_numeric_durations_render_as_minutes_seconds(seconds in 1i64..360_000) {
            let rendered = format_duration(Some(&json!(seconds)), DurationFormat::Auto);
            let (minutes, secs) = rendered.split_once(':').unwrap();
            prop_assert_eq!(minutes.parse::<i64>().unwrap() * 60 + secs.parse::<i64>().unwrap(), seconds);
            prop_assert_eq!(secs.len(), 2);
        }

        #[test]
        fn test_string_durations_pass_through(text in "[0-9]{1,2}:[0-9]{2}") {
            prop_assert_eq!(format_duration(Some(&json!(text.clone())), DurationFormat::Auto), text);
        }

        #[test]
        fn test_inferred_pages_cover_total(total in 1u64..100_000, size in 1u32..500) {
            let mapping = PaginationMapping {
                total_count_field: Some("total".to_string()),
                max_page_field: None,
            };
            let info = pagination_info(&json!({"total": total}), Some(&mapping), size);
            let size = u64::from(size);
            prop_assert_eq!(info.total_count, total);
            prop_assert!(info.total_pages * size >= total);
            prop_assert!((info.total_pages - 1) * size < total);
        }

        #[test]
        fn test_chapters_sorted_by_order(orders in prop::collection::vec(-50i64..50, 0..20)) {
            let items: Vec<Value> = orders
                .iter()
                .enumerate()
                .map(|(i, order)| json!({"chapterId": i, "position": order}))
                .collect();
            let raw = json!({"data": {"list": items}});
            let mapping = FieldMapping::default();
            let listing = ResponseNormalizer::new("p", &mapping).chapters(&raw, 20);

            prop_assert_eq!(listing.chapters.len(), orders.len());
            for pair in listing.chapters.windows(2) {
                prop_assert!(pair[0].order <= pair[1].order);
                if pair[0].order == pair[1].order {
                    // stable: upstream order kept for ties
                    prop_assert!(pair[0].id.parse::<usize>().unwrap() < pair[1].id.parse::<usize>().unwrap());
                }
            }
        }
    }
}

mod request_props {
    use super::*;

    fn any_method() -> impl Strategy<Value = HttpMethod> {
        prop_oneof![
            Just(HttpMethod::Get),
            Just(HttpMethod::Post),
            Just(HttpMethod::Put),
            Just(HttpMethod::Delete),
        ]
    }

    proptest! {
        #[test]
        fn test_no_template_means_unsupported(method in any_method(), keyword in ".{0,12}") {
            let config = CapabilityConfig { method, ..CapabilityConfig::default() };
            prop_assert!(RequestBuilder::build(&config, &CallParams::search(keyword)).unwrap().is_none());
        }

        #[test]
        fn test_keyword_text_is_never_rescanned(keyword in "[{}a-zA-Z]{0,16}") {
            let values = TemplateValues {
                keyword: Some(keyword.clone()),
                page: Some("7".to_string()),
                ..TemplateValues::default()
            };
            prop_assert_eq!(render("{keyword}", &values, RenderTarget::Text).unwrap(), keyword);
        }

        #[test]
        fn test_text_without_braces_unchanged(text in "[^{}]{0,32}") {
            prop_assert_eq!(render(&text, &TemplateValues::default(), RenderTarget::Url).unwrap(), text);
        }
    }
}
