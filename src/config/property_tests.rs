//! Property-based tests for configuration module
//!
//! These tests use proptest to generate random configurations and verify
//! validation boundaries and serialization round-trips.

use super::*;
use proptest::prelude::*;

prop_compose! {
    fn valid_dispatcher_config()(
        max_events in 1usize..=1024,
        worker_nice in 0i32..=19,
        thread_name in "[a-z][a-z-]{0,14}",
    ) -> DispatcherConfig {
        DispatcherConfig {
            max_events,
            worker_nice,
            thread_name,
        }
    }
}

prop_compose! {
    fn valid_input_config()(
        scroll_step in 1i32..1000,
        touch_id_stride in 1u32..10_000,
    ) -> InputConfig {
        InputConfig {
            scroll_step,
            touch_id_stride,
        }
    }
}

prop_compose! {
    fn valid_config()(
        dispatcher in valid_dispatcher_config(),
        input in valid_input_config(),
        id_base in any::<u32>(),
    ) -> WayrouteConfig {
        WayrouteConfig {
            dispatcher,
            input,
            surface: SurfaceConfig {
                id_base,
                ..SurfaceConfig::default()
            },
        }
    }
}

proptest! {
    #[test]
    fn test_valid_configs_pass_validation(config in valid_config()) {
        prop_assert!(config.validate().is_ok());
    }

    #[test]
    fn test_valid_configs_roundtrip_through_toml(config in valid_config()) {
        let toml_string = toml::to_string(&config).unwrap();
        let parsed: WayrouteConfig = toml::from_str(&toml_string).unwrap();
        prop_assert_eq!(parsed, config);
    }

    #[test]
    fn test_out_of_range_nice_is_rejected(nice in prop_oneof![i32::MIN..0, 20i32..i32::MAX]) {
        let mut config = WayrouteConfig::default();
        config.dispatcher.worker_nice = nice;
        prop_assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_positive_scroll_step_is_rejected(step in i32::MIN..=0) {
        let mut config = WayrouteConfig::default();
        config.input.scroll_step = step;
        prop_assert!(config.validate().is_err());
    }
}
