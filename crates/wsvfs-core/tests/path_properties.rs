mod path_properties {
    use proptest::prelude::*;
    use wsvfs_core::path::{PUBLIC_FOLDER, PathLevel, VirtualPath};

    fn segment() -> impl Strategy<Value = String> {
        "[A-Za-z0-9._-]{1,12}"
    }

    fn separator() -> impl Strategy<Value = &'static str> {
        prop_oneof![Just("/"), Just("\\")]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn test_relative_input_rejected(raw in "[A-Za-z0-9][A-Za-z0-9/\\\\ ._-]{0,40}") {
            prop_assert!(VirtualPath::parse(&raw).is_err());
        }

        #[test]
        fn test_blank_input_is_root(raw in "[ \t]{0,8}") {
            let path = VirtualPath::parse(&raw).unwrap();
            prop_assert_eq!(path.level(), PathLevel::Root);
            prop_assert!(path.segments().is_empty());
        }

        #[test]
        fn test_level_monotonic_and_saturating(
            segments in prop::collection::vec(segment(), 0..8),
            sep in separator(),
        ) {
            let mut previous = PathLevel::Root;
            for n in 0..=segments.len() {
                let raw = format!("{sep}{}", segments[..n].join(sep));
                let level = VirtualPath::parse(&raw).unwrap().level();
                prop_assert!(level >= previous);
                if n >= 3 {
                    prop_assert_eq!(level, PathLevel::Folder);
                }
                previous = level;
            }
        }

        #[test]
        fn test_private_unless_public_label(
            account in segment(),
            partition in prop::option::of(segment()),
            rest in prop::collection::vec(segment(), 0..4),
        ) {
            let mut segments = vec![account];
            if let Some(p) = &partition {
                segments.push(p.clone());
            }
            segments.extend(rest);
            let path = VirtualPath::parse(&format!("/{}", segments.join("/"))).unwrap();
            let expected = partition.as_deref() != Some(PUBLIC_FOLDER);
            prop_assert_eq!(path.is_private(), expected);
        }

        #[test]
        fn test_display_is_backend_portion(
            account in segment(),
            public in any::<bool>(),
            rest in prop::collection::vec(segment(), 1..5),
        ) {
            let partition = if public { "Public" } else { "Private" };
            let raw = format!("/{account}/{partition}/{}", rest.join("/"));
            let path = VirtualPath::parse(&raw).unwrap();
            prop_assert_eq!(path.to_string(), format!("/{}", rest.join("/")));
        }
    }
}
