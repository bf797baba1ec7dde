fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use detstream_analytics::normalize_message;
    use detstream_protocol::{Command, ControlKind, StartParams, encode, parse};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn read_fixture(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    /// Parses `<name>.json` as a wire message, normalizes it, and compares
    /// the result with `<name>.expected.json`.
    fn normalize_test(name: &str) {
        let raw = read_fixture(&format!("{name}.json"));
        let msg = parse(raw.trim()).unwrap_or_else(|e| panic!("failed to parse {name}: {e}"));
        assert_eq!(msg.kind, ControlKind::Payload, "{name} is not a payload");

        let frame = normalize_message(&msg);
        let actual = serde_json::to_value(&frame).unwrap();
        let expected: serde_json::Value =
            serde_json::from_str(&read_fixture(&format!("{name}.expected.json")))
                .unwrap_or_else(|e| panic!("failed to parse expected output for {name}: {e}"));

        assert_eq!(
            actual, expected,
            "normalization mismatch for {name}:\n  expected: {expected}\n  actual:   {actual}"
        );
    }

    // --- Analytics payload shapes ---

    #[test]
    fn fixture_track_payload() {
        normalize_test("track_payload");
    }

    #[test]
    fn fixture_lane_payload() {
        normalize_test("lane_payload");
    }

    #[test]
    fn fixture_lane_payload_top_level_idx() {
        normalize_test("lane_payload_top_level_idx");
    }

    #[test]
    fn fixture_data_wrapper_defaults() {
        normalize_test("data_wrapper_defaults");
    }

    #[test]
    fn fixture_mixed_shapes() {
        normalize_test("mixed_shapes");
    }

    // --- Outbound commands ---

    #[test]
    fn commands_match_service_format() {
        assert_eq!(encode(&Command::Stop), r#"{"type":"stop"}"#);

        let params = StartParams::new("/app/source/侵占消防通道.mp4")
            .unwrap()
            .with_conf_thres(0.65)
            .unwrap()
            .with_frame_gap(2)
            .unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&encode(&Command::Start(params))).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "start",
                "source": "/app/source/侵占消防通道.mp4",
                "conf_thres": 0.65,
                "frame_gap": 2
            })
        );
    }

    // --- Control messages ---

    #[test]
    fn control_messages_from_service() {
        let started = parse(r#"{"type":"started","algorithm":"illegal_parking"}"#).unwrap();
        assert_eq!(started.kind, ControlKind::Started);
        assert_eq!(started.algorithm(), Some("illegal_parking"));

        let error = parse(r#"{"type":"error","error":"cannot open source"}"#).unwrap();
        assert_eq!(error.error_text(), Some("cannot open source"));

        let stopped = parse(r#"{"type":"stopped"}"#).unwrap();
        assert_eq!(stopped.kind, ControlKind::Stopped);
    }
}
