use workerbridge_cli::{run_session, CliError};
use workerbridge_envelope::{Envelope, EnvelopeCodec, JsonCodec};
use workerbridge_host::HostConfig;

fn output_envelopes(output: &[u8]) -> Vec<Envelope> {
    output
        .split(|b| *b == b'\n')
        .filter(|line| !line.is_empty())
        .map(|line| JsonCodec.decode(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_ticks_are_answered_on_stdout() {
    let input = b"{\"category\":\"tick\",\"id\":1}\n\n{\"category\":\"tick\",\"id\":2}\n";
    let mut output = Vec::new();

    let summary = run_session(HostConfig::default(), &input[..], &mut output)
        .await
        .unwrap();

    let envelopes = output_envelopes(&output);
    let categories: Vec<&str> = envelopes.iter().map(|e| e.category.as_str()).collect();
    assert_eq!(categories, vec!["worker-init", "tock", "tock"]);
    assert_eq!(envelopes[2].id, Some(2));

    assert_eq!(summary.envelopes_in, 2);
    assert_eq!(summary.envelopes_out, 3);
}

#[tokio::test]
async fn test_frames_from_base64_pixels() {
    let config = HostConfig {
        width: 1,
        height: 1,
        ..HostConfig::default()
    };
    let input = concat!(
        r#"{"category":"canvas","operation":"acquire-context","payload":{"kind":"2d"}}"#,
        "\n",
        r#"{"category":"canvas","operation":"render","payload":{"pixels":"AQIDBA=="}}"#,
        "\n",
    );
    let mut output = Vec::new();

    let summary = run_session(config, input.as_bytes(), &mut output)
        .await
        .unwrap();

    assert_eq!(summary.frames_presented, 1);
}

#[tokio::test]
async fn test_unknown_category_fails_after_flushing_output() {
    let input = concat!(
        r#"{"category":"tick","id":7}"#,
        "\n",
        r#"{"category":"telemetry"}"#,
        "\n",
    );
    let mut output = Vec::new();

    let err = run_session(HostConfig::default(), input.as_bytes(), &mut output)
        .await
        .unwrap_err();
    assert!(err.is_protocol());
    assert_eq!(err.exit_code(), 2);

    let envelopes = output_envelopes(&output);
    assert_eq!(envelopes[0].category, "worker-init");
    assert_eq!(envelopes[1].category, "tock");
    assert_eq!(envelopes[1].id, Some(7));
}

#[tokio::test]
async fn test_malformed_line_reports_line_number() {
    let input = "{\"category\":\"deferred\"}\nnot json\n";
    let mut output = Vec::new();

    let err = run_session(HostConfig::default(), input.as_bytes(), &mut output)
        .await
        .unwrap_err();

    assert!(matches!(err, CliError::Decode { line: 2, .. }));
    assert!(err.is_protocol());
}
