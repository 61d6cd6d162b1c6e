use std::time::Duration;

use tokio::time::Instant;

use deskbot_application::{ShellBridge, ShellLine, ShellScript};

use super::{DEFAULT_WARNING_PATTERNS, PowerShellBridge, ShellConfig, redact};

fn sh_bridge() -> PowerShellBridge {
    PowerShellBridge::new(ShellConfig {
        program: "/bin/sh".to_owned(),
        args: vec!["-c".to_owned()],
        warning_patterns: DEFAULT_WARNING_PATTERNS
            .iter()
            .map(|pattern| (*pattern).to_owned())
            .collect(),
        default_timeout: Some(Duration::from_secs(10)),
    })
    .unwrap_or_else(|_| unreachable!())
}

#[tokio::test]
async fn clean_exit_is_success() {
    let outcome = sh_bridge()
        .run_command(
            &ShellScript::new("echo 'success : added alice'; echo 'skipped : bob'"),
            None,
        )
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.exit_code, Some(0));
    assert_eq!(
        outcome.lines(),
        vec![
            ShellLine::Success("added alice".to_owned()),
            ShellLine::Skipped("bob".to_owned()),
        ]
    );
}

#[tokio::test]
async fn non_zero_exit_is_failure() {
    let outcome = sh_bridge()
        .run_command(&ShellScript::new("echo boom >&2; exit 3"), None)
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.exit_code, Some(3));
    assert_eq!(outcome.diagnostic(), "boom");
}

#[tokio::test]
async fn warnings_on_stderr_are_tolerated() {
    let outcome = sh_bridge()
        .run_command(
            &ShellScript::new("echo 'WARNING: module is deprecated' >&2; echo done"),
            None,
        )
        .await;

    assert!(outcome.success);
}

#[tokio::test]
async fn other_stderr_lines_fail_despite_zero_exit() {
    let outcome = sh_bridge()
        .run_command(
            &ShellScript::new(
                "echo 'WARNING: slow' >&2; echo 'Add-MailboxPermission: access denied' >&2",
            ),
            None,
        )
        .await;

    assert_eq!(outcome.exit_code, Some(0));
    assert!(!outcome.success);
}

#[tokio::test]
async fn timeout_kills_the_process() {
    let started = Instant::now();

    let outcome = sh_bridge()
        .run_command(
            &ShellScript::new("sleep 5"),
            Some(Duration::from_millis(200)),
        )
        .await;

    assert!(outcome.timed_out);
    assert!(!outcome.success);
    assert!(outcome.stderr.contains("timed out"));
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn output_is_masked() {
    let secret = "eyJ0eXAi.secret-payload.signature";
    let script = ShellScript::new(format!("echo 'token {secret}'; echo 'Bearer abc.def.ghi' >&2"))
        .with_sensitive(secret);

    let outcome = sh_bridge().run_command(&script, None).await;

    assert!(!outcome.stdout.contains(secret));
    assert!(outcome.stdout.contains("********"));
    assert!(!outcome.stderr.contains("abc.def.ghi"));
}

#[tokio::test]
async fn missing_interpreter_is_reported() {
    let bridge = PowerShellBridge::new(ShellConfig::powershell(
        "/nonexistent/pwsh",
        Some(Duration::from_secs(1)),
    ))
    .unwrap_or_else(|_| unreachable!());

    let outcome = bridge.run_command(&ShellScript::new("Get-Date"), None).await;

    assert!(!outcome.success);
    assert!(outcome.exit_code.is_none());
    assert!(outcome.stderr.contains("failed to start"));
}

#[test]
fn credential_fragments_are_redacted() {
    let masked = redact(
        "Connect-ExchangeOnline -AccessToken 'abc.def.ghi' -Organization contoso.onmicrosoft.com",
        &[],
    );
    assert_eq!(
        masked,
        "Connect-ExchangeOnline -AccessToken ******** -Organization contoso.onmicrosoft.com"
    );
}

#[test]
fn invalid_warning_pattern_is_rejected() {
    let config = ShellConfig {
        warning_patterns: vec!["(".to_owned()],
        ..ShellConfig::powershell("pwsh", None)
    };
    assert!(PowerShellBridge::new(config).is_err());
}
