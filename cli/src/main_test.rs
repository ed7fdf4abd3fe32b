use super::*;

#[test]
fn plain_text_is_sent_verbatim() {
    assert_eq!(parse_input("  hello there "), Input::Say("  hello there "));
}

#[test]
fn slash_commands_are_recognized() {
    assert_eq!(parse_input("/clear"), Input::Clear);
    assert_eq!(parse_input(" /status "), Input::Status);
    assert_eq!(parse_input("/reconnect"), Input::Reconnect);
    assert_eq!(parse_input("/quit"), Input::Quit);
    assert_eq!(parse_input("/exit"), Input::Quit);
}

#[test]
fn unknown_slash_command_is_reported() {
    assert_eq!(parse_input("/nick bob"), Input::Unknown("/nick bob"));
}

#[test]
fn cli_requires_username() {
    // Only test in this crate that touches the environment.
    unsafe { std::env::remove_var("HUBCHAT_USERNAME") };
    let err = Cli::try_parse_from(["hubchat-cli"]).unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

    let cli = Cli::try_parse_from(["hubchat-cli", "--username", "alice", "--base-url", "http://hub:80/"]).unwrap();
    assert_eq!(cli.username, "alice");
    assert_eq!(cli.base_url.as_deref(), Some("http://hub:80/"));
}
