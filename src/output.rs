use serde::Serialize;
use std::sync::OnceLock;

static QUIET: OnceLock<bool> = OnceLock::new();

/// `SQLHARVEST_QUIET=1` (or `true`) suppresses human-mode chatter
pub fn is_quiet() -> bool {
    *QUIET.get_or_init(|| {
        std::env::var("SQLHARVEST_QUIET")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn from_json_flag(json: bool) -> Self {
        if json { Self::Json } else { Self::Human }
    }

    pub fn is_human(self) -> bool {
        self == Self::Human
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    ok: bool,
    command: &'a str,
    data: T,
}

/// Print a success envelope on stdout. No-op in human mode.
pub fn emit_success<T: Serialize>(mode: OutputMode, command: &str, data: T) -> anyhow::Result<()> {
    if mode == OutputMode::Json {
        let envelope = Envelope { ok: true, command, data };
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    }
    Ok(())
}

/// Print a failure envelope on stdout. No-op in human mode.
pub fn emit_error(mode: OutputMode, command: &str, message: &str) -> anyhow::Result<()> {
    if mode == OutputMode::Json {
        let envelope = Envelope {
            ok: false,
            command,
            data: serde_json::json!({ "error": message }),
        };
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    }
    Ok(())
}
