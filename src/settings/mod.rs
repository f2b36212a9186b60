use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "Arcadia")]
#[command(version)]
#[command(about = "An open source virtual world client")]
pub struct CliArgs {
    /// Base URL that asset:// references resolve against.
    #[arg(long, env = "ARCADIA_ASSETS_ROOT")]
    pub assets_root: Option<String>,

    /// Asset kind to load: model, avatar, emote or script.
    pub kind: String,

    /// An asset:// reference or an absolute http(s) URL.
    pub locator: String,
}
