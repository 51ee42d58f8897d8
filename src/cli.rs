use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "lazyfleet", version, about = "TUI for managing device fleets")]
pub struct Args {
    /// Backend base URL (overrides the config file)
    #[arg(short, long)]
    pub api_url: Option<String>,

    /// Theme flavor: mocha, macchiato, frappe or latte
    #[arg(short, long)]
    pub theme: Option<String>,
}
