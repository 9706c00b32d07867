#[cfg(not(target_arch = "wasm32"))]
mod cli {
    use clap::Parser;
    use planboard::config::{parse_days, parse_server, SiteConfig, DEFAULT_PREVIEW_DAYS, DEFAULT_SERVER};

    /// Preview the maintenance planning grid in a desktop window
    #[derive(Parser, Debug)]
    #[command(name = "planboard", version)]
    pub struct Cli {
        /// Base URL of the optimization server
        #[arg(long, default_value = DEFAULT_SERVER, value_parser = parse_server)]
        pub server: String,

        /// Number of days (grid columns) to draw
        #[arg(long, default_value_t = DEFAULT_PREVIEW_DAYS, value_parser = parse_days)]
        pub days: u32,
    }

    impl Cli {
        pub fn into_config(self) -> SiteConfig {
            SiteConfig { server: self.server, preview_days: Some(self.days) }
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use clap::Parser;

    let config = cli::Cli::parse().into_config();
    if let Err(e) = planboard::run(config) {
        eprintln!("planboard: {}", e);
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    if let Err(e) = planboard::run() {
        web_sys::console::error_1(&e);
    }
}
