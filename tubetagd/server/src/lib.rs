mod routes;

use std::env;
use std::num::ParseIntError;

use clap::builder::styling;
pub use routes::{AppState, content_disposition, router};

const DEFAULT_PORT: u16 = 5000;

pub fn server_port() -> Result<u16, ParseIntError> {
    Ok(match env::var("PORT") {
        Ok(port) => port.parse()?,
        Err(_) => DEFAULT_PORT,
    })
}

pub fn clap_base_command() -> clap::Command {
    clap::Command::default().styles(
        styling::Styles::styled()
            .header(
                styling::Style::default()
                    .bold()
                    .fg_color(Some(styling::Color::Ansi(styling::AnsiColor::Blue))),
            )
            .placeholder(styling::Style::default().dimmed()),
    )
}
