use crate::demo::{run_demo, run_quote, DemoArgs, QuoteArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use parkwise::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "parkwise",
    about = "Run the parking lot gate service or price a stay from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Split a stay into daytime/nighttime hours and price it
    Quote(QuoteArgs),
    /// Simulate a day at the gate against a small in-memory lot
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Override the configured lot capacity
    #[arg(long)]
    pub(crate) total_space: Option<u32>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Quote(args) => run_quote(args),
        Command::Demo(args) => run_demo(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["parkwise"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn quote_parses_category_card_and_window() {
        let cli = Cli::try_parse_from([
            "parkwise",
            "quote",
            "--from",
            "2025-06-01 20:00",
            "--to",
            "2025-06-04T10:00:00Z",
            "--category",
            "c",
            "--card",
            "gold",
        ])
        .expect("parses");

        let Some(Command::Quote(args)) = cli.command else {
            panic!("expected quote command");
        };
        assert_eq!(args.category, parkwise::parking::VehicleCategory::C);
        assert_eq!(args.card, Some(parkwise::parking::PromotionCard::Gold));
        assert_eq!(args.daily_start_hour, 8);
        assert!(args.from < args.to);
    }

    #[test]
    fn rejects_unknown_category() {
        let result = Cli::try_parse_from([
            "parkwise",
            "quote",
            "--from",
            "2025-06-01 20:00",
            "--to",
            "2025-06-01 21:00",
            "--category",
            "truck",
        ]);
        assert!(result.is_err());
    }
}
