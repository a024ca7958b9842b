use crate::infra::{parse_instant, seeded_parking_service, LotService};
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use clap::Args;
use parkwise::clock::{Clock, FixedClock};
use parkwise::config::ParkingConfig;
use parkwise::error::AppError;
use parkwise::parking::{
    compute_hours, CancelSignal, DayNightWindow, ParkingServiceError, PaymentQuote,
    PromotionCard, RegistrationOutcome, TariffTable, VehicleCategory, VehicleRegistration,
};
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct QuoteArgs {
    /// Arrival (RFC 3339 or YYYY-MM-DD HH:MM, UTC)
    #[arg(long, value_parser = parse_instant)]
    pub(crate) from: DateTime<Utc>,
    /// Departure (RFC 3339 or YYYY-MM-DD HH:MM, UTC)
    #[arg(long, value_parser = parse_instant)]
    pub(crate) to: DateTime<Utc>,
    /// Vehicle category: A, B or C
    #[arg(long, default_value = "A", value_parser = parse_category)]
    pub(crate) category: VehicleCategory,
    /// Promotion card: silver, gold or platinum
    #[arg(long, value_parser = parse_card)]
    pub(crate) card: Option<PromotionCard>,
    /// Hour daytime billing starts
    #[arg(long, default_value_t = 8)]
    pub(crate) daily_start_hour: u8,
    /// Hour nighttime billing starts
    #[arg(long, default_value_t = 18)]
    pub(crate) nightly_start_hour: u8,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Capacity units in the demo lot.
    #[arg(long, default_value_t = 6)]
    pub(crate) total_space: u32,
    /// Opening time of the simulated day. Defaults to 07:30 UTC today.
    #[arg(long, value_parser = parse_instant)]
    pub(crate) opening: Option<DateTime<Utc>>,
}

pub(crate) fn run_quote(args: QuoteArgs) -> Result<(), AppError> {
    let QuoteArgs {
        from,
        to,
        category,
        card,
        daily_start_hour,
        nightly_start_hour,
    } = args;

    let window = DayNightWindow::new(daily_start_hour, nightly_start_hour)?;
    let hours = compute_hours(from, to, window)?;
    let quote = TariffTable::standard().quote(category, card, hours);

    println!("Parking quote {} -> {}", from.to_rfc3339(), to.to_rfc3339());
    println!(
        "- window: daytime {:02}:00-{:02}:00",
        window.daily_start(),
        window.nightly_start()
    );
    render_quote(&quote);
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        total_space,
        opening,
    } = args;

    let opening = opening.unwrap_or_else(default_opening);
    let clock = Arc::new(FixedClock::new(opening));
    let config = ParkingConfig {
        total_space,
        ..ParkingConfig::default()
    };
    let service = seeded_parking_service(&config, clock.clone());
    let cancel = CancelSignal::new();

    println!(
        "Parking gate demo: {} units, opening {}",
        total_space,
        opening.to_rfc3339()
    );

    let arrivals = [
        ("CA1001AB", "A", None),
        ("CB2002CD", "B", Some("gold")),
        ("CC3003EF", "C", Some("platinum")),
        ("CA1001AB", "A", None),
    ];
    for (plate, category, card) in arrivals {
        clock.advance(Duration::minutes(20));
        register(&service, plate, category, card, &cancel).await?;
    }
    print_lot(&service, &cancel).await?;

    clock.advance(Duration::hours(11));
    for plate in ["CB2002CD", "CA1001AB"] {
        let quote = service.unregister(plate, &cancel).await?;
        println!("- {plate} leaves at {}", clock_label(&clock));
        render_quote(&quote);
    }

    register(&service, "CC3003EF", "C", None, &cancel).await?;
    register(&service, "CB2002CD", "C", None, &cancel).await?;
    print_lot(&service, &cancel).await?;
    Ok(())
}

async fn register(
    service: &LotService,
    plate: &str,
    category: &str,
    card: Option<&str>,
    cancel: &CancelSignal,
) -> Result<(), AppError> {
    let registration = VehicleRegistration {
        registration_number: plate.to_string(),
        category: category.to_string(),
        card: card.map(str::to_string),
    };
    match service.register(registration, cancel).await {
        Ok(RegistrationOutcome::Admitted(record)) => println!(
            "- {plate} ({category}) admitted at {}, holding {} units",
            record.registered_at.format("%H:%M"),
            record.category_space
        ),
        Ok(RegistrationOutcome::LotFull {
            required,
            available,
        }) => println!("- {plate} ({category}) turned away: needs {required}, {available} free"),
        Err(err) if err.is_business_rejection() => println!("- {plate} rejected: {err}"),
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

async fn print_lot(service: &LotService, cancel: &CancelSignal) -> Result<(), ParkingServiceError> {
    let status = service.lot_status(cancel).await?;
    println!(
        "Lot: {}/{} units free, {} vehicles parked",
        status.available_space, status.total_space, status.parked
    );
    Ok(())
}

fn render_quote(quote: &PaymentQuote) {
    println!(
        "  {} daytime h + {} nighttime h, category {}",
        quote.hours.daily, quote.hours.nightly, quote.category
    );
    match quote.promotion_card {
        Some(card) => println!(
            "  {} card: -{}% of {}.{:02}",
            card.label(),
            quote.discount_percent,
            quote.gross_cents / 100,
            quote.gross_cents % 100
        ),
        None => println!("  no promotion card"),
    }
    println!("  amount to pay: {}", quote.amount_display());
}

fn clock_label(clock: &FixedClock) -> String {
    clock.now().format("%Y-%m-%d %H:%M").to_string()
}

fn default_opening() -> DateTime<Utc> {
    let now = Utc::now();
    Utc.with_ymd_and_hms(now.year(), now.month(), now.day(), 7, 30, 0)
        .single()
        .unwrap_or(now)
}

fn parse_category(raw: &str) -> Result<VehicleCategory, String> {
    VehicleCategory::parse(raw).ok_or_else(|| format!("unknown vehicle category '{raw}'"))
}

fn parse_card(raw: &str) -> Result<PromotionCard, String> {
    PromotionCard::parse(raw).ok_or_else(|| format!("unknown promotion card '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_and_card_parsers_reject_unknown_values() {
        assert_eq!(parse_category("c"), Ok(VehicleCategory::C));
        assert!(parse_category("truck").is_err());
        assert_eq!(parse_card("Gold"), Ok(PromotionCard::Gold));
        assert!(parse_card("bronze").is_err());
    }

    #[test]
    fn quote_rejects_reversed_interval() {
        let args = QuoteArgs {
            from: parse_instant("2025-06-02 10:00").expect("valid"),
            to: parse_instant("2025-06-01 10:00").expect("valid"),
            category: VehicleCategory::A,
            card: None,
            daily_start_hour: 8,
            nightly_start_hour: 18,
        };
        assert!(matches!(run_quote(args), Err(AppError::Billing(_))));
    }

    #[tokio::test]
    async fn demo_runs_against_a_small_lot() {
        let args = DemoArgs {
            total_space: 6,
            opening: Some(parse_instant("2025-06-02 07:30").expect("valid")),
        };
        run_demo(args).await.expect("demo completes");
    }
}
