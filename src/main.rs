//! Social token exchange simulation.
//!
//! Walks a small market through bootstrap, multi-unit issue, buys, and a sell,
//! printing quotes and subject state along the way.

use clap::Parser;
use socialcoin_core::*;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// CLI arguments for the simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a JSON exchange config. Overrides --env.
    #[arg(short, long)]
    config: Option<String>,

    /// Preset to use when no config file is given
    #[arg(long, value_enum, default_value = "development")]
    env: Environment,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Starting balance for each demo identity, in whole base units
    #[arg(long, default_value_t = 10)]
    balance: u64,
}

const ONE: u64 = 1_000_000_000;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match &args.config {
        Some(path) => ExchangeConfig::from_json_file(path)?,
        None => args.env.config(),
    };
    info!(
        protocol_fee = %config.protocol_fee_rate,
        subject_fee = %config.subject_fee_rate,
        curve = config.curve.shape().name(),
        "starting simulation"
    );

    let exchange = Exchange::new(config, EngineConfig::default())?;
    exchange.set_time(Timestamp::now());

    println!("Social Token Exchange Simulation");
    println!("Bonding curve pricing, exact-payment funding, subject ledger\n");

    let admin = Identity::from_u64(1);
    let user = Identity::from_u64(2);
    let starting = args.balance.saturating_mul(ONE);
    exchange.deposit(admin, starting);
    exchange.deposit(user, starting);
    println!(
        "  admin {} and user {} each deposit {}\n",
        admin.short(),
        user.short(),
        fmt_amount(starting)
    );

    scenario_1_bootstrap(&exchange, admin)?;
    scenario_2_multi_issue(&exchange, user)?;
    scenario_3_buys(&exchange, admin, user)?;
    scenario_4_sell(&exchange, admin, user)?;
    scenario_5_rejections(&exchange, admin, user);

    println!("\nFinal balances");
    for (name, id) in [("admin", admin), ("user", user), ("protocol", Identity::ZERO)] {
        println!("  {name}: {}", fmt_amount(clamp(exchange.wallet().balance(id))));
    }
    println!("  events recorded: {}", exchange.event_count());
    println!("\nSimulation completed successfully.");
    Ok(())
}

/// First issue from zero supply is free.
fn scenario_1_bootstrap(exchange: &Exchange, admin: Identity) -> Result<(), TradeError> {
    println!("Scenario 1: Bootstrap Issue\n");

    let quote = exchange.issue_price_after_fee(1)?;
    println!("  Quoted cost of the first unit: {}", fmt_amount(quote));

    let receipt = exchange.issue(admin, 1)?;
    println!(
        "  admin issued 1, paid {}, supply now {}",
        fmt_amount(receipt.quote.total),
        receipt.supply_after
    );
    print_profile(exchange, admin)?;
    Ok(())
}

/// Issue several units at once: the bootstrap unit is its own leg.
fn scenario_2_multi_issue(exchange: &Exchange, user: Identity) -> Result<(), TradeError> {
    println!("Scenario 2: Multi-Unit Issue\n");

    println!("  Quoted cost of issuing 3: {}", fmt_amount(exchange.issue_price_after_fee(3)?));
    let receipt = exchange.issue(user, 3)?;
    for (i, leg) in receipt.legs.iter().enumerate() {
        println!(
            "  leg {}: base {}, fees {}, total {}",
            i + 1,
            fmt_amount(leg.base_price),
            fmt_amount(leg.fees()),
            fmt_amount(leg.total)
        );
    }
    println!(
        "  funding ops: {}, change returned: {}",
        receipt.plan.ops.len(),
        fmt_amount(receipt.plan.change)
    );
    print_profile(exchange, user)?;
    Ok(())
}

fn scenario_3_buys(exchange: &Exchange, admin: Identity, user: Identity) -> Result<(), TradeError> {
    println!("Scenario 3: Buying Along the Curve\n");

    let receipt = exchange.buy(admin, admin, 1)?;
    println!("  admin buys 1 of its own line for {}", fmt_amount(receipt.quote.total));

    for _ in 0..2 {
        let next = exchange.buy_price_after_fee(admin, 1)?;
        let receipt = exchange.buy(user, admin, 1)?;
        println!(
            "  user buys 1 of admin (quoted {}), paid {}, supply {}",
            fmt_amount(next),
            fmt_amount(receipt.quote.total),
            receipt.supply_after
        );
    }
    print_profile(exchange, admin)?;
    Ok(())
}

fn scenario_4_sell(exchange: &Exchange, admin: Identity, user: Identity) -> Result<(), TradeError> {
    println!("Scenario 4: Selling Back\n");

    println!("  Sell quote for 1: {}", fmt_amount(exchange.sell_price_after_fee(admin, 1)?));
    let receipt = exchange.sell(user, admin, 1)?;
    println!(
        "  user sells 1 of admin: base {}, fees {}, received {}",
        fmt_amount(receipt.quote.base_price),
        fmt_amount(receipt.quote.fees()),
        fmt_amount(receipt.quote.total)
    );
    println!("  user still holds {}", exchange.holding_of(admin, user)?);
    print_profile(exchange, admin)?;
    Ok(())
}

fn scenario_5_rejections(exchange: &Exchange, admin: Identity, user: Identity) {
    println!("Scenario 5: Rejected Trades\n");

    let stranger = Identity::from_u64(3);
    let attempts = [
        ("stranger buys admin with no funds", exchange.buy(stranger, admin, 1)),
        ("user buys an uninitialized subject", exchange.buy(user, stranger, 1)),
        ("user sells more than held", exchange.sell(user, admin, 5)),
        ("user buys zero units", exchange.buy(user, admin, 0)),
    ];
    for (label, result) in attempts {
        match result {
            Ok(_) => println!("  {label}: unexpectedly accepted"),
            Err(e) => println!("  {label}: {:?} ({e})", e.kind()),
        }
    }
}

fn print_profile(exchange: &Exchange, subject: Identity) -> Result<(), TradeError> {
    let profile = exchange.profile(subject)?;
    let holders = exchange.holdings(subject, None, 10)?;
    println!(
        "  subject {}: {:?}, supply {}, holders {}, backing {}",
        subject.short(),
        profile.status,
        profile.supply,
        profile.holder_count,
        fmt_amount(profile.backing)
    );
    for (holder, units) in holders.items {
        println!("    {} holds {}", holder.short(), units);
    }
    println!();
    Ok(())
}

fn fmt_amount(amount: u64) -> String {
    amount_to_decimal(amount).normalize().to_string()
}

fn clamp(value: u128) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}
