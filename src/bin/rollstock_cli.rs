use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use rollstock::{
    config::{self, AppConfig},
    events,
    models::{Category, Item, ItemKind, Transaction},
    queries::{ItemFilter, ItemSort, SortDirection, SortField},
    repositories::ConsumptionOutcome,
    services::{Consumption, EditScrap, NewScrap, RollDetails},
    units::{self, format_dimensions, format_length, parse_length, UnitSystem},
    Inventory, ServiceError,
};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<ServiceError>() {
                Some(service) => eprintln!("error [{}]: {}", service.kind(), service.user_message()),
                None => eprintln!("error: {:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        // Pure conversion runs without opening the database.
        Commands::Convert(args) => handle_convert(args, cli.json),
        command => {
            let context = CliContext::initialize().await?;
            dispatch(&context, command, cli.json).await
        }
    }
}

async fn dispatch(context: &CliContext, command: Commands, json: bool) -> Result<()> {
    match command {
        Commands::AddRoll(args) => handle_add_roll(context, args, json).await?,
        Commands::AddScrap(args) => handle_add_scrap(context, args, json).await?,
        Commands::EditRoll(args) => handle_edit_roll(context, args, json).await?,
        Commands::EditScrap(args) => handle_edit_scrap(context, args, json).await?,
        Commands::Consume(args) => handle_consume(context, args, json).await?,
        Commands::Delete(args) => handle_delete(context, args, json).await?,
        Commands::List(args) => handle_list(context, args, json).await?,
        Commands::Show(args) => handle_show(context, args, json).await?,
        Commands::Scraps(args) => handle_scraps(context, args, json).await?,
        Commands::History(args) => handle_history(context, args, json).await?,
        Commands::Summary => handle_summary(context, json).await?,
        Commands::Convert(args) => handle_convert(args, json)?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "rollstock", about = "Roll and scrap inventory for film stock", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new roll
    AddRoll(RollArgs),
    /// Register a scrap cut from an existing item
    AddScrap(AddScrapArgs),
    /// Replace a roll's details; resets its remaining state
    EditRoll(EditRollArgs),
    EditScrap(EditScrapArgs),
    /// Register a cut from a roll
    Consume(ConsumeArgs),
    Delete(ItemRefArgs),
    List(ListArgs),
    Show(ItemRefArgs),
    /// List the scraps cut from an item
    Scraps(ItemRefArgs),
    /// Show the consumption history of a roll
    History(ItemRefArgs),
    /// Per-category totals
    Summary,
    /// Convert a length between metric and imperial
    Convert(ConvertArgs),
}

#[derive(Args)]
struct RollArgs {
    #[arg(long, help = "Display name of the roll")]
    name: String,
    #[arg(long, value_parser = parse_category, help = "window_tinting, ppf or wrap")]
    category: Category,
    #[arg(long, help = "Width in the configured display units")]
    width: String,
    #[arg(long, help = "Length in the configured display units")]
    length: String,
    #[arg(long, default_value_t = 1)]
    quantity: u32,
    #[arg(long, help = "Low-stock threshold")]
    min_quantity: Option<u32>,
    #[arg(long)]
    price: Option<Decimal>,
    #[arg(long)]
    observation: Option<String>,
}

#[derive(Args)]
struct EditRollArgs {
    #[arg(help = "Item id or code")]
    item: String,
    #[command(flatten)]
    roll: RollArgs,
}

#[derive(Args)]
struct AddScrapArgs {
    #[arg(long, help = "Id or code of the item the scrap was cut from")]
    origin: String,
    #[arg(long)]
    width: String,
    #[arg(long)]
    length: String,
    #[arg(long, default_value_t = 1)]
    quantity: u32,
    #[arg(long)]
    observation: Option<String>,
}

#[derive(Args)]
struct EditScrapArgs {
    #[arg(help = "Scrap id or code")]
    item: String,
    #[arg(long)]
    width: String,
    #[arg(long)]
    length: String,
    #[arg(long, help = "Defaults to the scrap's current quantity")]
    quantity: Option<u32>,
    #[arg(long, help = "Defaults to the scrap's current note")]
    observation: Option<String>,
}

#[derive(Args)]
struct ConsumeArgs {
    #[arg(help = "Roll id or code")]
    item: String,
    #[arg(long)]
    width: String,
    #[arg(long)]
    length: String,
    #[arg(long, help = "Keep part of the cut piece as a scrap: WIDTHxLENGTH")]
    scrap: Option<String>,
}

#[derive(Args)]
struct ItemRefArgs {
    #[arg(help = "Item id or code")]
    item: String,
}

#[derive(Args)]
struct ListArgs {
    #[arg(long, value_parser = parse_category)]
    category: Option<Category>,
    #[arg(long, value_parser = parse_kind, help = "roll or scrap")]
    kind: Option<ItemKind>,
    #[arg(long, help = "Case-insensitive match on name or code")]
    search: Option<String>,
    #[arg(long, help = "Minimum remaining width")]
    min_width: Option<String>,
    #[arg(long, help = "Minimum remaining length")]
    min_length: Option<String>,
    #[arg(long, value_parser = parse_sort_field, default_value = "created_at")]
    sort: SortField,
    #[arg(long, action = ArgAction::SetTrue)]
    desc: bool,
    #[arg(long, action = ArgAction::SetTrue, help = "Only items at or below their threshold")]
    low_stock: bool,
}

#[derive(Args)]
struct ConvertArgs {
    value: String,
    #[arg(long, value_parser = parse_units, help = "Unit system of VALUE")]
    from: UnitSystem,
}

fn parse_category(s: &str) -> Result<Category, String> {
    Category::from_str(s).map_err(|_| format!("unknown category '{}'", s))
}

fn parse_kind(s: &str) -> Result<ItemKind, String> {
    ItemKind::from_str(s).map_err(|_| format!("unknown kind '{}'", s))
}

fn parse_sort_field(s: &str) -> Result<SortField, String> {
    SortField::from_str(s).map_err(|_| format!("unknown sort field '{}'", s))
}

fn parse_units(s: &str) -> Result<UnitSystem, String> {
    UnitSystem::from_str(s).map_err(|_| format!("unknown unit system '{}'", s))
}

struct CliContext {
    config: AppConfig,
    inventory: Inventory,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let (inventory, event_rx) = Inventory::open(config.clone())
            .await
            .context("failed to open inventory storage")?;
        tokio::spawn(events::process_events(event_rx));

        Ok(Self { config, inventory })
    }

    fn units(&self) -> UnitSystem {
        self.config.display_units
    }

    fn length(&self, input: &str) -> f64 {
        parse_length(input, self.units())
    }

    /// Resolves a UUID or an item code.
    async fn resolve(&self, reference: &str) -> Result<Item> {
        if let Ok(id) = Uuid::parse_str(reference) {
            return self
                .inventory
                .queries
                .get(id)
                .await?
                .ok_or_else(|| anyhow!("item {} not found", id));
        }
        self.inventory
            .queries
            .find_by_code(reference)
            .await?
            .ok_or_else(|| anyhow!("no item with code '{}'", reference))
    }

    fn roll_details(&self, args: RollArgs) -> RollDetails {
        RollDetails {
            name: args.name,
            category: args.category,
            width: self.length(&args.width),
            length: self.length(&args.length),
            quantity: args.quantity,
            min_quantity: args.min_quantity,
            price: args.price,
            observation: args.observation,
        }
    }
}

async fn handle_add_roll(context: &CliContext, args: RollArgs, json: bool) -> Result<()> {
    let details = context.roll_details(args);
    let item = context
        .inventory
        .engine
        .create_roll(details)
        .await
        .context("failed to create roll")?;
    render_item_result(context, &item, "Created", json)
}

async fn handle_add_scrap(context: &CliContext, args: AddScrapArgs, json: bool) -> Result<()> {
    let origin = context.resolve(&args.origin).await?;
    let scrap = NewScrap {
        origin_id: origin.id,
        width: context.length(&args.width),
        length: context.length(&args.length),
        quantity: args.quantity,
        observation: args.observation,
    };
    let item = context
        .inventory
        .engine
        .create_scrap(scrap)
        .await
        .context("failed to create scrap")?;
    render_item_result(context, &item, "Created", json)
}

async fn handle_edit_roll(context: &CliContext, args: EditRollArgs, json: bool) -> Result<()> {
    let current = context.resolve(&args.item).await?;
    let details = context.roll_details(args.roll);
    let item = context
        .inventory
        .engine
        .edit_roll(current.id, details)
        .await
        .context("failed to edit roll")?;
    render_item_result(context, &item, "Updated", json)
}

async fn handle_edit_scrap(context: &CliContext, args: EditScrapArgs, json: bool) -> Result<()> {
    let current = context.resolve(&args.item).await?;
    let edit = scrap_edit(&current, args, context.units());
    let item = context
        .inventory
        .engine
        .edit_scrap(current.id, edit)
        .await
        .context("failed to edit scrap")?;
    render_item_result(context, &item, "Updated", json)
}

async fn handle_consume(context: &CliContext, args: ConsumeArgs, json: bool) -> Result<()> {
    let roll = context.resolve(&args.item).await?;
    let mut request = Consumption::cut(
        roll.id,
        context.length(&args.width),
        context.length(&args.length),
    );
    if let Some(scrap) = &args.scrap {
        let (w, l) = scrap
            .split_once(['x', 'X'])
            .ok_or_else(|| anyhow!("scrap must be written as WIDTHxLENGTH"))?;
        request = request.with_scrap(context.length(w), context.length(l));
    }

    let outcome = context
        .inventory
        .engine
        .register_consumption(request)
        .await
        .context("failed to register consumption")?;

    if json {
        return print_json(&ConsumptionView::from(&outcome));
    }
    let units = context.units();
    println!(
        "Cut {} ({:.4} m²) from {}",
        format_dimensions(outcome.transaction.width, outcome.transaction.length, units),
        outcome.transaction.area,
        outcome.item.code
    );
    render_item(&outcome.item, units);
    if let Some(scrap) = &outcome.scrap {
        println!("Scrap kept:");
        render_item(scrap, units);
    }
    Ok(())
}

async fn handle_delete(context: &CliContext, args: ItemRefArgs, json: bool) -> Result<()> {
    let item = context.resolve(&args.item).await?;
    let removed = context
        .inventory
        .engine
        .delete_item(item.id)
        .await
        .context("failed to delete item")?;
    if json {
        return print_json(&removed);
    }
    println!("Deleted {} ({} record(s) removed)", item.code, removed.len());
    Ok(())
}

async fn handle_list(context: &CliContext, args: ListArgs, json: bool) -> Result<()> {
    let filter = ItemFilter {
        category: args.category,
        kind: args.kind,
        name_contains: args.search,
        min_width: args.min_width.as_deref().map(|v| context.length(v)),
        min_length: args.min_length.as_deref().map(|v| context.length(v)),
    };
    let direction = if args.desc {
        SortDirection::Desc
    } else {
        SortDirection::Asc
    };
    let mut items = context
        .inventory
        .queries
        .list_items(&filter, ItemSort::new(args.sort, direction))
        .await?;
    if args.low_stock {
        items.retain(Item::is_low_stock);
    }

    if json {
        return print_json(&items);
    }
    if items.is_empty() {
        println!("No items found");
    }
    for item in &items {
        render_item(item, context.units());
    }
    Ok(())
}

async fn handle_show(context: &CliContext, args: ItemRefArgs, json: bool) -> Result<()> {
    let item = context.resolve(&args.item).await?;
    let scrap_area = context.inventory.queries.total_scrap_area(item.id).await?;
    if json {
        return print_json(&item);
    }
    let units = context.units();
    render_item(&item, units);
    println!("  nominal     {}", format_dimensions(item.width, item.length, units));
    println!(
        "  remaining   {} ({:.4} m²)",
        format_dimensions(item.remaining_width, item.remaining_length, units),
        item.remaining_area
    );
    println!("  consumed    {:.4} m²", item.consumed_area);
    println!("  scrap area  {:.4} m²", scrap_area);
    if let Some(price) = item.price {
        println!("  price       {}", price);
    }
    if let Some(observation) = &item.observation {
        println!("  note        {}", observation);
    }
    Ok(())
}

async fn handle_scraps(context: &CliContext, args: ItemRefArgs, json: bool) -> Result<()> {
    let item = context.resolve(&args.item).await?;
    let scraps = context.inventory.queries.scraps_of(item.id).await?;
    if json {
        return print_json(&scraps);
    }
    println!(
        "{} scrap(s) of {}, {:.4} m² total",
        scraps.len(),
        item.code,
        rollstock::queries::total_scrap_area(&scraps)
    );
    for scrap in &scraps {
        render_item(scrap, context.units());
    }
    Ok(())
}

async fn handle_history(context: &CliContext, args: ItemRefArgs, json: bool) -> Result<()> {
    let item = context.resolve(&args.item).await?;
    let history = context.inventory.queries.consumption_history(item.id).await?;
    if json {
        return print_json(&history);
    }
    if history.is_empty() {
        println!("No cuts registered for {}", item.code);
    }
    for tx in &history {
        render_transaction(tx, context.units());
    }
    Ok(())
}

async fn handle_summary(context: &CliContext, json: bool) -> Result<()> {
    let summary = context.inventory.queries.inventory_summary().await?;
    if json {
        return print_json(&summary);
    }
    for row in &summary {
        let label = row.category.map(|c| c.label()).unwrap_or("Uncategorized");
        println!(
            "- {:<15} rolls {:>3} • scraps {:>3} • remaining {:>10.4} m² • low stock {}",
            label, row.rolls, row.scraps, row.remaining_area, row.low_stock
        );
    }
    Ok(())
}

/// Flags left out of `edit-scrap` keep the scrap's current values.
fn scrap_edit(current: &Item, args: EditScrapArgs, units: UnitSystem) -> EditScrap {
    EditScrap {
        width: parse_length(&args.width, units),
        length: parse_length(&args.length, units),
        quantity: args.quantity.unwrap_or(current.quantity),
        observation: args.observation.or_else(|| current.observation.clone()),
    }
}

#[derive(Serialize)]
struct Conversion {
    meters: f64,
    inches: f64,
}

fn handle_convert(args: ConvertArgs, json: bool) -> Result<()> {
    let meters = parse_length(&args.value, args.from);
    let conversion = Conversion {
        meters,
        inches: units::to_inches(meters),
    };
    if json {
        return print_json(&conversion);
    }
    println!(
        "{} = {}",
        format_length(meters, UnitSystem::Metric),
        format_length(meters, UnitSystem::Imperial)
    );
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConsumptionView<'a> {
    item: &'a Item,
    transaction: &'a Transaction,
    scrap: Option<&'a Item>,
}

impl<'a> From<&'a ConsumptionOutcome> for ConsumptionView<'a> {
    fn from(outcome: &'a ConsumptionOutcome) -> Self {
        Self {
            item: &outcome.item,
            transaction: &outcome.transaction,
            scrap: outcome.scrap.as_ref(),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_item_result(context: &CliContext, item: &Item, verb: &str, json: bool) -> Result<()> {
    if json {
        return print_json(item);
    }
    println!("{} {} ({})", verb, item.code, item.id);
    render_item(item, context.units());
    Ok(())
}

fn render_item(item: &Item, units: UnitSystem) {
    let status = if item.is_available { "available" } else { "used up" };
    let low = if item.is_low_stock() { " • LOW STOCK" } else { "" };
    println!(
        "- {} • {} • {} • {} left • qty {} • {}{}",
        item.code,
        item.name,
        item.category.label(),
        format_dimensions(item.remaining_width, item.remaining_length, units),
        item.quantity,
        status,
        low
    );
}

fn render_transaction(tx: &Transaction, units: UnitSystem) {
    println!(
        "- {} • {} • {} • {:.4} m²",
        tx.created_at.format("%Y-%m-%d %H:%M"),
        tx.kind,
        format_dimensions(tx.width, tx.length, units),
        tx.area
    );
}
