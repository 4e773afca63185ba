use chrono::{NaiveDateTime, NaiveTime};
use clap::{Parser, Subcommand};
use dosing_core::*;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "dosekit")]
#[command(about = "Dose scheduling, injection site rotation and vial tracking", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use a specific config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Pretend the current time is YYYY-MM-DDTHH:MM
    #[arg(long, global = true, value_parser = parse_now)]
    now: Option<NaiveDateTime>,

    /// Log more (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start tracking a compound
    Track {
        id: String,

        /// Dose amount
        #[arg(long)]
        amount: f64,

        /// Dose unit (mg, mcg, g, iu, ml, units)
        #[arg(long, default_value = "mg")]
        unit: String,

        /// daily, every:<n>, weekdays:<d,d,..>, alternating:<a,b,..>, twice-weekly, as-needed
        #[arg(long, default_value = "daily")]
        schedule: String,

        /// Dose time as HH:MM
        #[arg(long)]
        time: Option<String>,

        /// Injection route (im, subq); omit for non-injectables
        #[arg(long)]
        category: Option<String>,

        /// Display name
        #[arg(long)]
        name: Option<String>,
    },

    /// Show when the next dose is due
    Next {
        /// Compound id; all active compounds when omitted
        id: Option<String>,

        /// Number of upcoming doses to list
        #[arg(long, default_value_t = 1)]
        count: usize,
    },

    /// Log (or skip) a dose
    Log {
        id: String,

        /// Dose amount, defaults to the regimen's dose
        #[arg(long)]
        amount: Option<f64>,

        /// Injection site key, defaults to the recommended site
        #[arg(long)]
        site: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        /// Mark the dose as skipped without consuming stock
        #[arg(long)]
        skip: bool,
    },

    /// Recommend the next injection site
    Site {
        id: String,

        /// Number of recent injections to consider
        #[arg(long)]
        lookback: Option<usize>,

        /// List every site with its score
        #[arg(long)]
        all: bool,
    },

    /// Manage vial inventory
    Stock {
        id: String,

        #[command(subcommand)]
        action: StockAction,
    },

    /// Work out diluent volume or draw volume for a vial
    Reconstitute {
        /// Vial content
        #[arg(long)]
        vial: f64,

        #[arg(long, default_value = "mg")]
        vial_unit: String,

        /// Desired dose
        #[arg(long)]
        dose: f64,

        #[arg(long, default_value = "mg")]
        dose_unit: String,

        /// Syringe marking the dose should land on (1-100)
        #[arg(long, conflicts_with = "diluent")]
        units: Option<f64>,

        /// Diluent already added, in mL
        #[arg(long)]
        diluent: Option<f64>,
    },

    /// Stop tracking a compound (history is kept)
    Stop { id: String },
}

#[derive(Subcommand)]
enum StockAction {
    /// Start inventory tracking
    Init {
        /// Vials on hand, including the open one
        #[arg(long)]
        vials: u32,

        /// Content of one vial in mg
        #[arg(long)]
        vial_size: f64,

        /// Warn when this many vials or fewer remain
        #[arg(long, default_value_t = 1)]
        threshold: u32,

        /// Do not decrement automatically when doses are logged
        #[arg(long)]
        manual: bool,
    },
    /// Add sealed vials
    Add { count: u32 },
    /// Discard the open vial and start a new one
    Open,
    /// Show remaining stock
    Status,
}

/// Files belonging to one tracked compound
struct CompoundPaths {
    regimen: PathBuf,
    inventory: PathBuf,
    journal: PathBuf,
}

impl CompoundPaths {
    /// Paths under `data_dir/<id>`; ids that are not a plain name are refused
    fn new(data_dir: &Path, id: &str) -> Result<Self> {
        validate_compound_id(id)?;

        let dir = data_dir.join(id);
        Ok(Self {
            regimen: dir.join("regimen.json"),
            inventory: dir.join("inventory.json"),
            journal: dir.join("doses.jsonl"),
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    dosing_core::logging::init_verbose(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    let now = cli
        .now
        .unwrap_or_else(|| chrono::Local::now().naive_local());

    match cli.command {
        Commands::Track {
            id,
            amount,
            unit,
            schedule,
            time,
            category,
            name,
        } => {
            let mut regimen = Regimen::new(
                &id,
                amount,
                parse_unit(&unit)?,
                parse_schedule(&schedule)?,
                now,
            );
            regimen.name = name.unwrap_or(id);
            regimen.notification_time = time.as_deref().map(parse_time).transpose()?;
            regimen.category = category.as_deref().map(parse_category).transpose()?;
            cmd_track(&data_dir, regimen, now, &config)
        }
        Commands::Next { id, count } => cmd_next(&data_dir, id, count, now, &config),
        Commands::Log {
            id,
            amount,
            site,
            notes,
            skip,
        } => cmd_log(&data_dir, &id, amount, site, notes, skip, now, &config),
        Commands::Site { id, lookback, all } => {
            let lookback = lookback.unwrap_or(config.rotation.lookback);
            cmd_site(&data_dir, &id, lookback, all, now)
        }
        Commands::Stock { id, action } => cmd_stock(&data_dir, &id, action),
        Commands::Reconstitute {
            vial,
            vial_unit,
            dose,
            dose_unit,
            units,
            diluent,
        } => cmd_reconstitute(
            vial,
            parse_unit(&vial_unit)?,
            dose,
            parse_unit(&dose_unit)?,
            units,
            diluent,
            &config,
        ),
        Commands::Stop { id } => cmd_stop(&data_dir, &id),
    }
}

fn cmd_track(data_dir: &Path, regimen: Regimen, now: NaiveDateTime, config: &Config) -> Result<()> {
    regimen.validate()?;

    let paths = CompoundPaths::new(data_dir, &regimen.id)?;
    if paths.regimen.exists() {
        return Err(Error::Validation(format!(
            "{} is already tracked",
            regimen.id
        )));
    }

    snapshot::save(&paths.regimen, &regimen)?;
    tracing::info!("Started tracking {}", regimen.id);

    println!("✓ Tracking {}", regimen.name);
    print_next_due(&regimen, now, config)?;
    Ok(())
}

fn cmd_next(
    data_dir: &Path,
    id: Option<String>,
    count: usize,
    now: NaiveDateTime,
    config: &Config,
) -> Result<()> {
    let regimens = match id {
        Some(id) => vec![load_regimen(data_dir, &id)?],
        None => load_all_regimens(data_dir)?,
    };

    if regimens.is_empty() {
        println!("Nothing tracked yet.");
        return Ok(());
    }

    let default_time = config.schedule.default_time()?;
    for regimen in &regimens {
        if count > 1 {
            println!("{}:", regimen.name);
            for due in upcoming(regimen, now, count, default_time) {
                println!("  {}", format_time(due));
            }
        } else {
            print_next_due(regimen, now, config)?;
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_log(
    data_dir: &Path,
    id: &str,
    amount: Option<f64>,
    site: Option<String>,
    notes: Option<String>,
    skip: bool,
    now: NaiveDateTime,
    config: &Config,
) -> Result<()> {
    let paths = CompoundPaths::new(data_dir, id)?;
    let mut regimen = load_regimen(data_dir, id)?;
    if !regimen.is_active {
        return Err(Error::Validation(format!("{} is no longer tracked", id)));
    }

    if skip {
        regimen.record_dose(now);
        snapshot::save(&paths.regimen, &regimen)?;
        println!("✓ Skipped dose of {}", regimen.name);
        print_next_due(&regimen, now, config)?;
        return Ok(());
    }

    let amount = amount.unwrap_or(regimen.dosage_amount);
    let mut event = DoseEvent::new(&regimen.id, now, amount, regimen.dosage_unit);
    event.validate()?;
    event.notes = notes;
    event.injection_site = match (regimen.category, site) {
        (_, Some(key)) => {
            let site = InjectionSite::from_key(&key)
                .ok_or_else(|| Error::Validation(format!("unknown injection site: {}", key)))?;
            if regimen.category.is_some_and(|category| category != site.category()) {
                return Err(Error::Validation(format!(
                    "{} does not match the injection route of {}",
                    key, regimen.id
                )));
            }
            Some(site)
        }
        (Some(category), None) => {
            let history = load_dose_history(&paths.journal)?;
            let entries = site_history(&history, category);
            Some(recommend_next_site(category, &entries, config.rotation.lookback, now))
        }
        (None, None) => None,
    };

    regimen.record_dose(now);

    let stock = snapshot::load::<InventoryState>(&paths.inventory)?;
    let ledger = match (&stock, regimen.dosage_unit.to_milligrams(amount)) {
        (Some(stock), Some(dose_mg)) => Some(stock.decrement(dose_mg)),
        (Some(_), None) => {
            println!(
                "! Inventory is tracked in mg; {} doses are not decremented",
                regimen.dosage_unit.label()
            );
            None
        }
        (None, _) => None,
    };

    let mut journal = JsonlJournal::new(&paths.journal);
    journal.append(&event)?;
    snapshot::save(&paths.regimen, &regimen)?;
    if let Some(update) = &ledger {
        if update.success() {
            snapshot::save(&paths.inventory, &update.state)?;
        }
    }
    tracing::info!("Logged dose {} for {}", event.id, regimen.id);

    println!(
        "✓ Logged {} {} of {}",
        amount,
        regimen.dosage_unit.label(),
        regimen.name
    );
    if let Some(site) = event.injection_site {
        println!("  Site: {}", site.label());
    }
    if let Some(update) = &ledger {
        print_ledger_update(update);
    }
    print_next_due(&regimen, now, config)?;

    Ok(())
}

fn cmd_site(data_dir: &Path, id: &str, lookback: usize, all: bool, now: NaiveDateTime) -> Result<()> {
    let regimen = load_regimen(data_dir, id)?;
    let category = regimen.category.ok_or_else(|| {
        Error::Validation(format!("{} has no injection route; use `track --category`", id))
    })?;

    let paths = CompoundPaths::new(data_dir, id)?;
    let history = load_dose_history(&paths.journal)?;
    let entries = site_history(&history, category);

    if all {
        for (rank, candidate) in rank_sites(category, &entries, lookback, now).iter().enumerate() {
            println!(
                "{:>2}. {:<32} score {:.3} (area {:.3})",
                rank + 1,
                candidate.site.label(),
                candidate.score,
                candidate.group_score
            );
        }
        return Ok(());
    }

    let site = recommend_next_site(category, &entries, lookback, now);
    println!("Next site: {} [{}]", site.label(), site.key());
    Ok(())
}

fn cmd_stock(data_dir: &Path, id: &str, action: StockAction) -> Result<()> {
    let regimen = load_regimen(data_dir, id)?;
    let paths = CompoundPaths::new(data_dir, id)?;

    let stock = match action {
        StockAction::Init {
            vials,
            vial_size,
            threshold,
            manual,
        } => {
            let mut stock = InventoryState::new(vials, vial_size, threshold)?;
            stock.auto_decrement = !manual;
            snapshot::save(&paths.inventory, &stock)?;
            println!("✓ Inventory tracking started for {}", regimen.name);
            stock
        }
        StockAction::Add { count } => snapshot::update(&paths.inventory, "inventory", |stock: &mut InventoryState| {
            *stock = stock.add_vials(count);
            Ok(())
        })?,
        StockAction::Open => snapshot::update(&paths.inventory, "inventory", |stock: &mut InventoryState| {
            *stock = stock.start_new_vial();
            Ok(())
        })?,
        StockAction::Status => snapshot::load_required(&paths.inventory, "inventory")?,
    };

    print_stock(&regimen, &stock);
    Ok(())
}

fn cmd_reconstitute(
    vial: f64,
    vial_unit: DosageUnit,
    dose: f64,
    dose_unit: DosageUnit,
    units: Option<f64>,
    diluent: Option<f64>,
    config: &Config,
) -> Result<()> {
    let result = match (units, diluent) {
        (_, Some(diluent_ml)) => {
            draw_for_dose(vial, vial_unit, diluent_ml, dose, dose_unit, &config.reconstitution)?
        }
        (Some(syringe_units), None) => solve(
            &ReconstitutionRequest {
                vial_amount: vial,
                vial_unit,
                dose_amount: dose,
                dose_unit,
                syringe_units,
            },
            &config.reconstitution,
        )?,
        (None, None) => {
            return Err(Error::Validation(
                "pass --units to solve for diluent or --diluent to solve for the draw".into(),
            ))
        }
    };

    let unit = result.unit.label();
    println!("Diluent:        {:.2} mL", result.diluent_volume_ml);
    println!("Concentration:  {:.3} {}/mL", result.concentration_per_ml, unit);
    println!(
        "Draw:           {:.3} mL ({:.1} units)",
        result.volume_to_draw_ml, result.units_to_draw
    );
    println!("Doses per vial: {:.1}", result.doses_per_vial);
    for warning in &result.warnings {
        println!("! {}", warning.message());
    }

    Ok(())
}

fn cmd_stop(data_dir: &Path, id: &str) -> Result<()> {
    let paths = CompoundPaths::new(data_dir, id)?;
    let regimen: Regimen = snapshot::update(&paths.regimen, "regimen", |regimen: &mut Regimen| {
        regimen.deactivate();
        Ok(())
    })?;

    println!("✓ Stopped tracking {} (history kept)", regimen.name);
    Ok(())
}

fn load_regimen(data_dir: &Path, id: &str) -> Result<Regimen> {
    let paths = CompoundPaths::new(data_dir, id)?;
    snapshot::load_required(&paths.regimen, &format!("regimen {}", id))
}

/// Active regimens in the data directory, sorted by id
fn load_all_regimens(data_dir: &Path) -> Result<Vec<Regimen>> {
    if !data_dir.exists() {
        return Ok(Vec::new());
    }

    let mut regimens = Vec::new();
    for entry in std::fs::read_dir(data_dir)? {
        let path = entry?.path().join("regimen.json");
        if let Some(regimen) = snapshot::load::<Regimen>(&path)? {
            if regimen.is_active {
                regimens.push(regimen);
            }
        }
    }
    regimens.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(regimens)
}

fn print_next_due(regimen: &Regimen, now: NaiveDateTime, config: &Config) -> Result<()> {
    let default_time = config.schedule.default_time()?;

    match next_due_with_default(regimen, now, default_time) {
        Some(due) => {
            let note = if is_overdue_with_default(regimen, now, default_time) {
                " (overdue)"
            } else if is_due_today_with_default(regimen, now, default_time) {
                " (today)"
            } else {
                ""
            };
            println!("  {} next due {}{}", regimen.name, format_time(due), note);
        }
        None if !regimen.is_active => println!("  {} is not active", regimen.name),
        None => println!("  {} is taken as needed", regimen.name),
    }
    Ok(())
}

fn print_ledger_update(update: &LedgerUpdate) {
    match update.outcome {
        DecrementOutcome::OpenedNewVial { opened } => {
            println!("  Opened {} new vial(s)", opened)
        }
        DecrementOutcome::Exhausted { shortfall_mg } => println!(
            "! Last vial ran out {:.3} mg short; inventory is now empty",
            shortfall_mg
        ),
        DecrementOutcome::InsufficientStock => {
            println!("! Insufficient stock; dose logged without changing inventory")
        }
        _ => {}
    }
    if update.state.is_low_stock() {
        println!("! Low stock: {} vial(s) left", update.state.vial_count);
    }
}

fn print_stock(regimen: &Regimen, stock: &InventoryState) {
    println!("  Vials:          {}", stock.vial_count);
    println!(
        "  Open vial:      {:.3} / {:.3} mg",
        stock.remaining_in_current_vial_mg, stock.vial_size_mg
    );
    println!("  Total left:     {:.3} mg", stock.total_remaining_mg());

    if let Some(dose_mg) = regimen.dose_mg() {
        println!("  Doses left:     {}", stock.remaining_doses(dose_mg));
        if let Some(interval) = regimen.schedule.interval_days() {
            println!(
                "  Days of supply: {:.1}",
                stock.days_of_supply(dose_mg, interval)
            );
        }
    }
    if !stock.auto_decrement {
        println!("  (manual tracking)");
    }
    if stock.is_low_stock() {
        println!("! Low stock");
    }
}

fn format_time(at: NaiveDateTime) -> String {
    at.format("%a %Y-%m-%d %H:%M").to_string()
}

fn parse_now(s: &str) -> std::result::Result<NaiveDateTime, String> {
    ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .ok_or_else(|| format!("expected YYYY-MM-DDTHH:MM, got {}", s))
}

fn parse_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|_| Error::Validation(format!("expected HH:MM, got {}", s)))
}

fn parse_unit(s: &str) -> Result<DosageUnit> {
    DosageUnit::parse(s).ok_or_else(|| Error::Validation(format!("unknown unit: {}", s)))
}

fn parse_category(s: &str) -> Result<InjectionCategory> {
    InjectionCategory::parse(s)
        .ok_or_else(|| Error::Validation(format!("unknown injection route: {} (use im or subq)", s)))
}

fn parse_schedule(s: &str) -> Result<ScheduleKind> {
    let s = s.trim().to_lowercase();
    let (kind, arg) = s.split_once(':').unwrap_or((s.as_str(), ""));

    let schedule = match kind {
        "daily" => ScheduleKind::Daily,
        "as-needed" | "prn" => ScheduleKind::AsNeeded,
        "twice-weekly" => ScheduleKind::every_three_and_a_half_days(),
        "every" if arg == "3.5" => ScheduleKind::every_three_and_a_half_days(),
        "every" => ScheduleKind::EveryNDays {
            n: parse_number(arg)?,
        },
        "alternating" => ScheduleKind::AlternatingDays {
            lengths: arg
                .split(',')
                .map(parse_number)
                .collect::<Result<Vec<u32>>>()?,
        },
        "weekdays" => ScheduleKind::SpecificWeekdays {
            days: arg
                .split(',')
                .map(parse_weekday)
                .collect::<Result<BTreeSet<u8>>>()?,
        },
        _ => return Err(Error::Validation(format!("unknown schedule: {}", s))),
    };

    schedule.validate()?;
    Ok(schedule)
}

fn parse_number(s: &str) -> Result<u32> {
    s.trim()
        .parse()
        .map_err(|_| Error::Validation(format!("expected a whole number of days, got {:?}", s)))
}

fn parse_weekday(s: &str) -> Result<u8> {
    const NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];
    let s = s.trim();

    if let Some(idx) = NAMES.iter().position(|name| s.starts_with(name)) {
        return Ok(idx as u8);
    }
    s.parse()
        .map_err(|_| Error::Validation(format!("unknown weekday: {:?}", s)))
}
