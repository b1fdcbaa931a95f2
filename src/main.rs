use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;

use emuclick_core::gateway::OpenAiGateway;
use emuclick_core::interpreter::{CoordinateBundle, Interpreter};
use emuclick_core::logger;
use emuclick_core::plan::{CoordinateValue, Keywords, Params, PlanBook};
use emuclick_core::platform::create_platform;
use emuclick_core::settings::Settings;
use emuclick_core::sleep::ThreadSleeper;

#[derive(Parser, Debug)]
#[command(name = "emuclick", version, about = "Action-plan automation for emulator games")]
struct Cli {
    /// Plan to execute
    plan: Option<String>,

    /// List available plans and exit
    #[arg(long)]
    list_plans: bool,

    /// List named coordinates and exit
    #[arg(long)]
    list_coords: bool,

    /// Only open the emulator
    #[arg(long)]
    open_only: bool,

    /// Locate the avatar whose message relates to KEYWORD, print its
    /// coordinates and exit without clicking
    #[arg(long, value_name = "KEYWORD")]
    find_keyword: Option<String>,

    /// Value bound to `{keyword}` in the plan
    #[arg(long)]
    keyword: Option<String>,

    /// Extra placeholder binding, repeatable
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    params: Vec<(String, String)>,

    #[arg(long, default_value = "plans.json")]
    plans: PathBuf,

    #[arg(long, default_value = "settings.json")]
    settings: PathBuf,

    #[arg(long, default_value = "logs")]
    logs: PathBuf,

    /// Write the effective settings back to the settings file and exit
    #[arg(long)]
    init_settings: bool,

    /// Use the logging stub instead of the native platform
    #[arg(long)]
    stub: bool,

    /// Echo debug lines
    #[arg(short, long)]
    verbose: bool,
}

fn parse_param(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            logger::error(&format!("{:#}", err));
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn print_plans(book: &PlanBook) {
    println!("Available action plans:");
    for plan in &book.plans {
        match &plan.description {
            Some(d) => println!("\n{} - {}", plan.name, d),
            None => println!("\n{}", plan.name),
        }
        for (i, action) in plan.steps.iter().enumerate() {
            println!("   {}. {} - {}", i + 1, action.summary(), action.description());
        }
    }
}

fn print_coords(book: &PlanBook) {
    println!("Available coordinates:");
    for (name, value) in &book.coordinates {
        match value {
            CoordinateValue::Point([x, y]) => println!("   {}: ({}, {})", name, x, y),
            CoordinateValue::Template(path) => println!("   {}: template {}", name, path.display()),
        }
    }
}

fn print_bundle(bundle: &CoordinateBundle) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(bundle)?);
    Ok(())
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    logger::init(&cli.logs, cli.verbose);
    let settings = Settings::load(&cli.settings);

    if cli.init_settings {
        settings
            .save(&cli.settings)
            .with_context(|| format!("failed to write {}", cli.settings.display()))?;
        println!("wrote {}", cli.settings.display());
        return Ok(ExitCode::SUCCESS);
    }

    let book = PlanBook::load(&cli.plans)?;

    if cli.list_plans {
        print_plans(&book);
        return Ok(ExitCode::SUCCESS);
    }
    if cli.list_coords {
        print_coords(&book);
        return Ok(ExitCode::SUCCESS);
    }

    let mut platform = create_platform(cli.stub);
    let mut gateway = OpenAiGateway::from_settings(&settings.gateway);
    let mut caps = platform.probe();
    caps.classifier = gateway.has_credentials();
    caps.report();

    let mut sleeper = ThreadSleeper;
    let mut interp = Interpreter::new(platform.as_mut(), &mut sleeper, &book, &settings, caps)
        .with_classifier(&mut gateway);

    if cli.open_only {
        interp
            .open_app(&settings.emulator_app)
            .with_context(|| format!("failed to open {}", settings.emulator_app))?;
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(keyword) = cli.find_keyword {
        return match interp.find_keyword(Keywords::One(keyword)) {
            Ok(bundle) => {
                print_bundle(&bundle)?;
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                logger::error(&e.to_string());
                Ok(ExitCode::FAILURE)
            }
        };
    }

    let Some(plan) = cli.plan else {
        bail!("no plan given (available: {})", book.plan_names().join(", "));
    };

    let mut params: Params = cli.params.into_iter().collect();
    if let Some(keyword) = cli.keyword {
        params.insert("keyword".into(), keyword);
    }

    let report = interp.run_plan(&plan, &params);
    if let Some(bundle) = report.coordinates() {
        print_bundle(bundle)?;
    }
    Ok(if report.succeeded() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
