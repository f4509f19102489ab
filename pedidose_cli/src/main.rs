use clap::{Parser, Subcommand};
use pedidose_core::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pedidose")]
#[command(about = "Pediatric critical-care reference calculator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override the built-in formulary with a JSON file
    #[arg(long, global = true)]
    formulary: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a continuous-infusion preparation
    Perfusion {
        /// Drug key (see `drugs` for the list)
        #[arg(long)]
        drug: String,

        /// Patient weight in kg
        #[arg(long)]
        weight: f64,

        /// Flow rate in ml/h to convert to a dose rate
        #[arg(long)]
        rate: Option<f64>,

        /// Force a specific preparation mode instead of selecting by weight
        #[arg(long)]
        mode: Option<String>,

        /// Emit the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the drugs in the formulary
    Drugs,

    /// Estimate weight from age
    Weight {
        /// Age in years (0-18)
        #[arg(long)]
        age: f64,
    },

    /// Vital-sign reference ranges for an age
    Vitals {
        /// Age in years (0-18)
        #[arg(long)]
        age: f64,
    },

    /// Emergency bolus doses for a weight
    Emergency {
        /// Patient weight in kg
        #[arg(long)]
        weight: f64,
    },

    /// Intubation drug doses for a weight
    Intubation {
        /// Patient weight in kg
        #[arg(long)]
        weight: f64,

        /// Age in days (succinylcholine is doubled for neonates)
        #[arg(long)]
        age_days: Option<u32>,
    },
}

fn main() {
    pedidose_core::logging::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load()?;
    let formulary = resolve_formulary(cli.formulary, &config)?;
    let decimals = config.display.decimals;

    match cli.command {
        Commands::Perfusion {
            drug,
            weight,
            rate,
            mode,
            json,
        } => cmd_perfusion(&formulary, drug, weight, rate, mode, json, decimals),
        Commands::Drugs => {
            cmd_drugs(&formulary);
            Ok(())
        }
        Commands::Weight { age } => cmd_weight(age),
        Commands::Vitals { age } => cmd_vitals(age),
        Commands::Emergency { weight } => cmd_emergency(weight),
        Commands::Intubation { weight, age_days } => cmd_intubation(weight, age_days),
    }
}

/// CLI flag takes precedence over the config file; default is the built-in
/// registry. Whatever the source, the formulary must validate before use.
fn resolve_formulary(cli_path: Option<PathBuf>, config: &Config) -> Result<Formulary> {
    let path = cli_path.or_else(|| config.formulary.path.clone());

    let formulary = match path {
        Some(p) => Formulary::load(&p)?,
        None => get_default_formulary().clone(),
    };

    let errors = formulary.validate();
    if !errors.is_empty() {
        eprintln!("Formulary validation errors:");
        for error in &errors {
            eprintln!("  - {}", error);
        }
        return Err(Error::FormularyValidation("Invalid formulary".into()));
    }

    Ok(formulary)
}

fn cmd_perfusion(
    formulary: &Formulary,
    drug: String,
    weight: f64,
    rate: Option<f64>,
    mode: Option<String>,
    json: bool,
    decimals: u8,
) -> Result<()> {
    let input = ComputeInput {
        drug_key: drug,
        weight_kg: weight,
        rate_ml_h: rate,
        mode_id: mode,
    };
    let output = compute(formulary, &input)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let usual_range = formulary
        .get(&output.drug_key)
        .and_then(|d| d.usual_range);
    display_perfusion(&output, usual_range, weight, decimals);
    Ok(())
}

fn display_perfusion(
    output: &ComputeOutput,
    usual_range: Option<DoseRange>,
    weight_kg: f64,
    decimals: u8,
) {
    let prep = &output.preparation;

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  PERFUSION: {}", output.display_name);
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  Patient weight: {} kg", fmt_value(weight_kg, decimals));
    println!("  Mode: {}", output.chosen_mode_id);
    println!();
    println!(
        "  → Syringe: {} {} in {} ml ({})",
        fmt_value(prep.total.value, decimals),
        prep.total.unit,
        fmt_value(prep.volume_ml, decimals),
        prep.diluent
    );
    println!(
        "  → Concentration: {} {}/ml",
        fmt_value(prep.concentration.value, decimals),
        prep.concentration.unit
    );

    if let Some(at_rate) = &output.at_rate {
        println!(
            "  → At {} ml/h: {} {}",
            fmt_value(at_rate.rate_ml_h, decimals),
            fmt_value(at_rate.conversion.dose, decimals),
            at_rate.conversion.dose_unit
        );
    }

    if let Some(range) = usual_range {
        println!(
            "  → Usual range: {}-{} {}",
            fmt_value(range.min, decimals),
            fmt_value(range.max, decimals),
            range.unit
        );
    }

    if let Some(ref note) = prep.note {
        println!();
        println!("  ℹ {}", note);
    }

    println!();
}

fn cmd_drugs(formulary: &Formulary) {
    println!("\nFormulary (version {}):\n", formulary.version);
    for drug in &formulary.drugs {
        println!(
            "  {:26} {} [{}] - {} mode(s)",
            drug.key,
            drug.display_name,
            drug.dose_unit,
            drug.modes.len()
        );
    }
    println!();
}

fn cmd_weight(age: f64) -> Result<()> {
    let estimate = estimate_weight(age)?;
    println!(
        "\n  Estimated weight: {} kg",
        format_dose(estimate.weight_kg)
    );
    println!("  Formula: {}\n", estimate.formula);
    Ok(())
}

fn cmd_vitals(age: f64) -> Result<()> {
    let signs = reference_ranges(age)?;
    println!("\n  Vital-sign reference ranges:\n");
    println!("  → Heart rate: {} bpm", signs.heart_rate_bpm);
    println!("  → Respiratory rate: {} rpm", signs.respiratory_rate_rpm);
    println!("  → Systolic BP: {} mmHg", signs.systolic_bp_mmhg);
    println!("  → Diastolic BP: {} mmHg\n", signs.diastolic_bp_mmhg);
    Ok(())
}

fn cmd_emergency(weight: f64) -> Result<()> {
    let doses = emergency_doses(weight)?;
    println!("\n  Emergency bolus doses ({} kg):\n", weight);
    print_dose_table(&doses);
    Ok(())
}

fn cmd_intubation(weight: f64, age_days: Option<u32>) -> Result<()> {
    let doses = intubation_doses(weight, age_days)?;
    println!("\n  Intubation doses ({} kg):\n", weight);
    print_dose_table(&doses);
    Ok(())
}

fn print_dose_table(doses: &[ComputedDose]) {
    for dose in doses {
        println!(
            "  {:28} {} {}",
            dose.name,
            format_dose(dose.dose),
            dose.unit
        );
    }
    println!();
}

/// Fixed-decimal rendering with trailing zeros trimmed
fn fmt_value(value: f64, decimals: u8) -> String {
    let rendered = format!("{:.*}", decimals as usize, value);
    if rendered.contains('.') {
        rendered
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        rendered
    }
}
