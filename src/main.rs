//! Consulting Report CLI
//!
//! Command-line access to the industry-rate lookup and the five-year projection

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use consulting_report::{
    assumptions::InsuranceClass,
    clock,
    pipeline::ProjectionInput,
    projection::Projection,
    report::format_money,
    table::{load_table, resolve},
};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "consulting_report", about = "Tax projection and industry-rate lookup")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve an industry code to an income rate using the reference table
    Lookup {
        /// Reference table as .xlsx (first sheet) or CSV; first row is the header
        #[arg(long)]
        table: PathBuf,

        /// Industry code to look up
        #[arg(long)]
        code: String,
    },

    /// Print the five-year tax and insurance projection
    Project {
        /// Expected sales this year
        #[arg(long)]
        sales: i64,

        /// Income rate in percent (0-100)
        #[arg(long)]
        rate: f64,

        /// Owner is enrolled through an employer instead of regionally
        #[arg(long)]
        employed: bool,

        /// First projected year (defaults to the current year)
        #[arg(long)]
        base_year: Option<i32>,

        /// Also write the rows to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    match Cli::parse().command {
        Command::Lookup { table, code } => run_lookup(&table, &code),
        Command::Project {
            sales,
            rate,
            employed,
            base_year,
            csv,
        } => run_project(sales, rate, employed, base_year, csv),
    }
}

fn run_lookup(path: &Path, code: &str) -> Result<()> {
    let table = load_table(path).with_context(|| format!("Failed to load table: {}", path.display()))?;
    println!("Loaded {} rows x {} columns", table.row_count(), table.column_count());

    let result = resolve(&table, code);
    println!("Industry code:  {}", result.industry_code);
    println!("Business code:  {}", result.business_code.as_deref().unwrap_or("-"));
    match (result.factor, result.income_rate) {
        (Some(factor), Some(rate)) => {
            println!("Factor:         {}", factor);
            println!("Income rate:    {:.2} %", rate);
        }
        _ => println!("Income rate:    - (enter it manually)"),
    }
    println!("Status:         {}", result.status.note());
    Ok(())
}

fn run_project(
    sales: i64,
    rate: f64,
    employed: bool,
    base_year: Option<i32>,
    csv_path: Option<PathBuf>,
) -> Result<()> {
    let class = InsuranceClass::from_regional_flag(!employed);
    let input = ProjectionInput {
        sales,
        income_rate: rate,
        insurance_class: class,
        base_year,
    };
    let projection = input.project(&clock::now_local())?;

    print_projection(&projection, class);

    if let Some(path) = csv_path {
        write_csv(&projection, &path).with_context(|| format!("Failed to write CSV: {}", path.display()))?;
        println!("\nRows written to: {}", path.display());
    }
    Ok(())
}

fn print_projection(projection: &Projection, class: InsuranceClass) {
    println!("Five-Year Projection (estimate) - {}", class.label());
    println!(
        "{:>6} {:>16} {:>8} {:>14} {:>14} {:>14} {:>14} {:>14}",
        "Year", "Revenue", "Rate%", "Profit", "IndivTax", "EntityTax", "Insurance", "Saving"
    );
    println!("{}", "-".repeat(108));

    for row in &projection.rows {
        println!(
            "{:>6} {:>16} {:>8.2} {:>14} {:>14} {:>14} {:>14} {:>14}",
            row.year,
            format_money(row.revenue),
            row.income_rate,
            format_money(row.profit),
            format_money(row.individual_tax),
            format_money(row.entity_tax),
            format_money(row.insurance),
            format_money(row.conversion_delta),
        );
    }

    let summary = projection.summary();
    println!("\nFive-year totals:");
    println!("  Profit:          {}", format_money(summary.total_profit));
    println!("  Individual tax:  {}", format_money(summary.total_individual_tax));
    println!("  Entity tax:      {}", format_money(summary.total_entity_tax));
    println!("  Insurance:       {}", format_money(summary.total_insurance));
    println!("  Saving potential: {}", format_money(summary.total_conversion_delta));
}

fn write_csv(projection: &Projection, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in &projection.rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
