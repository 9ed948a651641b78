use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use weightsync_core::db::Database;

use super::helpers::{fmt_opt, kg_to_lbs};
use crate::config::Config;

pub(crate) fn cmd_history(config: &Config, days: Option<u32>, json: bool) -> Result<()> {
    let db = Database::open(&config.db_path)?;
    let entries = db.history(days.map(i64::from))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        eprintln!("No measurements stored yet. Run `weightsync recent` to sync.");
    } else {
        #[derive(Tabled)]
        struct MeasurementRow {
            #[tabled(rename = "Date")]
            date: String,
            #[tabled(rename = "Weight (kg)")]
            kg: String,
            #[tabled(rename = "Weight (lbs)")]
            lbs: String,
            #[tabled(rename = "BMI")]
            bmi: String,
            #[tabled(rename = "Body fat %")]
            body_fat: String,
            #[tabled(rename = "Muscle (kg)")]
            muscle: String,
        }

        let rows: Vec<MeasurementRow> = entries
            .iter()
            .map(|e| MeasurementRow {
                date: e.date.format("%Y-%m-%d").to_string(),
                kg: fmt_opt(e.weight_kg, 1),
                lbs: fmt_opt(e.weight_kg.map(kg_to_lbs), 1),
                bmi: fmt_opt(e.bmi, 1),
                body_fat: fmt_opt(e.body_fat_pct, 1),
                muscle: fmt_opt(e.muscle_mass_kg, 1),
            })
            .collect();

        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(1..6)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }

    db.close()?;
    Ok(())
}
